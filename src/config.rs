//! Run configuration.
//!
//! A [`ScrapeConfig`] is assembled once at startup from defaults, an optional TOML file and
//! command line flags (in that order of precedence), validated, and then shared read-only
//! by every part of the run. All delays and timeouts are stored as milliseconds.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::{Error, Result};

const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfig {
    /// First wallpaper ID, inclusive.
    pub start: u64,
    /// Last wallpaper ID, inclusive.
    pub end: u64,
    /// Number of browser tabs, which is also the batch size.
    pub workers: usize,
    pub batch_delay_ms: u64,
    pub download_delay_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// How long to wait for the download button to show up.
    pub element_timeout_ms: u64,
    pub download_dir: PathBuf,
    pub user_agents: PathBuf,
    pub log_file: PathBuf,
    pub tag_file: PathBuf,
    pub sink_mode: SinkMode,
    pub timestamp: TimestampFormat,
    /// Extensions (without the dot) a finished download may carry.
    pub extensions: Vec<String>,
    pub site: SiteConfig,
    pub browser: BrowserSettings,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            start: 1_368_845,
            end: 1_369_176,
            workers: 6,
            batch_delay_ms: 5_000,
            download_delay_ms: 1_000,
            max_retries: 2,
            retry_base_delay_ms: 5_000,
            element_timeout_ms: 30_000,
            download_dir: PathBuf::from("wallpapers"),
            user_agents: PathBuf::from("user-agent.txt"),
            log_file: PathBuf::from("log.txt"),
            tag_file: PathBuf::from("tags.txt"),
            sink_mode: SinkMode::default(),
            timestamp: TimestampFormat::default(),
            extensions: vec!["jpg".into(), "png".into(), "jpeg".into()],
            site: SiteConfig::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl ScrapeConfig {
    /// Reads a TOML config file. Missing keys fall back to the defaults.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::Config(format!(
                "start ({}) is past end ({})",
                self.start, self.end
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config("at least one file extension is required".into()));
        }
        for (name, template) in [
            ("site.page_url", &self.site.page_url),
            ("site.download_button", &self.site.download_button),
        ] {
            if !template.contains(ID_PLACEHOLDER) {
                return Err(Error::Config(format!(
                    "{name} must contain the {ID_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(())
    }

    pub fn id_range(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

/// How the log and tag files are opened at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkMode {
    /// Keep previous runs' lines and append after them.
    #[default]
    Append,
    /// Start every run with empty files.
    Truncate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// UTC, e.g. `2024-03-01T10:15:30.123Z`.
    #[default]
    Rfc3339,
    /// Local wall clock, e.g. `2024-03-01 11:15:30`.
    Local,
}

/// Where things live on the target site.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub page_url: String,
    pub download_button: String,
    pub tag_selector: String,
    /// A page whose title contains this is treated as removed.
    pub not_found_marker: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            page_url: "https://wall.alphacoders.com/big.php?i={id}".into(),
            download_button: "#wallpaper_{id}_download_button".into(),
            tag_selector: "#content-organization-container a".into(),
            not_found_marker: "404".into(),
        }
    }
}

impl SiteConfig {
    pub fn page_url(&self, id: u64) -> String {
        self.page_url.replace(ID_PLACEHOLDER, &id.to_string())
    }

    pub fn download_button(&self, id: u64) -> String {
        self.download_button.replace(ID_PLACEHOLDER, &id.to_string())
    }

    pub fn is_not_found(&self, title: &str) -> bool {
        title.contains(&self.not_found_marker)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Chrome executable; chromiumoxide looks one up when unset.
    pub chrome_path: Option<PathBuf>,
    /// DevTools endpoint of an already running browser, e.g. `http://localhost:9222`.
    /// When set nothing is launched.
    pub remote_url: Option<String>,
    pub stealth: bool,
    pub disable_images: bool,
    pub navigation_timeout_ms: u64,
    /// Block requests to ad and tracker hosts in every tab.
    pub block_ads: bool,
    /// URL patterns (`*` wildcards) blocked when `block_ads` is on.
    pub blocked_urls: Vec<String>,
    pub extra_args: Vec<String>,
}

const AD_HOSTS: &[&str] = &[
    "*doubleclick.net*",
    "*googlesyndication.com*",
    "*googleadservices.com*",
    "*google-analytics.com*",
    "*googletagmanager.com*",
    "*adservice.google.*",
    "*amazon-adsystem.com*",
    "*adnxs.com*",
    "*criteo.com*",
    "*taboola.com*",
    "*outbrain.com*",
    "*scorecardresearch.com*",
    "*quantserve.com*",
    "*pubmatic.com*",
    "*rubiconproject.com*",
];

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            remote_url: None,
            stealth: true,
            disable_images: true,
            navigation_timeout_ms: 30_000,
            block_ads: true,
            blocked_urls: AD_HOSTS.iter().map(|h| h.to_string()).collect(),
            extra_args: Vec::new(),
        }
    }
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Patterns to hand to the browser's URL blocklist. Empty when ad blocking is off.
    pub fn blocked_url_patterns(&self) -> Vec<String> {
        if self.block_ads {
            self.blocked_urls.clone()
        } else {
            Vec::new()
        }
    }
}

/// Download wallpapers for a range of IDs.
#[derive(Debug, Default, Parser)]
#[command(name = "wallscrap", version, about)]
pub struct Cli {
    /// TOML config file.
    #[arg(short, long, env = "WALLSCRAP_CONFIG")]
    pub config: Option<PathBuf>,
    /// First ID to fetch.
    #[arg(long)]
    pub start: Option<u64>,
    /// Last ID to fetch (inclusive).
    #[arg(long)]
    pub end: Option<u64>,
    /// Number of browser tabs working in parallel.
    #[arg(short, long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub max_retries: Option<u32>,
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
    #[arg(long)]
    pub user_agents: Option<PathBuf>,
    /// Show the browser window.
    #[arg(long)]
    pub headful: bool,
    /// Attach to a running browser instead of launching one.
    #[arg(long)]
    pub remote_url: Option<String>,
}

impl Cli {
    /// Builds the final, validated config.
    pub async fn into_config(self) -> Result<ScrapeConfig> {
        let base = match &self.config {
            Some(path) => ScrapeConfig::from_file(path).await?,
            None => ScrapeConfig::default(),
        };
        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    fn apply(self, mut config: ScrapeConfig) -> ScrapeConfig {
        if let Some(start) = self.start {
            config.start = start;
        }
        if let Some(end) = self.end {
            config.end = end;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(dir) = self.download_dir {
            config.download_dir = dir;
        }
        if let Some(path) = self.user_agents {
            config.user_agents = path;
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(url) = self.remote_url {
            config.browser.remote_url = Some(url);
        }
        config
    }
}
