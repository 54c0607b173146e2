//! Chromium backed [`PageSession`], driven over CDP with chromiumoxide.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventDomContentEventFired, NavigateParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::parse::select_text;
use crate::session::{BrowserSession, PageSession, Readiness};
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves once the document is complete and no new resource has been requested for 500 ms.
const NETWORK_IDLE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        let seen = -1;
        let quietSince = Date.now();
        const tick = () => {
            const count = performance.getEntriesByType('resource').length;
            if (count !== seen) {
                seen = count;
                quietSince = Date.now();
            }
            if (document.readyState === 'complete' && Date.now() - quietSince >= 500) {
                resolve(count);
            } else {
                setTimeout(tick, 100);
            }
        };
        tick();
    })
"#;

const STEALTH_SCRIPTS: &[&str] = &[
    r#"Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });"#,
    r#"window.chrome = window.chrome || { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };"#,
    r#"Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });"#,
    r#"Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });"#,
];

/// A launched (or attached) browser owning the CDP handler task.
pub struct ChromeBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    remote: bool,
    settings: BrowserSettings,
}

impl ChromeBrowser {
    /// Launches chromium, or attaches to `settings.remote_url`, and lets it save downloads to
    /// `download_dir` without prompting.
    pub async fn start(settings: &BrowserSettings, download_dir: &Path) -> Result<Self> {
        let (browser, mut handler, remote) = match &settings.remote_url {
            Some(remote_url) => {
                let ws_url = discover_ws_url(remote_url).await?;
                info!(%ws_url, "attaching to running browser");
                let (browser, handler) = Browser::connect(ws_url).await?;
                (browser, handler, true)
            }
            None => {
                info!(headless = settings.headless, "launching browser");
                let (browser, handler) = Browser::launch(launch_config(settings)?)
                    .await
                    .map_err(|e| Error::BrowserLaunch(e.to_string()))?;
                (browser, handler, false)
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "cdp handler");
                }
            }
        });

        let chrome = Self {
            browser,
            handler,
            remote,
            settings: settings.clone(),
        };
        chrome.allow_downloads(download_dir).await?;
        Ok(chrome)
    }

    async fn allow_downloads(&self, download_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(download_dir).await?;
        let dir = tokio::fs::canonicalize(download_dir).await?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.display().to_string())
            .build()
            .map_err(Error::BrowserLaunch)?;
        self.browser.execute(params).await?;
        debug!(dir = %dir.display(), "downloads allowed");
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromeBrowser {
    type Tab = ChromeTab;

    /// Opens the worker tabs. They stay open for the whole run.
    async fn open_tabs(&self, count: usize) -> Result<Vec<ChromeTab>> {
        let blocked = self.settings.blocked_url_patterns();
        let mut tabs = Vec::with_capacity(count);
        for _ in 0..count {
            let page = self.browser.new_page("about:blank").await?;
            if self.settings.stealth {
                for script in STEALTH_SCRIPTS {
                    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(*script))
                        .await?;
                }
            }
            if !blocked.is_empty() {
                page.execute(SetBlockedUrLsParams::new(blocked.clone()))
                    .await?;
            }
            tabs.push(ChromeTab {
                page,
                navigation_timeout: self.settings.navigation_timeout(),
            });
        }
        Ok(tabs)
    }

    /// A launched browser is closed; for an attached one only our own tabs are.
    async fn close(mut self, tabs: Vec<ChromeTab>) -> Result<()> {
        if self.remote {
            for tab in tabs {
                if let Err(e) = tab.page.close().await {
                    warn!(error = %e, "couldn't close tab");
                }
            }
        } else {
            drop(tabs);
            self.browser.close().await?;
        }
        self.handler.abort();
        Ok(())
    }
}

fn launch_config(settings: &BrowserSettings) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder();
    if !settings.headless {
        builder = builder.with_head();
    }
    if let Some(path) = &settings.chrome_path {
        builder = builder.chrome_executable(path);
    }
    for arg in launch_args(settings) {
        builder = builder.arg(arg);
    }
    builder.build().map_err(Error::BrowserLaunch)
}

fn launch_args(settings: &BrowserSettings) -> Vec<String> {
    let mut args: Vec<String> = [
        "--incognito",
        "--start-maximized",
        "--disable-web-security",
        "--disable-dev-shm-usage",
        "--disable-setuid-sandbox",
        "--no-sandbox",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    if settings.stealth {
        args.push("--disable-blink-features=AutomationControlled".into());
    }
    if settings.disable_images {
        args.push("--blink-settings=imagesEnabled=false".into());
    }
    args.extend(settings.extra_args.iter().cloned());
    args
}

/// Resolves the DevTools websocket of a running browser from its `/json/version` endpoint.
async fn discover_ws_url(remote_url: &str) -> Result<String> {
    if remote_url.contains("/devtools/browser/") {
        return Ok(remote_url.to_string());
    }
    let info: serde_json::Value = reqwest::get(version_url(remote_url))
        .await?
        .error_for_status()?
        .json()
        .await?;
    info.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| Error::RemoteBrowser(remote_url.to_string()))
}

fn version_url(remote_url: &str) -> String {
    let http = remote_url
        .replacen("wss://", "https://", 1)
        .replacen("ws://", "http://", 1);
    format!("{}/json/version", http.trim_end_matches('/'))
}

fn click_script(selector: &str) -> String {
    // JSON string literals are valid JS string literals.
    let sel = serde_json::Value::from(selector).to_string();
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el) {{ throw new Error('nothing matches ' + {sel}); }} \
         el.click(); return true; }})()"
    )
}

/// Waits for the tab's `DOMContentLoaded` event while the navigate command is in flight.
///
/// A failed command ends the wait early. A successful one doesn't: the command may answer
/// before the document is parsed. If the event stream ends first, the command decides.
async fn until_dom_ready<N, R>(navigation: N, dom_ready: R) -> Result<()>
where
    N: Future<Output = Result<()>>,
    R: Future<Output = bool>,
{
    tokio::pin!(navigation, dom_ready);
    tokio::select! {
        res = &mut navigation => {
            res?;
            dom_ready.await;
            Ok(())
        }
        fired = &mut dom_ready => {
            if fired {
                Ok(())
            } else {
                navigation.await
            }
        }
    }
}

/// A worker tab.
pub struct ChromeTab {
    page: Page,
    navigation_timeout: Duration,
}

impl ChromeTab {
    async fn navigate_inner(&self, url: &str, readiness: Readiness) -> Result<()> {
        match readiness {
            Readiness::DomContentLoaded => {
                let mut dom_ready = self
                    .page
                    .event_listener::<EventDomContentEventFired>()
                    .await?;
                let navigation = async {
                    let nav = self.page.execute(NavigateParams::new(url)).await?;
                    match &nav.result.error_text {
                        Some(error) => Err(Error::Script(format!(
                            "navigation to {url} failed: {error}"
                        ))),
                        None => Ok(()),
                    }
                };
                until_dom_ready(navigation, async { dom_ready.next().await.is_some() }).await
            }
            Readiness::NetworkIdle => {
                self.page.goto(url).await?;
                self.page.evaluate(NETWORK_IDLE_SCRIPT.to_string()).await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PageSession for ChromeTab {
    async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await?;
        Ok(())
    }

    async fn navigate(&self, url: &str, readiness: Readiness) -> Result<()> {
        debug!(url, ?readiness, "navigating");
        tokio::time::timeout(self.navigation_timeout, self.navigate_inner(url, readiness))
            .await
            .map_err(|_| Error::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: self.navigation_timeout.as_millis(),
            })?
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()> {
        let poll = async {
            while self.page.find_element(selector).await.is_err() {
                sleep(POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| Error::ElementTimeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis(),
            })
    }

    async fn extract_text(&self, selector: &str) -> Result<Vec<String>> {
        let html = self.page.content().await?;
        select_text(html, selector).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page
            .evaluate(click_script(selector))
            .await
            .map_err(|e| Error::Script(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_follow_settings() {
        let mut settings = BrowserSettings::default();
        let args = launch_args(&settings);
        assert!(args.contains(&"--incognito".to_string()));
        assert!(args.contains(&"--blink-settings=imagesEnabled=false".to_string()));

        settings.disable_images = false;
        settings.stealth = false;
        settings.extra_args = vec!["--proxy-server=socks5://127.0.0.1:1080".into()];
        let args = launch_args(&settings);
        assert!(!args.iter().any(|a| a.starts_with("--blink-settings")));
        assert!(!args.iter().any(|a| a.contains("AutomationControlled")));
        assert_eq!(
            args.last().map(String::as_str),
            Some("--proxy-server=socks5://127.0.0.1:1080")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dom_ready_returns_before_the_load_event() {
        let start = tokio::time::Instant::now();
        let navigation = async {
            sleep(Duration::from_secs(10)).await;
            Ok(())
        };
        let dom_ready = async {
            sleep(Duration::from_secs(1)).await;
            true
        };
        until_dom_ready(navigation, dom_ready).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn committed_navigation_still_waits_for_dom_ready() {
        let start = tokio::time::Instant::now();
        let navigation = async {
            sleep(Duration::from_millis(200)).await;
            Ok(())
        };
        let dom_ready = async {
            sleep(Duration::from_secs(2)).await;
            true
        };
        until_dom_ready(navigation, dom_ready).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_navigation_wins_over_a_pending_dom_ready() {
        let navigation = async { Err(Error::Script("net::ERR_NAME_NOT_RESOLVED".into())) };
        let dom_ready = std::future::pending::<bool>();
        assert!(matches!(
            until_dom_ready(navigation, dom_ready).await,
            Err(Error::Script(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_event_stream_falls_back_to_the_command() {
        let start = tokio::time::Instant::now();
        let navigation = async {
            sleep(Duration::from_secs(3)).await;
            Ok(())
        };
        until_dom_ready(navigation, async { false }).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn version_url_from_remote_url() {
        assert_eq!(
            version_url("http://localhost:9222/"),
            "http://localhost:9222/json/version"
        );
        assert_eq!(
            version_url("ws://127.0.0.1:9222"),
            "http://127.0.0.1:9222/json/version"
        );
    }

    #[test]
    fn click_script_quotes_the_selector() {
        let script = click_script(r#"a[title="x"]"#);
        assert!(script.contains(r#"document.querySelector("a[title=\"x\"]")"#));
        assert!(script.contains("el.click()"));
    }
}
