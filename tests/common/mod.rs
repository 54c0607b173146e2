#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use wallscrap::config::{ScrapeConfig, SinkMode, SiteConfig};
use wallscrap::session::{BrowserSession, PageSession, Readiness};
use wallscrap::sink::{EventLog, LineSink, TagSink};
use wallscrap::task::Downloader;
use wallscrap::user_agent::UserAgents;
use wallscrap::{Error, Result};

pub const AGENTS: &str = "agent-a\n\nagent-b\n  \nagent-c\n";

/// How the fake site answers for one ID.
#[derive(Debug, Clone)]
pub enum Page {
    Wallpaper(Vec<String>),
    Missing,
    /// Navigation fails this many times, then the page behaves like a wallpaper.
    Flaky(u32),
    /// The download button never shows up.
    NoButton,
    /// Clicking the download button fails this many times, then works.
    BrokenButton(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UserAgent { slot: usize, agent: String },
    Navigate { slot: usize, id: u64, readiness: Readiness, at: Duration },
    Click { slot: usize, id: u64, at: Duration },
}

pub struct FakeSite {
    pages: Mutex<HashMap<u64, Page>>,
    events: Mutex<Vec<Event>>,
    started: Instant,
    latency: fn(u64) -> Duration,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Self::with_latency(|_| Duration::ZERO)
    }

    /// Navigations to `id` take `latency(id)` of virtual time.
    pub fn with_latency(latency: fn(u64) -> Duration) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            started: Instant::now(),
            latency,
        })
    }

    pub fn set(&self, id: u64, page: Page) {
        self.pages.lock().unwrap().insert(id, page);
    }

    pub fn tabs(self: &Arc<Self>, count: usize) -> Vec<FakeTab> {
        (0..count)
            .map(|slot| FakeTab {
                site: self.clone(),
                slot,
                current: Mutex::new(None),
            })
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn navigations(&self, wanted: u64) -> Vec<(Readiness, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Navigate {
                    id, readiness, at, ..
                } if id == wanted => Some((readiness, at)),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(usize, u64, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Click { slot, id, at } => Some((slot, id, at)),
                _ => None,
            })
            .collect()
    }

    fn page(&self, id: u64) -> Page {
        self.pages
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Page::Wallpaper(vec![format!("tag{id}")]))
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct FakeTab {
    site: Arc<FakeSite>,
    slot: usize,
    current: Mutex<Option<u64>>,
}

impl FakeTab {
    fn current(&self) -> Result<u64> {
        self.current
            .lock()
            .unwrap()
            .ok_or_else(|| Error::Script("no page loaded".into()))
    }
}

fn id_from_url(url: &str) -> u64 {
    url.rsplit('=').next().unwrap().parse().unwrap()
}

#[async_trait]
impl PageSession for FakeTab {
    async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.site.push(Event::UserAgent {
            slot: self.slot,
            agent: user_agent.to_string(),
        });
        Ok(())
    }

    async fn navigate(&self, url: &str, readiness: Readiness) -> Result<()> {
        let id = id_from_url(url);
        self.site.push(Event::Navigate {
            slot: self.slot,
            id,
            readiness,
            at: self.site.now(),
        });
        *self.current.lock().unwrap() = None;
        sleep((self.site.latency)(id)).await;

        if let Page::Flaky(left) = self.site.page(id) {
            if left > 0 {
                self.site.set(id, Page::Flaky(left - 1));
                return Err(Error::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: 30_000,
                });
            }
        }
        *self.current.lock().unwrap() = Some(id);
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        let id = self.current()?;
        Ok(match self.site.page(id) {
            Page::Missing => "404 - Page Not Found".to_string(),
            _ => format!("Wallpaper {id}"),
        })
    }

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()> {
        let id = self.current()?;
        let present = !matches!(self.site.page(id), Page::NoButton)
            && selector == format!("#wallpaper_{id}_download_button");
        if present {
            return Ok(());
        }
        sleep(timeout).await;
        Err(Error::ElementTimeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis(),
        })
    }

    async fn extract_text(&self, _selector: &str) -> Result<Vec<String>> {
        let id = self.current()?;
        Ok(match self.site.page(id) {
            Page::Wallpaper(tags) => tags,
            _ => vec![format!("tag{id}")],
        })
    }

    async fn click(&self, _selector: &str) -> Result<()> {
        let id = self.current()?;
        if let Page::BrokenButton(left) = self.site.page(id) {
            if left > 0 {
                self.site.set(id, Page::BrokenButton(left - 1));
                return Err(Error::Script("click went nowhere".into()));
            }
        }
        self.site.push(Event::Click {
            slot: self.slot,
            id,
            at: self.site.now(),
        });
        Ok(())
    }
}

/// Counts how often a run opens and closes its browser.
#[derive(Default)]
pub struct SessionCounts {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub tabs_returned: AtomicUsize,
}

impl SessionCounts {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn tabs_returned(&self) -> usize {
        self.tabs_returned.load(Ordering::SeqCst)
    }
}

pub struct FakeBrowser {
    pub site: Arc<FakeSite>,
    pub counts: Arc<SessionCounts>,
    /// Opening tabs fails, as when the browser dies right after launch.
    pub fail_open: bool,
}

impl FakeBrowser {
    pub fn new(site: &Arc<FakeSite>) -> (Self, Arc<SessionCounts>) {
        let counts = Arc::new(SessionCounts::default());
        let browser = Self {
            site: site.clone(),
            counts: counts.clone(),
            fail_open: false,
        };
        (browser, counts)
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    type Tab = FakeTab;

    async fn open_tabs(&self, count: usize) -> Result<Vec<FakeTab>> {
        self.counts.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(Error::BrowserLaunch("target crashed".into()));
        }
        Ok(self.site.tabs(count))
    }

    async fn close(self, tabs: Vec<FakeTab>) -> Result<()> {
        self.counts.closed.fetch_add(1, Ordering::SeqCst);
        self.counts.tabs_returned.fetch_add(tabs.len(), Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config(dir: &Path) -> ScrapeConfig {
    ScrapeConfig {
        start: 100,
        end: 105,
        workers: 3,
        download_dir: dir.join("wallpapers"),
        user_agents: dir.join("user-agent.txt"),
        log_file: dir.join("log.txt"),
        tag_file: dir.join("tags.txt"),
        site: SiteConfig {
            page_url: "https://walls.test/big.php?i={id}".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn downloader(config: &Arc<ScrapeConfig>) -> Downloader {
    std::fs::create_dir_all(&config.download_dir).unwrap();
    let log = EventLog::new(
        LineSink::open(&config.log_file, SinkMode::Append).await.unwrap(),
        config.timestamp,
    );
    let tags = TagSink::new(LineSink::open(&config.tag_file, SinkMode::Append).await.unwrap());
    Downloader::new(
        config.clone(),
        Arc::new(UserAgents::from_lines(AGENTS)),
        log,
        tags,
    )
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}
