use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The DOM is parsed. Fast, used on the first attempt.
    DomContentLoaded,
    /// The page has stopped pulling in resources. Slower but survives pages that finish
    /// rendering late, used on retries.
    NetworkIdle,
}

/// One browser tab as seen by a download task.
///
/// Implemented by [`ChromeTab`](crate::chrome::ChromeTab) for real runs; tests drive the task and
/// the dispatcher with scripted fakes.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Overrides the User-Agent for subsequent requests from this tab.
    async fn set_user_agent(&self, user_agent: &str) -> Result<()>;

    async fn navigate(&self, url: &str, readiness: Readiness) -> Result<()>;

    async fn title(&self) -> Result<String>;

    /// Waits until an element matching `selector` exists. Fails with
    /// [`Error::ElementTimeout`](crate::Error::ElementTimeout) when it doesn't show up in time.
    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Text content of every element matching `selector`.
    async fn extract_text(&self, selector: &str) -> Result<Vec<String>>;

    /// Clicks the first element matching `selector` from inside the page.
    async fn click(&self, selector: &str) -> Result<()>;
}

/// The browser behind the worker tabs: opened once, closed once.
#[async_trait]
pub trait BrowserSession: Send + Sync + Sized {
    type Tab: PageSession + 'static;

    async fn open_tabs(&self, count: usize) -> Result<Vec<Self::Tab>>;

    /// Ends the session. Gets back every tab handed out by [`open_tabs`](Self::open_tabs).
    async fn close(self, tabs: Vec<Self::Tab>) -> Result<()>;
}
