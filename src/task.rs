//! The per-ID download task.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::sleep;

use crate::config::ScrapeConfig;
use crate::existing::existing_artifact;
use crate::log_event;
use crate::retry::{Attempt, RetryPolicy};
use crate::session::{PageSession, Readiness};
use crate::sink::{EventLog, TagSink};
use crate::user_agent::UserAgents;
use crate::Result;

/// How a single ID ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The download button was clicked. Whether the file actually landed on disk is up to the
    /// browser.
    Downloaded,
    SkippedExisting(PathBuf),
    NotFound,
    Failed { attempts: u32, error: String },
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Downloaded => write!(f, "downloaded"),
            TaskOutcome::SkippedExisting(path) => write!(f, "skipped ({})", path.display()),
            TaskOutcome::NotFound => write!(f, "not found"),
            TaskOutcome::Failed { attempts, error } => {
                write!(f, "failed after {attempts} attempts: {error}")
            }
        }
    }
}

/// Everything a download task needs besides its tab. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Downloader {
    config: Arc<ScrapeConfig>,
    agents: Arc<UserAgents>,
    log: EventLog,
    tags: TagSink,
}

impl Downloader {
    pub fn new(
        config: Arc<ScrapeConfig>,
        agents: Arc<UserAgents>,
        log: EventLog,
        tags: TagSink,
    ) -> Self {
        Self {
            config,
            agents,
            log,
            tags,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Downloads one wallpaper using `page`.
    ///
    /// Never fails: errors are retried according to the config and whatever is left over
    /// becomes [`TaskOutcome::Failed`].
    pub async fn download<S>(&self, page: &S, id: u64) -> TaskOutcome
    where
        S: PageSession + ?Sized,
    {
        let config = &self.config;
        if let Some(path) = existing_artifact(&config.download_dir, id, &config.extensions).await {
            log_event!(self.log, "Skipping existing file: {}", path.display());
            return TaskOutcome::SkippedExisting(path);
        }

        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
        };
        match policy.run(move |attempt| self.attempt(page, id, attempt)).await {
            Ok(outcome) => outcome,
            Err(exhausted) => {
                log_event!(self.log, "Max retry attempts reached for wallpaper with ID {id}");
                TaskOutcome::Failed {
                    attempts: exhausted.attempts,
                    error: exhausted.last.to_string(),
                }
            }
        }
    }

    async fn attempt<S>(&self, page: &S, id: u64, attempt: Attempt) -> Result<TaskOutcome>
    where
        S: PageSession + ?Sized,
    {
        let res = self.fetch(page, id, attempt).await;
        if let Err(e) = &res {
            if attempt.is_retry() {
                log_event!(
                    self.log,
                    "Error downloading wallpaper with ID {id} on retry {}: {e}",
                    attempt.retry
                );
            } else {
                log_event!(self.log, "Error downloading wallpaper with ID {id}: {e}");
            }
            if attempt.retry < self.config.max_retries {
                log_event!(
                    self.log,
                    "Retry attempt {} for wallpaper with ID {id}",
                    attempt.retry + 1
                );
            }
        }
        res
    }

    async fn fetch<S>(&self, page: &S, id: u64, attempt: Attempt) -> Result<TaskOutcome>
    where
        S: PageSession + ?Sized,
    {
        let site = &self.config.site;

        page.set_user_agent(self.agents.pick()?).await?;

        let readiness = if attempt.is_retry() {
            Readiness::NetworkIdle
        } else {
            Readiness::DomContentLoaded
        };
        page.navigate(&site.page_url(id), readiness).await?;

        if site.is_not_found(&page.title().await?) {
            log_event!(self.log, "Page with ID {id} not found (404 error)");
            return Ok(TaskOutcome::NotFound);
        }

        let button = site.download_button(id);
        page.wait_for_element(&button, self.config.element_timeout()).await?;

        let tags = page.extract_text(&site.tag_selector).await?;
        page.click(&button).await?;
        // One tag line per clicked ID, not per attempt.
        self.tags.record(id, &tags).await;
        log_event!(self.log, "Download initiated for wallpaper with ID {id}");

        sleep(self.config.download_delay()).await;
        Ok(TaskOutcome::Downloaded)
    }
}
