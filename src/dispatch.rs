use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::Local;
use futures::future::join_all;
use tokio::time::sleep;

use crate::config::ScrapeConfig;
use crate::info_time;
use crate::session::PageSession;
use crate::task::{Downloader, TaskOutcome};

/// Per-kind outcome counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Downloaded => self.downloaded += 1,
            TaskOutcome::SkippedExisting(_) => self.skipped += 1,
            TaskOutcome::NotFound => self.not_found += 1,
            TaskOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Finished {} batches: {} downloaded, {} skipped, {} not found, {} failed",
            self.batches, self.downloaded, self.skipped, self.not_found, self.failed
        )
    }
}

/// Splits `range` into consecutive chunks of at most `size` IDs.
pub fn batches(
    range: RangeInclusive<u64>,
    size: usize,
) -> impl Iterator<Item = RangeInclusive<u64>> {
    let (start, end) = range.into_inner();
    let step = size.max(1) as u64 - 1;
    let mut next = (start <= end).then_some(start);
    std::iter::from_fn(move || {
        let first = next?;
        let last = first.saturating_add(step).min(end);
        next = if last < end { Some(last + 1) } else { None };
        Some(first..=last)
    })
}

/// Walks the configured ID range one batch at a time.
///
/// A batch holds one ID per tab, and the n-th ID of a batch always runs on the n-th tab. The next
/// batch only starts after every task of the current one has settled, so there is never more
/// than one task per tab.
pub struct Dispatcher<S> {
    config: Arc<ScrapeConfig>,
    downloader: Downloader,
    slots: Vec<S>,
}

impl<S: PageSession> Dispatcher<S> {
    pub fn new(config: Arc<ScrapeConfig>, downloader: Downloader, slots: Vec<S>) -> Self {
        Self {
            config,
            downloader,
            slots,
        }
    }

    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut pending = batches(self.config.id_range(), self.slots.len()).peekable();

        while let Some(batch) = pending.next() {
            let start_batch_time = Local::now();
            let tasks = batch
                .clone()
                .zip(&self.slots)
                .map(|(id, slot)| self.downloader.download(slot, id));

            for outcome in join_all(tasks).await {
                summary.record(&outcome);
            }
            summary.batches += 1;
            info_time!(
                start_batch_time,
                "Processed batch {}..={}",
                batch.start(),
                batch.end()
            );

            if pending.peek().is_some() {
                sleep(self.config.batch_delay()).await;
            }
        }
        summary
    }

    /// Hands the tabs back, e.g. to close them.
    pub fn into_slots(self) -> Vec<S> {
        self.slots
    }
}
