use std::sync::Arc;

use chrono::Local;
use tracing::warn;

use crate::chrome::ChromeBrowser;
use crate::config::ScrapeConfig;
use crate::dispatch::{Dispatcher, RunSummary};
use crate::session::BrowserSession;
use crate::sink::{EventLog, LineSink, TagSink};
use crate::task::Downloader;
use crate::user_agent::UserAgents;
use crate::{info_time, log_event, Result};

/// Sweeps the whole configured ID range once.
///
/// Only startup problems (user agents, sinks, browser) make this fail. Per-ID failures end up in
/// the log and the returned summary.
pub async fn scrape_range(config: ScrapeConfig) -> Result<RunSummary> {
    let config = Arc::new(config);
    let downloader = prepare(&config).await?;
    let chrome = ChromeBrowser::start(&config.browser, &config.download_dir).await?;
    run_session(config, downloader, chrome).await
}

/// Loads the user agents and opens both sinks.
pub async fn prepare(config: &Arc<ScrapeConfig>) -> Result<Downloader> {
    let agents = Arc::new(UserAgents::from_file(&config.user_agents).await?);
    info_time!(
        "Loaded {} user agents from {}",
        agents.len(),
        config.user_agents.display()
    );

    let log = EventLog::new(
        LineSink::open(&config.log_file, config.sink_mode).await?,
        config.timestamp,
    );
    let tags = TagSink::new(LineSink::open(&config.tag_file, config.sink_mode).await?);
    Ok(Downloader::new(config.clone(), agents, log, tags))
}

/// Opens the worker tabs on `browser`, dispatches the range over them and closes the browser.
///
/// The browser is closed exactly once, also when the tabs can't be opened.
pub async fn run_session<B>(
    config: Arc<ScrapeConfig>,
    downloader: Downloader,
    browser: B,
) -> Result<RunSummary>
where
    B: BrowserSession,
{
    let start_time = Local::now();
    let tabs = match browser.open_tabs(config.workers).await {
        Ok(tabs) => tabs,
        Err(e) => {
            if let Err(close_err) = browser.close(Vec::new()).await {
                warn!(error = %close_err, "couldn't close browser after failed startup");
            }
            return Err(e);
        }
    };
    info_time!(start_time, "Opened {} tabs", tabs.len());

    let log = downloader.log().clone();
    let dispatcher = Dispatcher::new(config.clone(), downloader, tabs);
    let summary = dispatcher.run().await;
    log_event!(log, "{summary}");

    browser.close(dispatcher.into_slots()).await?;
    info_time!(start_time, "Finished PROCESSING IDs {}..={}", config.start, config.end);

    Ok(summary)
}
