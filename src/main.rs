use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wallscrap::{config::Cli, info_time, process::scrape_range, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let start_time = Local::now();
    let config = Cli::parse().into_config().await?;
    info_time!(
        "Started scraping IDs {}..={} with {} tabs",
        config.start,
        config.end,
        config.workers
    );

    let summary = scrape_range(config).await?;
    info_time!(start_time, "Full program time: {}", summary);

    Ok(())
}
