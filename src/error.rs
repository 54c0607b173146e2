use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    InvalidSelector(String),

    #[error("Element {selector} did not appear within {timeout_ms} ms")]
    ElementTimeout { selector: String, timeout_ms: u128 },

    #[error("Navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u128 },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Couldn't read user agents from {path}: {source}")]
    UserAgentFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No user agents available to pick from.")]
    NoUserAgents,

    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Couldn't parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("Couldn't launch the browser: {0}")]
    BrowserLaunch(String),
    #[error("Remote browser at {0} did not report a webSocketDebuggerUrl")]
    RemoteBrowser(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
