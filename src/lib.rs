//! Downloads wallpapers over a range of numeric IDs by driving a browser.
//!
//! A fixed pool of tabs works through the range in batches of one ID per tab. Every ID is
//! skipped if it's already on disk, otherwise its page is opened, the tags are written to the
//! tag file and the download button is clicked. Failures are retried a few times with a growing
//! delay and never stop the run.

mod error;
mod macros;

pub mod chrome;
pub mod config;
pub mod dispatch;
pub mod existing;
pub mod parse;
pub mod process;
pub mod retry;
pub mod session;
pub mod sink;
pub mod task;
pub mod user_agent;

pub use error::{Error, Result};
