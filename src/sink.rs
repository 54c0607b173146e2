//! Append-only text sinks shared by all download tasks.
//!
//! Writes are best effort: a failing write is reported through `tracing` and then dropped, so
//! a full disk or a removed log file never takes a batch down with it. Lines from concurrent
//! tasks may interleave, but each line is written whole.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, SecondsFormat, Utc};
use tokio::{fs::File, fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;

use crate::config::{SinkMode, TimestampFormat};
use crate::Result;

/// A shared handle to a line oriented file. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct LineSink {
    file: Arc<Mutex<File>>,
    name: Arc<str>,
}

impl LineSink {
    pub async fn open(path: &Path, mode: SinkMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            SinkMode::Append => options.append(true),
            SinkMode::Truncate => options.write(true).truncate(true),
        };
        let file = options.open(path).await?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            name: path.display().to_string().into(),
        })
    }

    /// Writes `line` followed by a newline.
    pub async fn append(&self, line: &str) {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut file = self.file.lock().await;
        if let Err(e) = file.write_all(buf.as_bytes()).await {
            warn!(sink = %self.name, error = %e, "dropped line");
            return;
        }
        if let Err(e) = file.flush().await {
            warn!(sink = %self.name, error = %e, "flush failed");
        }
    }
}

/// Run log. Every event goes to stdout and to the log file as `[<timestamp>] <message>`.
#[derive(Debug, Clone)]
pub struct EventLog {
    sink: LineSink,
    format: TimestampFormat,
}

impl EventLog {
    pub fn new(sink: LineSink, format: TimestampFormat) -> Self {
        Self { sink, format }
    }

    pub async fn record(&self, message: &str) {
        let line = format!("[{}] {}", timestamp(self.format), message);
        println!("{line}");
        self.sink.append(&line).await;
    }
}

/// Tag file, one `<id>: tag1, tag2, ...` line per scraped wallpaper.
#[derive(Debug, Clone)]
pub struct TagSink {
    sink: LineSink,
}

impl TagSink {
    pub fn new(sink: LineSink) -> Self {
        Self { sink }
    }

    pub async fn record(&self, id: u64, tags: &[String]) {
        self.sink.append(&tag_line(id, tags)).await;
    }
}

fn tag_line(id: u64, tags: &[String]) -> String {
    format!("{id}: {}", tags.join(", "))
}

pub fn timestamp(format: TimestampFormat) -> String {
    match format {
        TimestampFormat::Rfc3339 => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        TimestampFormat::Local => Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}
