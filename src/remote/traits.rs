use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("log API returned error status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("log directory error: {0}")]
    Generic(String),
}

/// One entry of a log file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileDescriptor {
    #[serde(rename = "LogFileName")]
    pub name: String,
    /// Last write time, milliseconds since the Unix epoch.
    #[serde(rename = "LastWritten")]
    pub last_written: i64,
    #[serde(rename = "Size", default)]
    pub size: i64,
}

/// Result of a single portion download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawChunk {
    pub data: String,
    pub next_marker: String,
    /// The remote side already holds more data past this chunk.
    pub has_more: bool,
}

/// Listing and chunked download of a database instance's log files.
#[async_trait]
pub trait LogDirectory: Send + Sync {
    /// Files written after `since_ms`, at most `max_records` of them.
    async fn list_log_files(
        &self,
        source_id: &str,
        since_ms: i64,
        max_records: usize,
    ) -> Result<Vec<LogFileDescriptor>, DirectoryError>;

    /// Next portion of `file_name` starting at `marker` (`"0"` = beginning).
    async fn download_portion(
        &self,
        source_id: &str,
        file_name: &str,
        marker: &str,
    ) -> Result<RawChunk, DirectoryError>;
}
