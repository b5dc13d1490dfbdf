pub mod channel;
pub mod json_lines;

use crate::source::parser::ParsedRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use channel::{create_channel, ChannelSink};
pub use json_lines::JsonLinesSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink channel closed")]
    ChannelClosed,
}

/// A record on its way downstream, stamped with its tag and event time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub tag: String,
    pub time: DateTime<Utc>,
    pub record: ParsedRecord,
}

/// Downstream consumer of emitted records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, event: Event) -> Result<(), SinkError>;
}
