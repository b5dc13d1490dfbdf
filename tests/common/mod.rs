use async_trait::async_trait;
use rds_pgsql_log::poller::{PollController, PollSettings};
use rds_pgsql_log::remote::{DirectoryError, LogDirectory, LogFileDescriptor, RawChunk};
use rds_pgsql_log::sink::{create_channel, Event};
use rds_pgsql_log::source::RecordParser;
use rds_pgsql_log::storage::CursorStore;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const DRAIN_DELAY: Duration = Duration::from_millis(500);
pub const INTERVAL: Duration = Duration::from_secs(30);

/// Listing request as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    pub source_id: String,
    pub since_ms: i64,
    pub max_records: usize,
}

/// Download request as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCall {
    pub file_name: String,
    pub marker: String,
}

/// Replays queued listing and download responses in order.
#[derive(Default)]
pub struct ScriptedDirectory {
    listings: Mutex<VecDeque<Result<Vec<LogFileDescriptor>, String>>>,
    chunks: Mutex<VecDeque<Result<RawChunk, String>>>,
    pub list_calls: Mutex<Vec<ListCall>>,
    pub download_calls: Mutex<Vec<DownloadCall>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_listing(&self, files: Vec<LogFileDescriptor>) {
        self.listings.lock().unwrap().push_back(Ok(files));
    }

    pub fn push_listing_error(&self, message: &str) {
        self.listings
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn push_chunk(&self, data: &str, marker: &str, has_more: bool) {
        self.chunks.lock().unwrap().push_back(Ok(RawChunk {
            data: data.to_string(),
            next_marker: marker.to_string(),
            has_more,
        }));
    }

    pub fn push_chunk_error(&self, message: &str) {
        self.chunks
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn download_calls(&self) -> Vec<DownloadCall> {
        self.download_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogDirectory for ScriptedDirectory {
    async fn list_log_files(
        &self,
        source_id: &str,
        since_ms: i64,
        max_records: usize,
    ) -> Result<Vec<LogFileDescriptor>, DirectoryError> {
        self.list_calls.lock().unwrap().push(ListCall {
            source_id: source_id.to_string(),
            since_ms,
            max_records,
        });

        match self.listings.lock().unwrap().pop_front() {
            Some(Ok(files)) => Ok(files),
            Some(Err(message)) => Err(DirectoryError::Generic(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn download_portion(
        &self,
        _source_id: &str,
        file_name: &str,
        marker: &str,
    ) -> Result<RawChunk, DirectoryError> {
        self.download_calls.lock().unwrap().push(DownloadCall {
            file_name: file_name.to_string(),
            marker: marker.to_string(),
        });

        match self.chunks.lock().unwrap().pop_front() {
            Some(Ok(chunk)) => Ok(chunk),
            Some(Err(message)) => Err(DirectoryError::Generic(message)),
            None => Err(DirectoryError::Generic("no chunk scripted".to_string())),
        }
    }
}

pub fn file(name: &str, last_written: i64) -> LogFileDescriptor {
    LogFileDescriptor {
        name: name.to_string(),
        last_written,
        size: 123,
    }
}

pub fn settings() -> PollSettings {
    PollSettings {
        source_id: "test-postgres-id".to_string(),
        tag: "rds-pgsql.log".to_string(),
        interval: INTERVAL,
        drain_delay: DRAIN_DELAY,
    }
}

pub fn controller(
    directory: Arc<ScriptedDirectory>,
    pos_file: &Path,
) -> (PollController, mpsc::Receiver<Event>) {
    let (sink, rx) = create_channel(1024);
    let store = CursorStore::new(pos_file).unwrap();
    let controller = PollController::new(
        directory,
        Arc::new(sink),
        store,
        RecordParser::new().unwrap(),
        settings(),
    );
    (controller, rx)
}

pub fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
