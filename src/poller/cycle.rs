use crate::config::types::Config;
use crate::remote::traits::{DirectoryError, LogDirectory};
use crate::sink::{Event, RecordSink, SinkError};
use crate::source::parser::RecordParser;
use crate::source::timestamp::{parse_log_time, to_epoch_millis};
use crate::storage::cursor::{Cursor, CursorStore};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Files requested per listing. One file per cycle keeps memory bounded.
pub const MAX_FILES_PER_CYCLE: usize = 1;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("log directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Step of a cycle, reported alongside failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    LoadCursor,
    ListFiles,
    Download,
    Emit,
    SaveCursor,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::LoadCursor => "load_cursor",
            CyclePhase::ListFiles => "list_files",
            CyclePhase::Download => "download",
            CyclePhase::Emit => "emit",
            CyclePhase::SaveCursor => "save_cursor",
            CyclePhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub source_id: String,
    pub tag: String,
    pub interval: Duration,
    pub drain_delay: Duration,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_id: config.source.db_instance_identifier.clone(),
            tag: config.tag.clone(),
            interval: config.poll.interval(),
            drain_delay: config.poll.drain_delay,
        }
    }
}

/// What one cycle did and when the next one should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub file: Option<String>,
    pub records: usize,
    pub more_pending: bool,
    pub next_delay: Duration,
    /// Phase that failed, if any.
    pub failed_phase: Option<CyclePhase>,
}

/// State owned by a single cycle, threaded through its steps.
#[derive(Debug)]
struct CycleState {
    cursor: Cursor,
    phase: CyclePhase,
    file: Option<String>,
    marker: Option<String>,
    records: usize,
    more_pending: bool,
}

impl CycleState {
    fn new(cursor: Cursor) -> Self {
        Self {
            cursor,
            phase: CyclePhase::LoadCursor,
            file: None,
            marker: None,
            records: 0,
            more_pending: false,
        }
    }
}

/// Runs one poll cycle at a time: cursor in, one chunk of one file out.
pub struct PollController {
    directory: Arc<dyn LogDirectory>,
    sink: Arc<dyn RecordSink>,
    store: CursorStore,
    parser: RecordParser,
    settings: PollSettings,
    // Cursor whose save failed; used instead of the file on the next cycle.
    unsaved: Option<Cursor>,
}

impl PollController {
    pub fn new(
        directory: Arc<dyn LogDirectory>,
        sink: Arc<dyn RecordSink>,
        store: CursorStore,
        parser: RecordParser,
        settings: PollSettings,
    ) -> Self {
        Self {
            directory,
            sink,
            store,
            parser,
            settings,
            unsaved: None,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Run one cycle. Failures are logged and folded into the outcome.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let (cursor, carried_over) = self.current_cursor().await;
        let loaded = cursor.clone();
        let mut state = CycleState::new(cursor);

        let mut failed_phase = None;
        if let Err(e) = self.advance(&mut state).await {
            warn!(
                phase = %state.phase,
                file = state.file.as_deref().unwrap_or("-"),
                marker = state.marker.as_deref().unwrap_or("-"),
                error = %e,
                "Poll cycle failed"
            );
            failed_phase = Some(state.phase);
        }

        if carried_over || state.cursor != loaded {
            state.phase = CyclePhase::SaveCursor;
            if let Err(e) = self.store.save(&state.cursor).await {
                warn!(
                    phase = %state.phase,
                    path = %self.store.path().display(),
                    file = state.file.as_deref().unwrap_or("-"),
                    marker = state.marker.as_deref().unwrap_or("-"),
                    error = %e,
                    "Failed to persist cursor, will retry next cycle"
                );
                failed_phase = failed_phase.or(Some(CyclePhase::SaveCursor));
                self.unsaved = Some(state.cursor.clone());
            }
        }

        let next_delay = if failed_phase.is_none() && state.more_pending {
            self.settings.drain_delay
        } else {
            self.settings.interval
        };

        debug!(
            file = state.file.as_deref().unwrap_or("-"),
            records = state.records,
            more_pending = state.more_pending,
            last_written_ms = state.cursor.last_written_ms,
            delay_ms = next_delay.as_millis() as u64,
            "Poll cycle finished"
        );

        CycleOutcome {
            file: state.file,
            records: state.records,
            more_pending: state.more_pending,
            next_delay,
            failed_phase,
        }
    }

    /// Returns the cursor to start from, and whether it is an unsaved carry-over.
    async fn current_cursor(&mut self) -> (Cursor, bool) {
        if let Some(cursor) = self.unsaved.take() {
            return (cursor, true);
        }

        match self.store.load().await {
            Ok(cursor) => (cursor, false),
            Err(e) => {
                warn!(
                    phase = %CyclePhase::LoadCursor,
                    path = %self.store.path().display(),
                    error = %e,
                    "Failed to load cursor, starting from zero"
                );
                (Cursor::default(), false)
            }
        }
    }

    async fn advance(&self, state: &mut CycleState) -> Result<(), CycleError> {
        state.phase = CyclePhase::ListFiles;
        let files = self
            .directory
            .list_log_files(
                &self.settings.source_id,
                state.cursor.last_written_ms,
                MAX_FILES_PER_CYCLE,
            )
            .await?;

        let Some(file) = files.into_iter().next() else {
            debug!(
                since_ms = state.cursor.last_written_ms,
                "No log files written since cursor"
            );
            state.phase = CyclePhase::Done;
            return Ok(());
        };

        let marker = state.cursor.marker_for(&file.name).to_string();
        state.file = Some(file.name.clone());
        state.marker = Some(marker.clone());

        state.phase = CyclePhase::Download;
        let chunk = self
            .directory
            .download_portion(&self.settings.source_id, &file.name, &marker)
            .await?;

        state.cursor.record_marker(&file.name, &chunk.next_marker);
        state.more_pending = chunk.has_more;

        state.phase = CyclePhase::Emit;
        let output = self.parser.parse(&file.name, chunk.data.lines());

        for record in output.records {
            let time = match record.event_time() {
                Ok(time) => time,
                Err(e) => {
                    warn!(file = %file.name, time = %record.time, error = %e, "Unparseable record time, using current time");
                    Utc::now()
                }
            };

            self.sink
                .emit(Event {
                    tag: self.settings.tag.clone(),
                    time,
                    record,
                })
                .await?;
            state.records += 1;
        }

        match output.last_time.as_deref().map(parse_log_time) {
            Some(Ok(time)) => state.cursor.advance_to(to_epoch_millis(time)),
            Some(Err(e)) => {
                warn!(file = %file.name, error = %e, "Last record time unparseable, nudging cursor");
                state.cursor.nudge();
            }
            None => state.cursor.nudge(),
        }

        if state.records > 0 {
            info!(
                file = %file.name,
                marker = %chunk.next_marker,
                records = state.records,
                more_pending = state.more_pending,
                "Forwarded log records"
            );
        }

        state.phase = CyclePhase::Done;
        Ok(())
    }
}
