use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker meaning "read from the beginning of the file".
pub const START_MARKER: &str = "0";

const TIMESTAMP_LINE: &str = r"^(\d+)$";
const MARKER_LINE: &str = r"^(.+)\t(.+)$";

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor file io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("regex compilation failed: {0}")]
    InvalidRegex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, CursorError>;

/// Resumption state: a high-water timestamp plus the last marker per log file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub last_written_ms: i64,
    pub markers: BTreeMap<String, String>,
}

impl Cursor {
    /// Marker to resume `file_name` from; `"0"` when the file was never read.
    pub fn marker_for(&self, file_name: &str) -> &str {
        self.markers
            .get(file_name)
            .map(String::as_str)
            .unwrap_or(START_MARKER)
    }

    /// Store `marker` for `file_name`. Values the line format cannot hold
    /// (empty, or containing a tab or line break) are refused and the previous
    /// marker is kept. Returns whether the marker was stored.
    pub fn record_marker(&mut self, file_name: &str, marker: &str) -> bool {
        if !is_storable(file_name) || !is_storable(marker) {
            tracing::warn!(
                file = %file_name,
                marker = %marker,
                kept = %self.marker_for(file_name),
                "Refusing marker that cannot be persisted"
            );
            return false;
        }

        self.markers
            .insert(file_name.to_string(), marker.to_string());
        true
    }

    /// Move the high-water mark to `millis`, never backwards.
    pub fn advance_to(&mut self, millis: i64) {
        self.last_written_ms = self.last_written_ms.max(millis);
    }

    /// Step the high-water mark forward by one millisecond.
    pub fn nudge(&mut self) {
        self.last_written_ms = self.last_written_ms.saturating_add(1);
    }

    /// Serialize to the line format: the timestamp, then one `name\tmarker` per file.
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.last_written_ms);
        for (name, marker) in &self.markers {
            if !is_storable(name) || !is_storable(marker) {
                tracing::warn!(file = %name, "Skipping cursor entry that cannot be persisted");
                continue;
            }
            out.push_str(name);
            out.push('\t');
            out.push_str(marker);
            out.push('\n');
        }
        out
    }
}

fn is_storable(value: &str) -> bool {
    !value.is_empty() && !value.contains(['\t', '\n', '\r'])
}

/// Line-oriented cursor file on local disk.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    timestamp_line: Regex,
    marker_line: Regex,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            timestamp_line: Regex::new(TIMESTAMP_LINE)?,
            marker_line: Regex::new(MARKER_LINE)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the cursor file empty if it does not exist yet.
    pub async fn touch(&self) -> Result<()> {
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| self.io_error(e))
    }

    pub async fn load(&self) -> Result<Cursor> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No cursor file, starting from zero");
                return Ok(Cursor::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let cursor = self.parse(&text);
        tracing::debug!(
            path = %self.path.display(),
            last_written_ms = cursor.last_written_ms,
            files = cursor.markers.len(),
            "Loaded cursor"
        );
        Ok(cursor)
    }

    /// Rewrite the cursor file. The content goes to a sibling temporary file
    /// first and is renamed over the target.
    pub async fn save(&self, cursor: &Cursor) -> Result<()> {
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, cursor.render())
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            last_written_ms = cursor.last_written_ms,
            files = cursor.markers.len(),
            "Cursor saved"
        );
        Ok(())
    }

    /// Parse cursor file content. Unrecognised lines are skipped.
    pub fn parse(&self, text: &str) -> Cursor {
        let mut cursor = Cursor::default();

        for line in text.lines() {
            if let Some(captures) = self.timestamp_line.captures(line) {
                match captures[1].parse::<i64>() {
                    Ok(value) => cursor.last_written_ms = value,
                    Err(e) => {
                        tracing::warn!(line = %line, error = %e, "Ignoring out-of-range cursor timestamp")
                    }
                }
                continue;
            }

            if let Some(captures) = self.marker_line.captures(line) {
                cursor.record_marker(&captures[1], &captures[2]);
                continue;
            }

            if !line.is_empty() {
                tracing::debug!(line = %line, "Skipping unrecognised cursor line");
            }
        }

        cursor
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> CursorError {
        CursorError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CursorStore {
        CursorStore::new(dir.path().join("pos.dat")).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_zero_cursor() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let cursor = store.load().await.unwrap();
        assert_eq!(cursor, Cursor::default());
    }

    #[tokio::test]
    async fn test_touch_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.touch().await.unwrap();
        assert!(store.path().exists());

        let cursor = store.load().await.unwrap();
        assert_eq!(cursor.last_written_ms, 0);
        assert!(cursor.markers.is_empty());
    }

    #[tokio::test]
    async fn test_touch_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "42\ndb.log\t10\n").unwrap();

        store.touch().await.unwrap();

        let cursor = store.load().await.unwrap();
        assert_eq!(cursor.last_written_ms, 42);
        assert_eq!(cursor.marker_for("db.log"), "10");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut cursor = Cursor::default();
        cursor.advance_to(1548540620000);
        cursor.record_marker("db.log", "10");
        cursor.record_marker("error/postgresql.log.2019-01-26-22", "4:1024");

        store.save(&cursor).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            text,
            "1548540620000\ndb.log\t10\nerror/postgresql.log.2019-01-26-22\t4:1024\n"
        );
        assert_eq!(store.load().await.unwrap(), cursor);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "1\nold.log\t5\nold2.log\t6\n").unwrap();

        let mut cursor = Cursor::default();
        cursor.advance_to(2);
        store.save(&cursor).await.unwrap();

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "2\n");
    }

    #[tokio::test]
    async fn test_save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("missing").join("pos.dat")).unwrap();

        let result = store.save(&Cursor::default()).await;
        assert!(matches!(result, Err(CursorError::Io { .. })));
    }

    #[test]
    fn test_parse_skips_unrecognised_lines() {
        let store = CursorStore::new("unused").unwrap();
        let cursor = store.parse("garbage line\n123\n\ndb.log\t10\nno-tab-here\n");

        assert_eq!(cursor.last_written_ms, 123);
        assert_eq!(cursor.markers.len(), 1);
        assert_eq!(cursor.marker_for("db.log"), "10");
    }

    #[test]
    fn test_parse_last_timestamp_line_wins() {
        let store = CursorStore::new("unused").unwrap();
        let cursor = store.parse("5\n9\n");

        assert_eq!(cursor.last_written_ms, 9);
    }

    #[test]
    fn test_render_is_idempotent() {
        let store = CursorStore::new("unused").unwrap();
        let original = "junk\n77\nb.log\t2\na.log\t1\n";

        let once = store.parse(original).render();
        let twice = store.parse(&once).render();

        assert_eq!(once, twice);
        assert_eq!(store.parse(&once), store.parse(original));
    }

    #[test]
    fn test_unstorable_marker_keeps_previous() {
        let mut cursor = Cursor::default();
        assert!(cursor.record_marker("db.log", "10"));

        assert!(!cursor.record_marker("db.log", ""));
        assert!(!cursor.record_marker("db.log", "4\t5"));
        assert!(!cursor.record_marker("db.log", "4\n5"));
        assert!(!cursor.record_marker("", "10"));

        assert_eq!(cursor.marker_for("db.log"), "10");
        assert_eq!(cursor.markers.len(), 1);
    }

    #[test]
    fn test_render_skips_unstorable_entries() {
        let store = CursorStore::new("unused").unwrap();
        let mut cursor = Cursor::default();
        cursor.advance_to(7);
        cursor.record_marker("db.log", "10");
        cursor.markers.insert("empty.log".to_string(), String::new());
        cursor.markers.insert("tab.log".to_string(), "a\tb".to_string());

        let rendered = cursor.render();

        assert_eq!(rendered, "7\ndb.log\t10\n");
        assert_eq!(store.parse(&rendered).render(), rendered);
    }

    #[test]
    fn test_marker_defaults_to_start() {
        let cursor = Cursor::default();
        assert_eq!(cursor.marker_for("never-seen.log"), START_MARKER);
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let mut cursor = Cursor::default();
        cursor.advance_to(100);
        cursor.advance_to(50);
        assert_eq!(cursor.last_written_ms, 100);

        cursor.nudge();
        assert_eq!(cursor.last_written_ms, 101);
    }
}
