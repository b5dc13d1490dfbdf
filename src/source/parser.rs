use crate::source::timestamp::{parse_log_time, TimestampError};
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `<timestamp>:<host>:<user>@<database>:[<pid>]:<level>:<message>`
const HEADER_PATTERN: &str = r"^(?P<time>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} .+?):(?P<host>.*?):(?P<user>.*?)@(?P<database>.*?):\[(?P<pid>.*?)\]:(?P<message_level>.*?):(?P<message>.*)$";

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("regex compilation failed: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// One reassembled log entry, in the shape handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub time: String,
    pub host: String,
    pub user: String,
    pub database: String,
    pub pid: String,
    pub message_level: String,
    pub message: String,
    #[serde(rename = "log_file_name")]
    pub source_file: String,
}

impl ParsedRecord {
    /// Event time derived from the header's `time` field.
    pub fn event_time(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_log_time(&self.time)
    }
}

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub records: Vec<ParsedRecord>,
    /// `time` of the last finalized record, if any.
    pub last_time: Option<String>,
}

enum ParserState {
    NoRecord,
    Accumulating(ParsedRecord),
}

#[derive(Debug, Clone)]
pub struct RecordParser {
    header: Regex,
}

impl RecordParser {
    pub fn new() -> Result<Self, ParserError> {
        Ok(Self {
            header: Regex::new(HEADER_PATTERN)?,
        })
    }

    pub fn is_header(&self, line: &str) -> bool {
        self.header.is_match(line)
    }

    /// Reassemble records from one chunk's lines.
    ///
    /// A header line always starts a new record; any other line continues the
    /// open record's message. Lines seen before the first header are dropped.
    pub fn parse<'a, I>(&self, source_file: &str, lines: I) -> ParseOutput
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut output = ParseOutput::default();
        let mut state = ParserState::NoRecord;

        for line in lines {
            state = match (self.header.captures(line), state) {
                (Some(captures), previous) => {
                    if let ParserState::Accumulating(record) = previous {
                        finalize(&mut output, record);
                    }
                    ParserState::Accumulating(record_from(&captures, source_file))
                }
                (None, ParserState::Accumulating(mut record)) => {
                    record.message.push('\n');
                    record.message.push_str(line);
                    ParserState::Accumulating(record)
                }
                (None, ParserState::NoRecord) => {
                    tracing::trace!(file = %source_file, line = %line, "Dropping line without header");
                    ParserState::NoRecord
                }
            };
        }

        if let ParserState::Accumulating(record) = state {
            finalize(&mut output, record);
        }

        output
    }
}

fn finalize(output: &mut ParseOutput, record: ParsedRecord) {
    output.last_time = Some(record.time.clone());
    output.records.push(record);
}

fn record_from(captures: &Captures<'_>, source_file: &str) -> ParsedRecord {
    let field = |name: &str| {
        captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    ParsedRecord {
        time: field("time"),
        host: field("host"),
        user: field("user"),
        database: field("database"),
        pid: field("pid"),
        message_level: field("message_level"),
        message: field("message"),
        source_file: source_file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> RecordParser {
        RecordParser::new().unwrap()
    }

    #[test]
    fn test_single_header_line() {
        let output = parser().parse(
            "db.log",
            ["2019-01-26 22:10:20 UTC::@:[129155]:LOG:some db log"],
        );

        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        assert_eq!(record.time, "2019-01-26 22:10:20 UTC");
        assert_eq!(record.host, "");
        assert_eq!(record.user, "");
        assert_eq!(record.database, "");
        assert_eq!(record.pid, "129155");
        assert_eq!(record.message_level, "LOG");
        assert_eq!(record.message, "some db log");
        assert_eq!(record.source_file, "db.log");
        assert_eq!(output.last_time.as_deref(), Some("2019-01-26 22:10:20 UTC"));
    }

    #[test]
    fn test_all_fields_populated() {
        let output = parser().parse(
            "error/postgresql.log.2019-01-26-22",
            ["2019-01-26 22:10:20 UTC:10.0.0.12(53122):app_user@orders:[4411]:ERROR:  relation \"foo\" does not exist"],
        );

        let record = &output.records[0];
        assert_eq!(record.host, "10.0.0.12(53122)");
        assert_eq!(record.user, "app_user");
        assert_eq!(record.database, "orders");
        assert_eq!(record.pid, "4411");
        assert_eq!(record.message_level, "ERROR");
        assert_eq!(record.message, "  relation \"foo\" does not exist");
    }

    #[test]
    fn test_message_keeps_later_colons() {
        let output = parser().parse(
            "db.log",
            ["2019-01-26 22:10:20 UTC::@:[1]:LOG:duration: 0.512 ms  statement: SELECT 1"],
        );

        assert_eq!(output.records[0].message_level, "LOG");
        assert_eq!(
            output.records[0].message,
            "duration: 0.512 ms  statement: SELECT 1"
        );
    }

    #[test]
    fn test_continuation_lines_join_message() {
        let lines = [
            "2019-01-26 22:10:20 UTC::@:[1]:LOG:statement: SELECT *",
            "\tFROM orders",
            "\tWHERE id = 1;",
            "2019-01-26 22:10:21 UTC::@:[2]:LOG:checkpoint complete",
        ];

        let output = parser().parse("db.log", lines);

        assert_eq!(output.records.len(), 2);
        assert_eq!(
            output.records[0].message,
            "statement: SELECT *\n\tFROM orders\n\tWHERE id = 1;"
        );
        assert_eq!(output.records[1].message, "checkpoint complete");
        assert_eq!(output.last_time.as_deref(), Some("2019-01-26 22:10:21 UTC"));
    }

    #[test]
    fn test_blank_continuation_line_is_kept() {
        let lines = [
            "2019-01-26 22:10:20 UTC::@:[1]:LOG:first",
            "",
            "after blank",
        ];

        let output = parser().parse("db.log", lines);

        assert_eq!(output.records[0].message, "first\n\nafter blank");
    }

    #[test]
    fn test_leading_lines_without_header_are_dropped() {
        let lines = [
            "tail of a record from the previous chunk",
            "\tmore tail",
            "2019-01-26 22:10:20 UTC::@:[1]:LOG:fresh record",
        ];

        let output = parser().parse("db.log", lines);

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].message, "fresh record");
    }

    #[test]
    fn test_no_header_yields_nothing() {
        let output = parser().parse("db.log", ["garbage", "more garbage"]);

        assert!(output.records.is_empty());
        assert!(output.last_time.is_none());
    }

    #[test]
    fn test_empty_input() {
        let output = parser().parse("db.log", std::iter::empty::<&str>());

        assert!(output.records.is_empty());
        assert!(output.last_time.is_none());
    }

    #[test]
    fn test_is_header() {
        let parser = parser();
        assert!(parser.is_header("2019-01-26 22:10:20 UTC::@:[1]:LOG:x"));
        assert!(!parser.is_header("2019-01-26 22:10:20 UTC missing fields"));
        assert!(!parser.is_header("\tFROM orders"));
    }

    #[test]
    fn test_record_serializes_with_log_file_name() {
        let output = parser().parse("db.log", ["2019-01-26 22:10:20 UTC::@:[7]:LOG:hi"]);
        let json = serde_json::to_value(&output.records[0]).unwrap();

        assert_eq!(json["log_file_name"], "db.log");
        assert_eq!(json["message_level"], "LOG");
        assert_eq!(json["pid"], "7");
        assert!(json.get("source_file").is_none());
    }

    #[test]
    fn test_event_time() {
        let output = parser().parse("db.log", ["2019-01-26 22:10:20 UTC::@:[7]:LOG:hi"]);
        let time = output.records[0].event_time().unwrap();

        assert_eq!(time.timestamp_millis(), 1548540620000);
    }
}
