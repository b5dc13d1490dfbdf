pub mod parser;
pub mod timestamp;

pub use parser::{ParseOutput, ParsedRecord, ParserError, RecordParser};
pub use timestamp::{parse_log_time, to_epoch_millis, TimestampError};
