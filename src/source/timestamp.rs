use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to parse timestamp '{value}': {source}")]
    ParseError {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("missing time zone in timestamp '{0}'")]
    MissingZone(String),

    #[error("unsupported time zone '{zone}' in timestamp '{value}'")]
    UnsupportedZone { value: String, zone: String },

    #[error("timestamp '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse the `time` capture of a log header, e.g. `2019-01-26 22:10:20 UTC`.
///
/// The date and clock part is always `YYYY-MM-DD HH:MM:SS`; the zone text
/// may be `UTC`/`GMT`/`Z` or a numeric offset (`+09`, `+0900`, `+09:00`).
pub fn parse_log_time(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.trim();

    // "YYYY-MM-DD HH:MM:SS" is 19 bytes; the zone follows a single space.
    let (datetime_part, zone_part) = match value.get(..19) {
        Some(head) => (head, value[19..].trim()),
        None => (value, ""),
    };

    let naive = NaiveDateTime::parse_from_str(datetime_part, DATETIME_FORMAT).map_err(|e| {
        TimestampError::ParseError {
            value: value.to_string(),
            source: e,
        }
    })?;

    if zone_part.is_empty() {
        return Err(TimestampError::MissingZone(value.to_string()));
    }

    let offset = parse_zone(zone_part).ok_or_else(|| TimestampError::UnsupportedZone {
        value: value.to_string(),
        zone: zone_part.to_string(),
    })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TimestampError::OutOfRange(value.to_string()))
}

/// Milliseconds since the Unix epoch, the unit the cursor stores.
pub fn to_epoch_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn parse_zone(zone: &str) -> Option<FixedOffset> {
    match zone {
        "UTC" | "GMT" | "Z" => return FixedOffset::east_opt(0),
        _ => {}
    }

    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };

    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes): (i32, i32) = match digits.len() {
        2 => (digits.parse().ok()?, 0),
        4 => (digits[..2].parse().ok()?, digits[2..].parse().ok()?),
        _ => return None,
    };

    if minutes >= 60 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
