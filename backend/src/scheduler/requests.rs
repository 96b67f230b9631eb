//! Normalisation of raw `[device, start, end]` string triples.
//!
//! Agents send device topics and timestamps as strings. Device topics may
//! carry leading or trailing slashes; timestamps arrive either as RFC 3339 or
//! as naive `YYYY-MM-DD HH:MM:SS[.ffffff]` values, which are taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::result::ScheduleError;
use crate::models::{SlotRequest, Timestamp};

/// A request triple exactly as received: `(device, start, end)`.
pub type RawSlotRequest = (String, String, String);

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a timestamp string into UTC.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, ScheduleError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            ScheduleError::malformed("ValueError", format!("unknown timestamp format: '{}'", value))
        })
}

/// Turn raw triples into typed requests.
pub fn parse_requests(raw: &[RawSlotRequest]) -> Result<Vec<SlotRequest>, ScheduleError> {
    raw.iter()
        .map(|(device, start, end)| {
            Ok(SlotRequest {
                device: device.trim_matches('/').to_string(),
                start: parse_timestamp(start)?,
                end: parse_timestamp(end)?,
            })
        })
        .collect()
}
