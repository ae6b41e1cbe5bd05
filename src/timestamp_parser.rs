use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Persisted turn timestamp format (UTC, second precision).
pub const TURN_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Ledger date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Handles parsing timestamps from the formats found in Claude Code transcripts
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp string into a DateTime<Utc>
    /// Handles both Z suffix and explicit offsets; naive timestamps are taken as UTC
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>> {
        let timestamp = if timestamp_str.ends_with('Z') {
            timestamp_str.replace('Z', "+00:00")
        } else {
            timestamp_str.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    /// `YYYY-MM-DDTHH:MM:SSZ` in UTC, or `None` when unparseable
    pub fn normalize(timestamp_str: &str) -> Option<String> {
        Self::parse(timestamp_str)
            .ok()
            .map(|dt| dt.format(TURN_TIMESTAMP_FORMAT).to_string())
    }

    /// UTC calendar date of the timestamp, or `None` when unparseable
    pub fn date_of(timestamp_str: &str) -> Option<String> {
        Self::parse(timestamp_str)
            .ok()
            .map(|dt| dt.format(DATE_FORMAT).to_string())
    }

    /// Whole seconds from `start` to `end`, floored at 0.
    /// `None` when either side does not parse.
    pub fn clamped_seconds_between(start: &str, end: &str) -> Option<u64> {
        let start = Self::parse(start).ok()?;
        let end = Self::parse(end).ok()?;
        let seconds = (end - start).num_seconds();
        Some(seconds.max(0) as u64)
    }
}
