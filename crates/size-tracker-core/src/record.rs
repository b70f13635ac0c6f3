//! Size records and their stored representation.
//!
//! A record is stored as the content of a git note attached to its commit.
//! The encoded form is a JSON object with the keys `Commit`, `Date` (RFC 3339)
//! and `Size` (unsigned 32-bit byte count). Records written by earlier
//! versions of the tool use exactly this shape, so it must not change.
//! Lowercase keys are accepted on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Largest artifact size that fits in a record's size field.
pub const MAX_RECORD_SIZE: u64 = u32::MAX as u64;

/// The size of one artifact build, keyed by the commit it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRecord {
    /// Commit identifier the artifact was built from.
    #[serde(rename = "Commit", alias = "commit")]
    pub commit: String,

    /// Commit time of `commit`, not the time of measurement.
    #[serde(rename = "Date", alias = "date", alias = "timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Artifact size in bytes.
    #[serde(rename = "Size", alias = "size")]
    pub size: u32,
}

impl SizeRecord {
    /// Serialize to the stored note representation.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a stored note. Surrounding whitespace (git appends a trailing
    /// newline to note messages) is ignored.
    pub fn decode(raw: &[u8]) -> Result<Self, RecordError> {
        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Err(RecordError::CorruptEntry("empty note".to_string()));
        }
        serde_json::from_slice(trimmed).map_err(|e| RecordError::CorruptEntry(e.to_string()))
    }

    pub fn size_bytes(&self) -> u64 {
        u64::from(self.size)
    }
}

/// Combine a measured artifact size with commit metadata into a record.
///
/// `raw_commit_time` is the commit time as reported by the repository,
/// either Unix seconds (`git log --pretty=format:%ct`) or an RFC 3339 string.
pub fn build_record(
    commit: &str,
    measured_size: u64,
    raw_commit_time: &str,
) -> Result<SizeRecord, RecordError> {
    let timestamp = parse_commit_time(raw_commit_time)?;
    let size = u32::try_from(measured_size).map_err(|_| RecordError::SizeOverflow {
        size: measured_size,
        max: MAX_RECORD_SIZE,
    })?;

    Ok(SizeRecord {
        commit: commit.to_string(),
        timestamp,
        size,
    })
}

/// Parse a commit time given as Unix seconds or RFC 3339.
pub fn parse_commit_time(raw: &str) -> Result<DateTime<Utc>, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::InvalidTimestamp {
            raw: raw.to_string(),
            reason: "empty".to_string(),
        });
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).ok_or_else(|| RecordError::InvalidTimestamp {
            raw: raw.to_string(),
            reason: "out of range".to_string(),
        });
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RecordError::InvalidTimestamp {
            raw: raw.to_string(),
            reason: e.to_string(),
        })
}
