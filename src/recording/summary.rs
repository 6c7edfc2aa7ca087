//! Human-readable summary written to a capture directory on stop

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::CaptureFile;
use crate::{Result, TapeError};

/// What a finished recording session produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    /// Why the recording stopped
    pub reason: String,
    /// Unique capture identifier (hex SHA-256)
    pub capture_id: String,
    /// Capture directory
    pub capture_dir: PathBuf,
    /// Local wall-clock start time
    pub started_at: String,
    /// Local wall-clock stop time
    pub stopped_at: String,
    /// Session length as `HH:MM:SS.fff`
    pub duration: String,
    /// Session length in seconds
    pub duration_seconds: f64,
    /// Field kinds, empty if no message was recorded
    pub schema: Vec<String>,
    /// Distinct strings in ordinal order
    pub strings: Vec<String>,
    /// Records in the log
    pub record_count: u64,
    /// Size of the record log in bytes
    pub log_bytes: u64,
    /// Time index entries including the leading zero
    pub index_entries: usize,
    /// Spacing of time index entries in seconds
    pub index_interval_seconds: f64,
    /// CRC-32 of the record log, eight hex digits
    pub log_crc32: String,
}

impl RecordingSummary {
    /// Serialize as TOML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TapeError::InvalidFormat(format!("Failed to write summary: {e}")))
    }

    /// Load the summary stored in a capture directory
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or cannot be parsed
    pub fn from_capture(dir: &Path) -> Result<Self> {
        let path = dir.join(CaptureFile::Summary.file_name());
        if !path.is_file() {
            return Err(TapeError::FileMissing(CaptureFile::Summary));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| TapeError::InvalidFormat(format!("Failed to parse summary: {e}")))
    }
}

/// Format seconds as `HH:MM:SS.fff`
#[must_use]
pub fn format_clock(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let (secs, millis) = (millis / 1000, millis % 1000);
    format!(
        "{:02}:{:02}:{:02}.{millis:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn summary() -> RecordingSummary {
        RecordingSummary {
            reason: "stopped".to_string(),
            capture_id: "ab".repeat(32),
            capture_dir: PathBuf::from("/tmp/capture"),
            started_at: "2026/01/02 03:04:05.060".to_string(),
            stopped_at: "2026/01/02 03:04:15.060".to_string(),
            duration: "00:00:10.000".to_string(),
            duration_seconds: 10.0,
            schema: vec!["Int".to_string(), "String".to_string()],
            strings: vec!["a".to_string()],
            record_count: 3,
            log_bytes: 48,
            index_entries: 11,
            index_interval_seconds: 1.0,
            log_crc32: "deadbeef".to_string(),
        }
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00:00.000");
        assert_eq!(format_clock(0.01), "00:00:00.010");
        assert_eq!(format_clock(3723.5), "01:02:03.500");
        assert_eq!(format_clock(-1.0), "00:00:00.000");
    }

    #[test]
    fn test_summary_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let expected = summary();
        std::fs::write(
            temp_dir.path().join("summary.toml"),
            expected.to_toml().unwrap(),
        )
        .unwrap();

        let loaded = RecordingSummary::from_capture(temp_dir.path()).unwrap();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_missing_summary() {
        let temp_dir = TempDir::new().unwrap();
        let result = RecordingSummary::from_capture(temp_dir.path());
        assert!(matches!(
            result,
            Err(TapeError::FileMissing(CaptureFile::Summary))
        ));
    }
}
