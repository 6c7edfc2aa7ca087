//! Recording engine for capturing typed message streams

mod engine;
mod session;
mod summary;

use std::path::PathBuf;
use std::time::Duration;

pub use engine::{
    default_root_dir, Ingest, Recorder, REASON_MAX_DURATION, REASON_MAX_SIZE, REASON_SHUTDOWN,
};
pub use summary::{format_clock, RecordingSummary};

use crate::storage::DEFAULT_INDEX_INTERVAL;

/// Default recording time limit
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(60 * 60);

/// Default record log size limit
pub const DEFAULT_MAX_LOG_BYTES: u64 = 1000 * 1024 * 1024;

/// Recorder settings
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderOptions {
    /// Folder new captures are created in
    pub root_dir: PathBuf,
    /// Sessions stop once they run longer than this
    pub max_duration: Duration,
    /// Sessions stop once the record log grows past this many bytes
    pub max_log_bytes: u64,
    /// Spacing of time index entries
    pub index_interval: Duration,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            max_duration: DEFAULT_MAX_DURATION,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            index_interval: DEFAULT_INDEX_INTERVAL,
        }
    }
}
