//! Error types for msgtape

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::CaptureFile;

/// Result type for msgtape operations
pub type Result<T> = std::result::Result<T, TapeError>;

/// Errors that can occur in msgtape
///
/// The `Display` text of the capture-validation variants doubles as the
/// diagnostic comment shown to the controlling layer after a failed open.
#[derive(Debug, Error)]
pub enum TapeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Capture directory does not exist
    #[error("capture folder does not exist: {}", .0.display())]
    CaptureNotFound(PathBuf),

    /// One of the capture files is missing
    #[error("{0} file does not exist")]
    FileMissing(CaptureFile),

    /// Record log holds no complete record
    #[error("record log is empty")]
    EmptyLog,

    /// Schema file has no lines
    #[error("schema file is empty")]
    SchemaEmpty,

    /// Schema file names a field type that cannot be stored
    #[error("unsupported field type: {0}")]
    UnsupportedFieldType(String),

    /// Schema has string fields but the string table is empty
    #[error("string table is empty but the schema has string fields")]
    StringTableEmpty,

    /// Time index does not cover the whole record log
    #[error("index incomplete: {entries} entries for {required} intervals")]
    IncompleteIndex {
        /// Entries present in the index file
        entries: usize,
        /// Entries required to cover the log duration
        required: usize,
    },

    /// Capture directory already exists
    #[error("capture folder already exists: {}", .0.display())]
    CaptureExists(PathBuf),

    /// Capture directory is in use by the recorder
    #[error("capture folder is being recorded: {}", .0.display())]
    CaptureBusy(PathBuf),

    /// A recording is already in progress
    #[error("already recording")]
    AlreadyRecording,

    /// Operation requires an active recording
    #[error("not recording")]
    NotRecording,

    /// Operation requires an open capture
    #[error("no capture loaded")]
    NoCapture,

    /// Playback speed must be a positive finite number
    #[error("invalid playback speed: {0}")]
    InvalidSpeed(f64),

    /// Inbound text could not be parsed into a message
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid file contents
    #[error("Invalid capture format: {0}")]
    InvalidFormat(String),
}
