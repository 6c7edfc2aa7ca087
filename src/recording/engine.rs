//! Recording engine for capturing message streams

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::message::Message;
use crate::storage::{duration_to_ticks, Schema};
use crate::{Result, TapeError};

use super::session::{Encoded, RecordingSession};
use super::summary::RecordingSummary;
use super::RecorderOptions;

/// Folder name format for new captures
const CAPTURE_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Stop reason used when the duration limit is hit
pub const REASON_MAX_DURATION: &str = "maximum recording time reached";

/// Stop reason used when the size limit is hit
pub const REASON_MAX_SIZE: &str = "maximum data size reached";

/// Stop reason used when the recorder is dropped mid-session
pub const REASON_SHUTDOWN: &str = "shutdown";

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
    /// Not recording; the message was discarded
    Ignored,
    /// Appended to the record log
    Recorded,
    /// Did not match the locked schema; discarded, recording continues
    Dropped,
    /// First message could not define a schema; recording stopped
    Aborted(RecordingSummary),
}

/// Recording engine: schema inference, validation and encoding
///
/// Idle until [`Recorder::start`], then owns one [`RecordingSession`] until
/// [`Recorder::stop`].
pub struct Recorder {
    options: RecorderOptions,
    session: Option<RecordingSession>,
}

impl Recorder {
    /// Create an idle recorder
    #[must_use]
    pub fn new(options: RecorderOptions) -> Self {
        Self {
            options,
            session: None,
        }
    }

    /// Recorder options
    #[must_use]
    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Replace the options; takes effect at the next start
    pub fn set_options(&mut self, options: RecorderOptions) {
        self.options = options;
    }

    /// Whether a session is active
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Directory of the active session
    #[must_use]
    pub fn capture_dir(&self) -> Option<&Path> {
        self.session.as_ref().map(RecordingSession::dir)
    }

    /// Schema of the active session, once the first message fixed it
    #[must_use]
    pub fn schema(&self) -> Option<&Schema> {
        self.session.as_ref().and_then(RecordingSession::schema)
    }

    /// Strings interned by the active session
    #[must_use]
    pub fn strings(&self) -> &[String] {
        self.session
            .as_ref()
            .map_or(&[][..], RecordingSession::strings)
    }

    /// Records appended by the active session
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |session| u64::from(session.record_count()))
    }

    /// Bytes appended to the active record log
    #[must_use]
    pub fn log_bytes(&self) -> u64 {
        self.session.as_ref().map_or(0, RecordingSession::log_bytes)
    }

    /// Time since the active session started
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.session
            .as_ref()
            .map_or(Duration::ZERO, |session| session.elapsed(now))
    }

    /// Start a session in a new timestamped folder under the capture root
    ///
    /// # Errors
    ///
    /// Returns error if already recording, if the folder already exists, or
    /// if any capture file cannot be created. The recorder stays idle.
    pub fn start(&mut self, now: Instant) -> Result<&Path> {
        let name = Local::now().format(CAPTURE_DIR_FORMAT).to_string();
        let dir = self.options.root_dir.join(name);
        self.start_in(&dir, now)
    }

    /// Start a session writing into `dir`, which must not exist yet
    ///
    /// # Errors
    ///
    /// Same as [`Recorder::start`]
    pub fn start_in(&mut self, dir: &Path, now: Instant) -> Result<&Path> {
        if self.session.is_some() {
            return Err(TapeError::AlreadyRecording);
        }

        let session = RecordingSession::create(dir, now, self.options.index_interval)?;
        info!("Recording started: {}", dir.display());

        Ok(self.session.insert(session).dir())
    }

    /// Handle one inbound message
    ///
    /// The first message fixes the schema. A first message carrying a kind
    /// that cannot be stored stops the session; any later message that does
    /// not match the schema is dropped without a trace in the capture.
    ///
    /// # Errors
    ///
    /// Returns error if a capture file write fails
    pub fn on_message_received(&mut self, message: &Message, now: Instant) -> Result<Ingest> {
        let Some(session) = self.session.as_mut() else {
            return Ok(Ingest::Ignored);
        };

        match session.encode(message, now)? {
            Encoded::Appended => Ok(Ingest::Recorded),
            Encoded::Dropped => Ok(Ingest::Dropped),
            Encoded::Unsupported(reason) => {
                warn!("Aborting recording: {reason}");
                let summary = self.stop(&reason, now)?.ok_or(TapeError::NotRecording)?;
                Ok(Ingest::Aborted(summary))
            }
        }
    }

    /// Periodic host tick: time index upkeep and limit checks
    ///
    /// Returns the summary if a limit stopped the session.
    ///
    /// # Errors
    ///
    /// Returns error if an index write or the auto-stop fails
    pub fn tick(&mut self, now: Instant) -> Result<Option<RecordingSummary>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        let elapsed = session.elapsed(now);
        session.advance_index(duration_to_ticks(elapsed))?;

        if elapsed > self.options.max_duration {
            return self.stop(REASON_MAX_DURATION, now);
        }
        if session.log_bytes() > self.options.max_log_bytes {
            debug!(
                "Record log at {} bytes, limit {}",
                session.log_bytes(),
                self.options.max_log_bytes
            );
            return self.stop(REASON_MAX_SIZE, now);
        }

        Ok(None)
    }

    /// Stop the session, close every file and write the summary
    ///
    /// Returns `None` if nothing was recording. On error the session stays
    /// active.
    ///
    /// # Errors
    ///
    /// Returns error if flushing or writing the summary fails
    pub fn stop(&mut self, reason: &str, now: Instant) -> Result<Option<RecordingSummary>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        let summary = session.finish(reason, now)?;
        self.session = None;

        info!(
            "Recording stopped ({}): {} records, {} bytes, {}",
            summary.reason, summary.record_count, summary.log_bytes, summary.duration
        );

        Ok(Some(summary))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop(REASON_SHUTDOWN, Instant::now()) {
            warn!("Failed to finalize recording on shutdown: {e}");
        }
    }
}

/// Default capture root: `<documents>/MsgTape`, falling back to the working
/// directory
#[must_use]
pub fn default_root_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MsgTape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use tempfile::TempDir;

    fn recorder(root: &Path) -> Recorder {
        Recorder::new(RecorderOptions {
            root_dir: root.to_path_buf(),
            ..RecorderOptions::default()
        })
    }

    #[test]
    fn test_ignored_when_idle() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = recorder(temp_dir.path());

        let message = Message::new("/a", vec![Value::Int(1)]);
        let outcome = recorder.on_message_received(&message, Instant::now()).unwrap();
        assert_eq!(outcome, Ingest::Ignored);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_start_creates_timestamped_folder() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = recorder(temp_dir.path());

        let dir = recorder.start(Instant::now()).unwrap().to_path_buf();
        assert!(dir.starts_with(temp_dir.path()));
        assert_eq!(dir.file_name().unwrap().len(), "20260101_000000".len());
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_start_twice_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = recorder(temp_dir.path());
        let now = Instant::now();

        recorder.start_in(&temp_dir.path().join("a"), now).unwrap();
        let result = recorder.start_in(&temp_dir.path().join("b"), now);
        assert!(matches!(result, Err(TapeError::AlreadyRecording)));
        assert_eq!(recorder.capture_dir(), Some(temp_dir.path().join("a").as_path()));
    }

    #[test]
    fn test_collision_leaves_idle() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("taken");
        std::fs::create_dir(&dir).unwrap();

        let mut recorder = recorder(temp_dir.path());
        let result = recorder.start_in(&dir, Instant::now());
        assert!(matches!(result, Err(TapeError::CaptureExists(_))));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_unsupported_first_message_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = recorder(temp_dir.path());
        let now = Instant::now();
        recorder.start_in(&temp_dir.path().join("c"), now).unwrap();

        let message = Message::new("/a", vec![Value::Int(1), Value::Bool(true)]);
        match recorder.on_message_received(&message, now).unwrap() {
            Ingest::Aborted(summary) => {
                assert_eq!(summary.reason, "unsupported type: Bool");
                assert_eq!(summary.record_count, 0);
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = recorder(temp_dir.path());
        let now = Instant::now();

        assert!(recorder.stop("idle", now).unwrap().is_none());
        recorder.start_in(&temp_dir.path().join("d"), now).unwrap();
        assert!(recorder.stop("done", now).unwrap().is_some());
        assert!(recorder.stop("again", now).unwrap().is_none());
    }

    #[test]
    fn test_auto_stop_on_duration() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = Recorder::new(RecorderOptions {
            root_dir: temp_dir.path().to_path_buf(),
            max_duration: Duration::from_secs(2),
            ..RecorderOptions::default()
        });
        let start = Instant::now();
        recorder.start_in(&temp_dir.path().join("e"), start).unwrap();

        assert!(recorder.tick(start + Duration::from_secs(2)).unwrap().is_none());
        let summary = recorder
            .tick(start + Duration::from_millis(2100))
            .unwrap()
            .unwrap();
        assert_eq!(summary.reason, REASON_MAX_DURATION);
        assert_eq!(summary.index_entries, 3);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_auto_stop_on_size() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = Recorder::new(RecorderOptions {
            root_dir: temp_dir.path().to_path_buf(),
            max_log_bytes: 30,
            ..RecorderOptions::default()
        });
        let start = Instant::now();
        recorder.start_in(&temp_dir.path().join("f"), start).unwrap();

        let message = Message::new("/a", vec![Value::Float(1.0)]);
        for _ in 0..2 {
            recorder.on_message_received(&message, start).unwrap();
        }
        assert!(recorder.tick(start).unwrap().is_none());

        recorder.on_message_received(&message, start).unwrap();
        let summary = recorder.tick(start).unwrap().unwrap();
        assert_eq!(summary.reason, REASON_MAX_SIZE);
        assert_eq!(summary.log_bytes, 36);
    }
}
