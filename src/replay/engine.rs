//! Replay engine for re-emitting captured messages

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::message::Message;
use crate::recording::RecordingSummary;
use crate::storage::{slot_to_value, ticks_to_seconds, CaptureReader, DEFAULT_INDEX_INTERVAL};
use crate::transport::Transmitter;
use crate::{Result, TapeError};

use super::cursor::{PlaybackCursor, MAX_SPEED, MIN_SPEED};

/// Comment shown before any capture was opened
pub const COMMENT_WAITING: &str = "waiting for a capture folder";

/// Comment shown after a successful open
pub const COMMENT_LOADED: &str = "capture loaded";

/// Replay engine: a seekable, loopable cursor over one capture
pub struct Player {
    index_interval: Duration,
    reader: Option<CaptureReader>,
    cursor: PlaybackCursor,
    comment: String,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_INTERVAL)
    }
}

impl Player {
    /// Create a closed player
    ///
    /// `index_interval` is used for captures whose summary does not record
    /// the interval they were indexed with.
    #[must_use]
    pub fn new(index_interval: Duration) -> Self {
        Self {
            index_interval,
            reader: None,
            cursor: PlaybackCursor::default(),
            comment: COMMENT_WAITING.to_string(),
        }
    }

    /// Whether a capture is loaded
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Whether playback is suspended
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.cursor.paused
    }

    /// Whether playback restarts at the end
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.cursor.looping
    }

    /// Playback speed multiplier
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.cursor.speed
    }

    /// Cursor state
    #[must_use]
    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    /// Logical playback time in seconds
    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.cursor.time
    }

    /// Length of the loaded capture in seconds, `0` when closed
    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.reader.as_ref().map_or(0.0, CaptureReader::total_seconds)
    }

    /// Result of the last open
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Loaded capture
    #[must_use]
    pub fn capture(&self) -> Option<&CaptureReader> {
        self.reader.as_ref()
    }

    /// Load a capture directory, replacing any open one
    ///
    /// On success the cursor sits paused at time `0`. On failure the player
    /// is closed and [`Player::comment`] holds the diagnostic.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the capture
    pub fn open(&mut self, dir: &Path) -> Result<()> {
        self.close();

        let interval = recorded_interval(dir).unwrap_or(self.index_interval);
        match CaptureReader::open(dir, interval) {
            Ok(reader) => {
                info!(
                    "Loaded capture {}: {} records, {:.3}s",
                    dir.display(),
                    reader.record_count(),
                    reader.total_seconds()
                );
                self.reader = Some(reader);
                self.comment = COMMENT_LOADED.to_string();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load capture {}: {e}", dir.display());
                self.comment = e.to_string();
                Err(e)
            }
        }
    }

    /// Release the capture files; does nothing if already closed
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            debug!("Closed capture {}", reader.dir().display());
        }
        self.cursor.reset();
    }

    /// Resume advancing
    pub fn play(&mut self) {
        if self.reader.is_some() {
            self.cursor.paused = false;
        }
    }

    /// Suspend advancing
    pub fn pause(&mut self) {
        self.cursor.paused = true;
    }

    /// Set whether playback restarts at the end
    pub fn set_loop(&mut self, looping: bool) {
        self.cursor.looping = looping;
    }

    /// Set the playback speed, clamped to `[0.01, 30]`
    ///
    /// # Errors
    ///
    /// Returns error if `speed` is not a positive finite number
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(TapeError::InvalidSpeed(speed));
        }
        self.cursor.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        Ok(())
    }

    /// Jump to `seconds`, rounded down to an index interval boundary
    ///
    /// The log position comes straight from the time index entry for that
    /// boundary, so no records are scanned. Playback may therefore resume up
    /// to one interval before the requested time.
    ///
    /// # Errors
    ///
    /// Returns error if no capture is loaded
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let reader = self.reader.as_ref().ok_or(TapeError::NoCapture)?;

        let target = seconds.max(0.0).min(reader.total_seconds());
        let (time, count) = reader.index().locate(target, reader.index_interval());
        let count = u64::from(count);
        let offset = (count * reader.record_width() as u64).min(reader.log_len());

        debug!("Seek to {seconds:.3}s: boundary {time:.3}s, record {count}, offset {offset}");

        self.cursor.time = time;
        self.cursor.offset = offset;
        Ok(())
    }

    /// Move playback forward by `delta_seconds` of host time
    ///
    /// Emits every record whose elapsed time has been reached, in log order.
    /// The first record still in the future is left for the next call. At the
    /// end of the log the cursor rewinds to the start, and pauses unless
    /// looping.
    ///
    /// Returns the number of messages sent.
    ///
    /// # Errors
    ///
    /// Returns error if the transmitter fails; the failed record is retried on
    /// the next call
    pub fn advance(
        &mut self,
        delta_seconds: f64,
        transmitter: &mut impl Transmitter,
    ) -> Result<usize> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(0);
        };
        if self.cursor.paused {
            return Ok(0);
        }

        self.cursor.time += delta_seconds.max(0.0) * self.cursor.speed;

        let width = reader.record_width() as u64;
        let mut emitted = 0;
        loop {
            let Some((elapsed, slots)) = reader.decode_at(self.cursor.offset) else {
                self.cursor.wrap();
                return Ok(emitted);
            };
            if ticks_to_seconds(elapsed) > self.cursor.time {
                return Ok(emitted);
            }

            let values = slots
                .into_iter()
                .map(|slot| slot_to_value(slot, |ordinal| reader.strings().resolve(ordinal)))
                .collect();
            transmitter.send(&Message::new(String::new(), values))?;
            emitted += 1;

            self.cursor.offset += width;
            if self.cursor.offset >= reader.log_len() {
                debug!("End of capture after {emitted} messages this tick");
                self.cursor.wrap();
                return Ok(emitted);
            }
        }
    }
}

/// Index interval stored in the capture's summary, if any
fn recorded_interval(dir: &Path) -> Option<Duration> {
    let summary = RecordingSummary::from_capture(dir).ok()?;
    let seconds = summary.index_interval_seconds;
    if !seconds.is_finite() || seconds <= 0.0 {
        warn!("Ignoring index interval {seconds} in summary of {}", dir.display());
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}
