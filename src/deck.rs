//! Command surface tying a recorder and a player to a transport
//!
//! The host owns one [`Deck`], forwards transport messages to
//! [`Deck::deliver`], calls [`Deck::tick`] periodically and polls
//! [`Deck::status`] for display.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::message::Message;
use crate::recording::{Ingest, Recorder, RecordingSummary, REASON_SHUTDOWN};
use crate::replay::Player;
use crate::transport::{Receiver, Transmitter};
use crate::{Result, TapeError};

/// Point-in-time view of the deck
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// A recording session is active
    pub is_recording: bool,
    /// A capture is loaded and advancing
    pub is_playing: bool,
    /// Playback is suspended
    pub is_paused: bool,
    /// Playback restarts at the end
    pub looping: bool,
    /// Playback speed multiplier
    pub speed: f64,
    /// Recording time while recording, playback time otherwise
    pub elapsed_seconds: f64,
    /// Length of the loaded capture
    pub total_seconds: f64,
    /// Last lifecycle message
    pub comment: String,
    /// Directory being recorded, or the loaded capture
    pub capture_dir: Option<PathBuf>,
}

/// Outcome of one [`Deck::tick`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Messages sent by the player
    pub emitted: usize,
    /// Summary of a recording stopped by a limit
    pub stopped: Option<RecordingSummary>,
}

/// One recorder and one player behind a single command surface
pub struct Deck<R: Receiver, T: Transmitter> {
    config: Config,
    recorder: Recorder,
    player: Player,
    receiver: R,
    transmitter: T,
    comment: String,
}

impl<R: Receiver, T: Transmitter> Deck<R, T> {
    /// Build a deck from `config`
    ///
    /// # Errors
    ///
    /// Returns error if the configured playback speed is invalid
    pub fn new(config: Config, receiver: R, transmitter: T) -> Result<Self> {
        let recorder = Recorder::new(config.recorder_options());
        let mut player = Player::new(config.index_interval());
        player.set_speed(config.playback.speed)?;
        player.set_loop(config.playback.looping);
        let comment = player.comment().to_string();

        Ok(Self {
            config,
            recorder,
            player,
            receiver,
            transmitter,
            comment,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Recording side
    #[must_use]
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Playback side
    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Inbound transport
    #[must_use]
    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    /// Outbound transport
    #[must_use]
    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// Start recording into a new timestamped capture and bind the receiver
    ///
    /// # Errors
    ///
    /// Returns error if the capture cannot be created or the receiver cannot
    /// be bound; the deck is left idle
    pub fn start_recording(&mut self, now: Instant) -> Result<PathBuf> {
        let dir = self.recorder.start(now)?.to_path_buf();

        let receive = &self.config.receive;
        if let Err(e) = self.receiver.bind(receive.port, &receive.address) {
            warn!("Failed to bind receiver on port {}: {e}", receive.port);
            self.recorder.stop(&e.to_string(), now)?;
            return Err(e);
        }

        self.comment = format!("recording to {}", dir.display());
        Ok(dir)
    }

    /// Stop recording with `comment` as the reason and release the receiver
    ///
    /// Returns `None` if nothing was recording.
    ///
    /// # Errors
    ///
    /// Returns error if the capture cannot be finalized
    pub fn stop_recording(
        &mut self,
        comment: &str,
        now: Instant,
    ) -> Result<Option<RecordingSummary>> {
        let summary = self.recorder.stop(comment, now)?;
        if let Some(summary) = &summary {
            self.finished(summary);
        }
        Ok(summary)
    }

    /// Forward one inbound message to the recorder
    ///
    /// A failed write stops the recording.
    ///
    /// # Errors
    ///
    /// Returns the write error
    pub fn deliver(&mut self, message: &Message, now: Instant) -> Result<Ingest> {
        match self.recorder.on_message_received(message, now) {
            Ok(Ingest::Aborted(summary)) => {
                self.finished(&summary);
                Ok(Ingest::Aborted(summary))
            }
            Ok(ingest) => Ok(ingest),
            Err(e) => {
                self.fail_recording(&e, now);
                Err(e)
            }
        }
    }

    /// Periodic host tick: recorder upkeep, then `delta_seconds` of playback
    ///
    /// # Errors
    ///
    /// Returns error if the recorder or the transmitter fails
    pub fn tick(&mut self, now: Instant, delta_seconds: f64) -> Result<TickReport> {
        let stopped = match self.recorder.tick(now) {
            Ok(stopped) => stopped,
            Err(e) => {
                self.fail_recording(&e, now);
                return Err(e);
            }
        };
        if let Some(summary) = &stopped {
            self.finished(summary);
        }

        let emitted = self.player.advance(delta_seconds, &mut self.transmitter)?;
        Ok(TickReport { emitted, stopped })
    }

    /// Load a capture for playback and point the transmitter at the
    /// configured target
    ///
    /// # Errors
    ///
    /// Returns error if `dir` is being recorded, fails validation, or the
    /// transmitter cannot be configured
    pub fn open_capture(&mut self, dir: &Path) -> Result<()> {
        if self
            .recorder
            .capture_dir()
            .is_some_and(|recording| same_dir(recording, dir))
        {
            self.comment = TapeError::CaptureBusy(dir.to_path_buf()).to_string();
            return Err(TapeError::CaptureBusy(dir.to_path_buf()));
        }

        let opened = self.player.open(dir);
        self.comment = self.player.comment().to_string();
        opened?;

        if let Err(e) = self.transmitter.configure(&self.config.transmit) {
            warn!("Failed to configure transmitter: {e}");
            self.player.close();
            self.comment = e.to_string();
            return Err(e);
        }
        self.config.playback.folder = Some(dir.to_path_buf());
        Ok(())
    }

    /// Release the loaded capture
    pub fn close_capture(&mut self) {
        self.player.close();
    }

    /// Resume playback
    pub fn play(&mut self) {
        self.player.play();
    }

    /// Suspend playback
    pub fn pause(&mut self) {
        self.player.pause();
    }

    /// Jump to `seconds` in the loaded capture
    ///
    /// # Errors
    ///
    /// Returns error if no capture is loaded
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.player.seek(seconds)
    }

    /// Change playback speed
    ///
    /// # Errors
    ///
    /// Returns error if `speed` is not a positive finite number
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.player.set_speed(speed)?;
        self.config.playback.speed = self.player.speed();
        Ok(())
    }

    /// Change whether playback loops
    pub fn set_loop(&mut self, looping: bool) {
        self.player.set_loop(looping);
        self.config.playback.looping = looping;
    }

    /// Snapshot for display
    #[must_use]
    pub fn status(&self, now: Instant) -> Status {
        let is_recording = self.recorder.is_recording();
        let elapsed_seconds = if is_recording {
            self.recorder.elapsed(now).as_secs_f64()
        } else {
            self.player.current_time()
        };
        let capture_dir = self
            .recorder
            .capture_dir()
            .or_else(|| self.player.capture().map(|reader| reader.dir()))
            .map(Path::to_path_buf);

        Status {
            is_recording,
            is_playing: self.player.is_open() && !self.player.is_paused(),
            is_paused: self.player.is_paused(),
            looping: self.player.is_looping(),
            speed: self.player.speed(),
            elapsed_seconds,
            total_seconds: self.player.total_time(),
            comment: self.comment.clone(),
            capture_dir,
        }
    }

    fn finished(&mut self, summary: &RecordingSummary) {
        self.receiver.release();
        self.comment = summary.reason.clone();
    }

    fn fail_recording(&mut self, e: &TapeError, now: Instant) {
        error!("Recording failed: {e}");
        match self.recorder.stop(&e.to_string(), now) {
            Ok(Some(summary)) => self.finished(&summary),
            Ok(None) => {}
            Err(stop_err) => {
                warn!("Failed to finalize failed recording: {stop_err}");
                self.receiver.release();
                self.comment = e.to_string();
            }
        }
    }
}

impl<R: Receiver, T: Transmitter> Drop for Deck<R, T> {
    fn drop(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        match self.recorder.stop(REASON_SHUTDOWN, Instant::now()) {
            Ok(_) => info!("Recording finalized on shutdown"),
            Err(e) => warn!("Failed to finalize recording on shutdown: {e}"),
        }
        self.receiver.release();
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
