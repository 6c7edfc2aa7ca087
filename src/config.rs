//! Configuration types for msgtape

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::recording::{default_root_dir, RecorderOptions};
use crate::replay::{MAX_SPEED, MIN_SPEED};
use crate::transport::TransmitTarget;
use crate::{Result, TapeError};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Recorder settings
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Inbound endpoint used while recording
    #[serde(default)]
    pub receive: ReceiveConfig,
    /// Outbound target used while playing back
    #[serde(default)]
    pub transmit: TransmitTarget,
    /// Playback preferences
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Recorder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Folder new captures are created in
    pub root_dir: PathBuf,
    /// Recording time limit in minutes
    pub max_minutes: f64,
    /// Record log size limit in megabytes
    pub max_megabytes: f64,
    /// Spacing of time index entries in seconds
    pub index_interval_secs: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            max_minutes: 60.0,
            max_megabytes: 1000.0,
            index_interval_secs: 1.0,
        }
    }
}

/// Inbound endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveConfig {
    /// Port to listen on
    pub port: u16,
    /// Address filter, empty accepts every address
    pub address: String,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            port: 10000,
            address: String::new(),
        }
    }
}

/// Playback preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Last opened capture folder
    pub folder: Option<PathBuf>,
    /// Playback speed multiplier
    pub speed: f64,
    /// Whether playback restarts at the end
    #[serde(rename = "loop")]
    pub looping: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            folder: None,
            speed: 1.0,
            looping: true,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapeError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TapeError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        let recording = &self.recording;
        for (name, value) in [
            ("max_minutes", recording.max_minutes),
            ("max_megabytes", recording.max_megabytes),
            ("index_interval_secs", recording.index_interval_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TapeError::ConfigError(format!(
                    "recording.{name} must be a positive number, got {value}"
                )));
            }
        }
        if Duration::try_from_secs_f64(recording.max_minutes * 60.0).is_err() {
            return Err(TapeError::ConfigError(format!(
                "recording.max_minutes is too large: {}",
                recording.max_minutes
            )));
        }

        if self.transmit.host.is_empty() {
            return Err(TapeError::ConfigError(
                "transmit.host cannot be empty".to_string(),
            ));
        }
        if self.transmit.port == 0 {
            return Err(TapeError::ConfigError(
                "transmit.port cannot be 0".to_string(),
            ));
        }
        if self.receive.port == 0 {
            return Err(TapeError::ConfigError(
                "receive.port cannot be 0".to_string(),
            ));
        }

        // Out-of-range speeds are clamped later; only reject nonsense
        let speed = self.playback.speed;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(TapeError::ConfigError(format!(
                "playback.speed must be within {MIN_SPEED}..={MAX_SPEED}, got {speed}"
            )));
        }

        Ok(())
    }

    /// Spacing of time index entries
    #[must_use]
    pub fn index_interval(&self) -> Duration {
        Duration::from_secs_f64(self.recording.index_interval_secs)
    }

    /// Recorder settings derived from the `[recording]` section
    #[must_use]
    pub fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            root_dir: self.recording.root_dir.clone(),
            max_duration: Duration::try_from_secs_f64(self.recording.max_minutes * 60.0)
                .unwrap_or(Duration::MAX),
            max_log_bytes: (self.recording.max_megabytes * 1024.0 * 1024.0) as u64,
            index_interval: self.index_interval(),
        }
    }
}
