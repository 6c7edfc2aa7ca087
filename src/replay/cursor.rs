//! Playback cursor state

/// Slowest accepted playback speed
pub const MIN_SPEED: f64 = 0.01;

/// Fastest accepted playback speed
pub const MAX_SPEED: f64 = 30.0;

/// Position and transport flags of a loaded capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    /// Logical playback time in seconds
    pub time: f64,
    /// Whether advancing is suspended
    pub paused: bool,
    /// Whether reaching the end restarts playback
    pub looping: bool,
    /// Playback speed multiplier
    pub speed: f64,
    /// Byte offset of the next record to examine
    pub offset: u64,
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self {
            time: 0.0,
            paused: true,
            looping: true,
            speed: 1.0,
            offset: 0,
        }
    }
}

impl PlaybackCursor {
    /// Back to the start of the log, paused; speed and loop survive
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.offset = 0;
        self.paused = true;
    }

    /// Handle reaching the end of the log: rewind, and pause unless looping
    pub fn wrap(&mut self) {
        self.time = 0.0;
        self.offset = 0;
        if !self.looping {
            self.paused = true;
        }
    }
}
