//! Replay engine for re-emitting captured message streams

mod cursor;
mod engine;

pub use cursor::{PlaybackCursor, MAX_SPEED, MIN_SPEED};
pub use engine::{Player, COMMENT_LOADED, COMMENT_WAITING};
