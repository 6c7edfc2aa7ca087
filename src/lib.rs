//! msgtape - Typed message capture and playback
//!
//! Records a stream of typed messages into a compact fixed-width binary log
//! with a coarse time index, and replays it with seeking, looping and speed
//! control.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod deck;
pub mod error;
pub mod message;
pub mod recording;
pub mod replay;
pub mod storage;
pub mod transport;

pub use error::{Result, TapeError};
