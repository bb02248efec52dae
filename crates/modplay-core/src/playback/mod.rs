//! Playback adapter and its session state.
//!
//! This module manages:
//! - The playback session (buffer ring, output queue, lifecycle state)
//! - Priming and starting the output queue
//! - The refill worker fed by drain events from the audio thread
//! - Publication of frame metadata to observers

mod adapter;
mod events;
mod session;
mod stats;
mod worker;

pub use adapter::{PlaybackAdapter, RefillOutcome};
pub use events::PlayerEvent;
pub use session::{AudioBuffer, SessionState};
pub use stats::PlaybackStats;
