//! Tracker module playback adapter
//!
//! Bridges a module decoder (an external library producing PCM frames on
//! demand) to a callback-driven platform audio queue. The adapter owns a ring
//! of three fixed-size buffers, primes them before rendering starts and
//! refills each one as the platform reports it drained.
//!
//! # Features
//! - Decoder bridge abstraction ([`ModuleDecoder`]) injected at construction
//! - Native ProTracker MOD replayer ([`ProTrackerDecoder`])
//! - Platform output abstraction ([`AudioBackend`] / [`AudioQueue`])
//! - Dedicated refill worker fed by drain events from the audio thread
//! - Generation guard against refills racing a stop or dispose
//! - Observer fan-out of frame metadata and end-of-module notifications
//!
//! # Crate feature flags
//! - `streaming` (default): real audio output via rodio ([`RodioBackend`])
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use modplay::{PlaybackAdapter, PlayerConfig, RodioBackend, WavRenderDecoder};
//! use std::sync::Arc;
//!
//! let adapter = PlaybackAdapter::new(
//!     WavRenderDecoder::new(),
//!     Arc::new(RodioBackend::new()),
//!     &PlayerConfig::default(),
//! )
//! .unwrap();
//! let events = adapter.subscribe();
//! adapter.play_file("song.wav").unwrap();
//! for event in events.iter() {
//!     println!("{event:?}");
//! }
//! # }
//! ```

#![warn(missing_docs)]

pub mod channels;
pub mod config;
pub mod decoder;
pub mod output;
pub mod playback;

use thiserror::Error;

/// Errors raised by the playback adapter.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Platform audio resource or buffer failure
    #[error("audio output error: {0}")]
    Output(#[from] OutputError),

    /// Decoder bridge failure
    #[error("decoder error: {0}")]
    Decoder(#[from] DecoderError),

    /// Operation not valid in the current session state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Operation attempted
        operation: &'static str,
        /// State the session was in
        state: SessionState,
    },

    /// The decoder did not confirm a channel mute change
    #[error("channel {channel} state change was not confirmed")]
    ChannelRejected {
        /// Channel index
        channel: usize,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// IO error (worker thread spawn, files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlayerError>;

// Public API exports
pub use channels::ChannelStrip;
pub use config::{ConfigError, PlayerConfig};
pub use decoder::{ProTrackerDecoder, WavRenderDecoder};
pub use modplay_common::{
    BUFFER_COUNT, ChannelRequest, ChannelState, DEFAULT_BUFFER_BYTE_SIZE, DEFAULT_SAMPLE_RATE,
    DecoderError, Frame, FrameInfo, ModuleDecoder, ModuleInfo, PlaybackState,
};
pub use output::{AudioBackend, AudioQueue, BufferId, DrainCallback, OutputError, PcmFormat};
pub use playback::{PlaybackAdapter, PlaybackStats, PlayerEvent, RefillOutcome, SessionState};

#[cfg(feature = "streaming")]
pub use output::RodioBackend;
