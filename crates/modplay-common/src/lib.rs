//! Common traits and types for tracker module playback.
//!
//! This crate holds the vocabulary shared between the playback adapter
//! (`modplay`) and its front ends. The module decoder itself is an external
//! collaborator; it is reached only through the [`ModuleDecoder`] trait.
//!
//! # Traits
//!
//! - [`ModuleDecoder`] - the decoder bridge contract (load, frame production,
//!   seeking, sequence navigation, per-channel mute)
//!
//! # Example
//!
//! ```ignore
//! use modplay_common::{ModuleDecoder, DEFAULT_SAMPLE_RATE};
//!
//! fn dump_frames<D: ModuleDecoder>(decoder: &mut D, path: &std::path::Path) {
//!     let info = decoder.load(path).unwrap();
//!     println!("Playing: {}", info.name);
//!     decoder.start(DEFAULT_SAMPLE_RATE).unwrap();
//!     while let Ok(frame) = decoder.play_frame() {
//!         if frame.info.loop_count != 0 {
//!             break;
//!         }
//!         // ... hand frame.pcm to an audio buffer
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod channel;
mod decoder;
mod metadata;
mod player;

pub use channel::{ChannelRequest, ChannelState};
pub use decoder::{DecoderError, DecoderResult, ModuleDecoder};
pub use metadata::{Frame, FrameInfo, ModuleInfo};
pub use player::PlaybackState;

// ============================================================================
// Common Constants
// ============================================================================

/// Standard audio sample rate (44.1 kHz CD quality).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Number of audio buffers cycled through the platform output queue.
pub const BUFFER_COUNT: usize = 3;

/// Byte size of each platform audio buffer.
pub const DEFAULT_BUFFER_BYTE_SIZE: usize = 50_000;

/// File extensions of tracker module formats handled by native decoders.
pub const MODULE_EXTENSIONS: &[&str] = &[
    "mod", "xm", "s3m", "it", "stm", "669", "mtm", "med", "okt", "far",
];

/// Check whether a file extension names a tracker module format.
pub fn is_module_extension(extension: &str) -> bool {
    MODULE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_extensions_are_case_insensitive() {
        assert!(is_module_extension("mod"));
        assert!(is_module_extension("XM"));
        assert!(!is_module_extension("wav"));
        assert!(!is_module_extension(""));
    }
}
