//! Bundled decoder bridges.
//!
//! Decoders plug in through [`modplay_common::ModuleDecoder`]. The crate
//! ships [`ProTrackerDecoder`], a native MOD replayer, and
//! [`WavRenderDecoder`], which replays a PCM render of a module with
//! tracker-style transport metadata.

mod protracker;
mod wav;

pub use protracker::{DEFAULT_BPM, DEFAULT_SPEED, ProTrackerDecoder};
pub use wav::{RENDER_BPM, RENDER_CHANNELS, RENDER_SPEED, ROWS_PER_PATTERN, WavRenderDecoder};
