//! Decoder bridge contract.
//!
//! Module parsing, pattern sequencing and channel mixing live in a decoder:
//! an external library binding, a bundled replayer or a test double. The
//! playback adapter talks to it only through [`ModuleDecoder`].

use crate::{ChannelRequest, ChannelState, Frame, ModuleInfo};
use std::path::Path;
use thiserror::Error;

/// Errors reported by a decoder bridge.
#[derive(Debug, Error)]
pub enum DecoderError {
    /// The module file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a module this decoder understands.
    #[error("unsupported module format: {0}")]
    UnsupportedFormat(String),
    /// No module has been loaded.
    #[error("no module loaded")]
    NotLoaded,
    /// Frame production has not been started.
    #[error("decoder is not playing")]
    NotPlaying,
    /// No more frames can be produced.
    #[error("no more frames")]
    EndOfData,
    /// Channel index out of range.
    #[error("invalid channel {channel} (available: {available})")]
    InvalidChannel {
        /// Requested channel index.
        channel: usize,
        /// Number of channels in the module.
        available: usize,
    },
    /// The decoder declined the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Generic decoder failure.
    #[error("{0}")]
    Other(String),
}

/// Convenient result alias for decoder operations.
pub type DecoderResult<T> = std::result::Result<T, DecoderError>;

/// The decoder bridge.
///
/// A decoder is owned by exactly one playback adapter. Calls arrive from the
/// control thread and from the adapter's refill worker, serialized by the
/// adapter.
pub trait ModuleDecoder: Send {
    /// Open a module file and return its metadata.
    fn load(&mut self, path: &Path) -> DecoderResult<ModuleInfo>;

    /// Arm frame production at the given output sample rate.
    fn start(&mut self, sample_rate: u32) -> DecoderResult<()>;

    /// Produce the next frame.
    ///
    /// Returns [`DecoderError::EndOfData`] once the module cannot produce any
    /// more audio.
    fn play_frame(&mut self) -> DecoderResult<Frame<'_>>;

    /// Halt frame production. Calling it while stopped is a no-op.
    fn stop(&mut self);

    /// Seek to a time offset in milliseconds, returning the position reached.
    fn seek(&mut self, time_ms: u32) -> DecoderResult<usize>;

    /// Advance one sequence position, returning the new position index.
    fn next_position(&mut self) -> usize;

    /// Go back one sequence position, returning the new position index.
    fn previous_position(&mut self) -> usize;

    /// Set or query a channel's mute state, returning the confirmed state.
    fn update_channel(
        &mut self,
        channel: usize,
        request: ChannelRequest,
    ) -> DecoderResult<ChannelState>;

    /// Metadata of the loaded module, if any.
    fn module_info(&self) -> Option<&ModuleInfo>;
}

impl<D: ModuleDecoder + ?Sized> ModuleDecoder for Box<D> {
    fn load(&mut self, path: &Path) -> DecoderResult<ModuleInfo> {
        (**self).load(path)
    }

    fn start(&mut self, sample_rate: u32) -> DecoderResult<()> {
        (**self).start(sample_rate)
    }

    fn play_frame(&mut self) -> DecoderResult<Frame<'_>> {
        (**self).play_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn seek(&mut self, time_ms: u32) -> DecoderResult<usize> {
        (**self).seek(time_ms)
    }

    fn next_position(&mut self) -> usize {
        (**self).next_position()
    }

    fn previous_position(&mut self) -> usize {
        (**self).previous_position()
    }

    fn update_channel(
        &mut self,
        channel: usize,
        request: ChannelRequest,
    ) -> DecoderResult<ChannelState> {
        (**self).update_channel(channel, request)
    }

    fn module_info(&self) -> Option<&ModuleInfo> {
        (**self).module_info()
    }
}
