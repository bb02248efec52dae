//! Platform audio output contract
//!
//! The playback adapter drives an output queue modelled on callback-based
//! platform audio APIs: a queue bound to one PCM format, a fixed set of
//! buffers allocated from it, and a callback fired on the platform's own
//! thread whenever an enqueued buffer has finished playing.
//!
//! Implementations:
//! - [`RodioBackend`] (feature `streaming`): system audio device via rodio

#[cfg(feature = "streaming")]
mod rodio_backend;

#[cfg(feature = "streaming")]
pub use rodio_backend::RodioBackend;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Identifier of a buffer allocated from an [`AudioQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Called on the platform audio thread when a buffer has drained.
///
/// Implementations must return quickly and never block.
pub type DrainCallback = Arc<dyn Fn(BufferId) + Send + Sync>;

/// Errors raised by the platform audio output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// No usable output device, or the device refused the stream.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    /// A buffer could not be allocated.
    #[error("failed to allocate buffer {index}: {reason}")]
    BufferAllocation {
        /// Position of the buffer in allocation order.
        index: usize,
        /// Backend-specific reason.
        reason: String,
    },
    /// The buffer id was not allocated from this queue.
    #[error("unknown {0}")]
    InvalidBuffer(BufferId),
    /// Enqueued data exceeds the buffer capacity.
    #[error("buffer overflow: {requested} bytes into {capacity}-byte buffer")]
    BufferOverflow {
        /// Buffer capacity in bytes.
        capacity: usize,
        /// Bytes offered.
        requested: usize,
    },
    /// The queue has been disposed.
    #[error("audio queue disposed")]
    Disposed,
    /// The PCM format is not supported by the backend.
    #[error("unsupported PCM format: {0}")]
    UnsupportedFormat(String),
}

/// Interleaved linear PCM format description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample (8 or 16).
    pub bits_per_sample: u16,
    /// Interleaved channel count.
    pub channels: u16,
}

impl PcmFormat {
    /// 44.1 kHz, signed 16-bit, stereo.
    pub const CD: PcmFormat = PcmFormat {
        sample_rate: 44_100,
        bits_per_sample: 16,
        channels: 2,
    };

    /// Bytes per sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes per interleaved sample frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Playback duration of a byte count in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let rate = self.byte_rate();
        if rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / rate as f64)
    }

    /// Check that the format is usable.
    pub fn validate(&self) -> Result<(), OutputError> {
        if self.sample_rate == 0 {
            return Err(OutputError::UnsupportedFormat(
                "sample rate must be greater than 0".into(),
            ));
        }
        if self.channels == 0 {
            return Err(OutputError::UnsupportedFormat(
                "channel count must be greater than 0".into(),
            ));
        }
        if !matches!(self.bits_per_sample, 8 | 16) {
            return Err(OutputError::UnsupportedFormat(format!(
                "{} bits per sample (expected 8 or 16)",
                self.bits_per_sample
            )));
        }
        Ok(())
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::CD
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz / {}-bit / {} ch",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}

/// Factory for output queues.
pub trait AudioBackend: Send + Sync {
    /// Create an output queue bound to `format`.
    ///
    /// `on_drained` is invoked from the platform's audio thread each time an
    /// enqueued buffer finishes playing.
    fn create_queue(
        &self,
        format: PcmFormat,
        on_drained: DrainCallback,
    ) -> Result<Box<dyn AudioQueue>, OutputError>;
}

/// A live platform output queue.
pub trait AudioQueue: Send {
    /// Allocate a buffer of `byte_size` bytes.
    fn allocate_buffer(&mut self, byte_size: usize) -> Result<BufferId, OutputError>;

    /// Hand a filled buffer to the platform for playback.
    fn enqueue(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), OutputError>;

    /// Begin (or resume) rendering.
    fn start(&mut self) -> Result<(), OutputError>;

    /// Suspend rendering, keeping queued buffers.
    fn pause(&mut self) -> Result<(), OutputError>;

    /// Set output gain (0.0 to 1.0).
    fn set_volume(&mut self, volume: f32) -> Result<(), OutputError>;

    /// Release the queue and every buffer allocated from it. Idempotent.
    fn dispose(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_format_sizes() {
        let format = PcmFormat::CD;
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.byte_rate(), 176_400);
        assert!(format.validate().is_ok());
    }

    #[test]
    fn duration_of_default_buffer() {
        let millis = PcmFormat::CD.duration_of(50_000).as_secs_f64() * 1000.0;
        assert!(millis > 283.0 && millis < 284.0, "got {millis}");
    }

    #[test]
    fn rejects_odd_formats() {
        let bad_rate = PcmFormat {
            sample_rate: 0,
            ..PcmFormat::CD
        };
        assert!(bad_rate.validate().is_err());

        let bad_bits = PcmFormat {
            bits_per_sample: 24,
            ..PcmFormat::CD
        };
        let err = bad_bits.validate().unwrap_err();
        assert!(err.to_string().contains("24 bits"));
    }
}
