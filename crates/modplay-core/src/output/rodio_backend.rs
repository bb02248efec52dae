//! Audio output using rodio
//!
//! Each enqueued buffer becomes a one-shot rodio source appended to a `Sink`.
//! When the source runs dry the queue's drain callback fires with the
//! buffer's id, which is how the adapter learns that a buffer can be refilled.

use super::{AudioBackend, AudioQueue, BufferId, DrainCallback, OutputError, PcmFormat};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::time::Duration;
use tracing::{debug, trace};

/// Backend opening the system's default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioBackend;

impl RodioBackend {
    /// Create a backend for the default output device.
    pub fn new() -> Self {
        RodioBackend
    }
}

impl AudioBackend for RodioBackend {
    fn create_queue(
        &self,
        format: PcmFormat,
        on_drained: DrainCallback,
    ) -> Result<Box<dyn AudioQueue>, OutputError> {
        format.validate()?;

        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| OutputError::DeviceUnavailable(format!("output stream: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| OutputError::DeviceUnavailable(format!("sink: {e}")))?;

        // Queues start suspended; rendering begins on `start`.
        sink.pause();

        debug!(%format, "rodio output queue created");

        Ok(Box::new(RodioQueue {
            _stream: Some(stream),
            _handle: Some(handle),
            sink: Some(sink),
            format,
            capacities: Vec::new(),
            on_drained,
        }))
    }
}

/// Output queue backed by a rodio `Sink`.
struct RodioQueue {
    /// The stream must outlive the sink created from its handle.
    _stream: Option<OutputStream>,
    _handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    format: PcmFormat,
    /// Capacity of each allocated buffer, indexed by `BufferId`.
    capacities: Vec<usize>,
    on_drained: DrainCallback,
}

// SAFETY: rodio::OutputStream is !Send on some platforms because of the cpal
// stream it wraps. The queue never touches `_stream` after construction; it
// only keeps it alive. All access goes through `&mut self`, which the adapter
// serializes behind its session lock, so the queue is only ever used from one
// thread at a time.
unsafe impl Send for RodioQueue {}

impl RodioQueue {
    fn sink(&self) -> Result<&Sink, OutputError> {
        self.sink.as_ref().ok_or(OutputError::Disposed)
    }

    fn decode(&self, data: &[u8]) -> Vec<i16> {
        match self.format.bits_per_sample {
            8 => data.iter().map(|&b| i16::from(b as i8) << 8).collect(),
            _ => data
                .chunks_exact(2)
                .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
                .collect(),
        }
    }
}

impl AudioQueue for RodioQueue {
    fn allocate_buffer(&mut self, byte_size: usize) -> Result<BufferId, OutputError> {
        self.sink()?;
        let index = self.capacities.len();
        if byte_size == 0 || byte_size % self.format.bytes_per_frame() != 0 {
            return Err(OutputError::BufferAllocation {
                index,
                reason: format!(
                    "{byte_size} bytes is not a whole number of {}-byte frames",
                    self.format.bytes_per_frame()
                ),
            });
        }
        self.capacities.push(byte_size);
        Ok(BufferId(index))
    }

    fn enqueue(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), OutputError> {
        let capacity = *self
            .capacities
            .get(buffer.0)
            .ok_or(OutputError::InvalidBuffer(buffer))?;
        if data.len() > capacity {
            return Err(OutputError::BufferOverflow {
                capacity,
                requested: data.len(),
            });
        }

        let source = DrainNotifier {
            samples: self.decode(data).into_iter(),
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            buffer,
            on_drained: Some(self.on_drained.clone()),
        };
        self.sink()?.append(source);
        trace!(%buffer, bytes = data.len(), "enqueued");
        Ok(())
    }

    fn start(&mut self) -> Result<(), OutputError> {
        self.sink()?.play();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), OutputError> {
        self.sink()?.pause();
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), OutputError> {
        self.sink()?.set_volume(volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            debug!("rodio output queue disposed");
        }
        self.capacities.clear();
        self._handle = None;
        self._stream = None;
    }
}

impl Drop for RodioQueue {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One enqueued buffer; reports its id once the last sample has been pulled.
struct DrainNotifier {
    samples: std::vec::IntoIter<i16>,
    channels: u16,
    sample_rate: u32,
    buffer: BufferId,
    on_drained: Option<DrainCallback>,
}

impl Iterator for DrainNotifier {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        match self.samples.next() {
            Some(sample) => Some(sample),
            None => {
                if let Some(on_drained) = self.on_drained.take() {
                    on_drained(self.buffer);
                }
                None
            }
        }
    }
}

impl Source for DrainNotifier {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len())
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        Some(Duration::from_secs_f64(
            frames as f64 / f64::from(self.sample_rate),
        ))
    }
}
