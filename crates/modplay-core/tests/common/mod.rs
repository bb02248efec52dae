//! Test doubles shared by the integration tests.
//!
//! `FakeDecoder` and `FakeBackend` write into one ordered call log so tests
//! can assert on the interleaving of decoder and platform calls.

#![allow(dead_code)]

use modplay::{
    AudioBackend, AudioQueue, BufferId, ChannelRequest, ChannelState, DecoderError, DrainCallback,
    Frame, FrameInfo, ModuleDecoder, ModuleInfo, OutputError, PcmFormat, PlaybackAdapter,
    PlayerConfig, PlayerEvent,
};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes of PCM produced per fake frame.
pub const FRAME_BYTES: usize = 1_024;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load,
    DecoderStart(u32),
    PlayFrame,
    DecoderStop,
    Seek(u32),
    NextPosition,
    PreviousPosition,
    UpdateChannel(usize, ChannelRequest),
    CreateQueue,
    Allocate(usize),
    Enqueue(BufferId, usize),
    QueueStart,
    QueuePause,
    SetVolume(f32),
    Dispose,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn count(log: &CallLog, predicate: impl Fn(&Call) -> bool) -> usize {
    log.lock().iter().filter(|call| predicate(call)).count()
}

pub fn position_of(log: &CallLog, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
    log.lock().iter().rposition(predicate)
}

/// Scripted decoder.
pub struct FakeDecoder {
    pub log: CallLog,
    /// Frame index that carries a non-zero loop count.
    pub end_at: Option<usize>,
    /// Frame index from which `play_frame` fails.
    pub fail_at: Option<usize>,
    /// Answer channel changes with the unchanged state.
    pub decline_channels: bool,
    pub fail_load: bool,
    pub info: Option<ModuleInfo>,
    pub channels: Vec<ChannelState>,
    /// Order position moved by `next_position`/`previous_position`,
    /// clamped to the module length.
    pub position: usize,
    pub produced: usize,
    pub pcm: Vec<u8>,
}

impl FakeDecoder {
    pub fn new(log: CallLog) -> Self {
        FakeDecoder {
            log,
            end_at: None,
            fail_at: None,
            decline_channels: false,
            fail_load: false,
            info: None,
            channels: Vec::new(),
            position: 0,
            produced: 0,
            pcm: Vec::new(),
        }
    }

    pub fn ending_at(mut self, frame: usize) -> Self {
        self.end_at = Some(frame);
        self
    }

    pub fn failing_at(mut self, frame: usize) -> Self {
        self.fail_at = Some(frame);
        self
    }

    pub fn declining_channels(mut self) -> Self {
        self.decline_channels = true;
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }
}

impl ModuleDecoder for FakeDecoder {
    fn load(&mut self, path: &Path) -> Result<ModuleInfo, DecoderError> {
        self.log.lock().push(Call::Load);
        if self.fail_load {
            return Err(DecoderError::UnsupportedFormat("not a module".into()));
        }
        let info = ModuleInfo {
            name: path.display().to_string(),
            format: "Fake Tracker".into(),
            patterns: 4,
            tracks: 16,
            channels: 4,
            instruments: 2,
            samples: 2,
            length: 4,
            duration_ms: 10_000,
        };
        self.channels = vec![ChannelState::Unmuted; info.channels];
        self.produced = 0;
        self.info = Some(info.clone());
        Ok(info)
    }

    fn start(&mut self, sample_rate: u32) -> Result<(), DecoderError> {
        self.log.lock().push(Call::DecoderStart(sample_rate));
        Ok(())
    }

    fn play_frame(&mut self) -> Result<Frame<'_>, DecoderError> {
        self.log.lock().push(Call::PlayFrame);
        let index = self.produced;
        if self.fail_at.is_some_and(|at| index >= at) {
            return Err(DecoderError::Other("decoder exploded".into()));
        }
        self.produced += 1;
        self.pcm = vec![index as u8; FRAME_BYTES];
        let info = FrameInfo {
            position: index / 4,
            row: index % 64,
            rows: 64,
            speed: 6,
            bpm: 125,
            time_ms: index as u32 * 20,
            total_time_ms: 10_000,
            buffer_size: FRAME_BYTES,
            loop_count: u32::from(self.end_at.is_some_and(|at| index >= at)),
            virtual_channels: 4,
            virtual_used: 4,
            ..FrameInfo::default()
        };
        Ok(Frame {
            pcm: &self.pcm,
            info,
        })
    }

    fn stop(&mut self) {
        self.log.lock().push(Call::DecoderStop);
    }

    fn seek(&mut self, time_ms: u32) -> Result<usize, DecoderError> {
        self.log.lock().push(Call::Seek(time_ms));
        if time_ms >= 10_000 {
            return Err(DecoderError::Rejected("past end".into()));
        }
        Ok(time_ms as usize / 2_500)
    }

    fn next_position(&mut self) -> usize {
        self.log.lock().push(Call::NextPosition);
        let last = self.info.as_ref().map_or(0, |info| info.length.saturating_sub(1));
        self.position = (self.position + 1).min(last);
        self.position
    }

    fn previous_position(&mut self) -> usize {
        self.log.lock().push(Call::PreviousPosition);
        self.position = self.position.saturating_sub(1);
        self.position
    }

    fn update_channel(
        &mut self,
        channel: usize,
        request: ChannelRequest,
    ) -> Result<ChannelState, DecoderError> {
        self.log.lock().push(Call::UpdateChannel(channel, request));
        let available = self.channels.len();
        let slot = self
            .channels
            .get_mut(channel)
            .ok_or(DecoderError::InvalidChannel { channel, available })?;
        if let ChannelRequest::Set(state) = request {
            if !self.decline_channels {
                *slot = state;
            }
        }
        Ok(*slot)
    }

    fn module_info(&self) -> Option<&ModuleInfo> {
        self.info.as_ref()
    }
}

/// Recording output backend.
#[derive(Default)]
pub struct FakeBackend {
    pub log: CallLog,
    pub fail_create: bool,
    /// Allocation index that fails.
    pub fail_allocation_at: Option<usize>,
    pub callbacks: Mutex<Vec<DrainCallback>>,
}

impl FakeBackend {
    pub fn new(log: CallLog) -> Self {
        FakeBackend {
            log,
            ..FakeBackend::default()
        }
    }

    /// Drain callback handed to the most recent queue.
    pub fn latest_callback(&self) -> Option<DrainCallback> {
        self.callbacks.lock().last().cloned()
    }

    /// Drain callback handed to the `n`th queue created.
    pub fn callback(&self, n: usize) -> Option<DrainCallback> {
        self.callbacks.lock().get(n).cloned()
    }
}

impl AudioBackend for FakeBackend {
    fn create_queue(
        &self,
        _format: PcmFormat,
        on_drained: DrainCallback,
    ) -> Result<Box<dyn AudioQueue>, OutputError> {
        self.log.lock().push(Call::CreateQueue);
        if self.fail_create {
            return Err(OutputError::DeviceUnavailable("no device".into()));
        }
        self.callbacks.lock().push(on_drained);
        Ok(Box::new(FakeQueue {
            log: Arc::clone(&self.log),
            fail_allocation_at: self.fail_allocation_at,
            capacities: Vec::new(),
            disposed: false,
        }))
    }
}

struct FakeQueue {
    log: CallLog,
    fail_allocation_at: Option<usize>,
    capacities: Vec<usize>,
    disposed: bool,
}

impl AudioQueue for FakeQueue {
    fn allocate_buffer(&mut self, byte_size: usize) -> Result<BufferId, OutputError> {
        self.log.lock().push(Call::Allocate(byte_size));
        let index = self.capacities.len();
        if self.fail_allocation_at == Some(index) {
            return Err(OutputError::BufferAllocation {
                index,
                reason: "out of memory".into(),
            });
        }
        self.capacities.push(byte_size);
        Ok(BufferId(index))
    }

    fn enqueue(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), OutputError> {
        if self.disposed {
            return Err(OutputError::Disposed);
        }
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
        self.log.lock().push(Call::Enqueue(buffer, data.len()));
        Ok(())
    }

    fn start(&mut self) -> Result<(), OutputError> {
        self.log.lock().push(Call::QueueStart);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), OutputError> {
        self.log.lock().push(Call::QueuePause);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), OutputError> {
        self.log.lock().push(Call::SetVolume(volume));
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.log.lock().push(Call::Dispose);
        }
    }
}

/// Adapter wired to fresh fakes.
pub fn adapter_with(
    decoder: impl FnOnce(CallLog) -> FakeDecoder,
    backend: impl FnOnce(CallLog) -> FakeBackend,
) -> (PlaybackAdapter<FakeDecoder>, Arc<FakeBackend>, CallLog) {
    let log = CallLog::default();
    let backend = Arc::new(backend(Arc::clone(&log)));
    let adapter = PlaybackAdapter::new(
        decoder(Arc::clone(&log)),
        Arc::clone(&backend) as Arc<dyn AudioBackend>,
        &PlayerConfig::default(),
    )
    .expect("adapter");
    (adapter, backend, log)
}

pub fn default_adapter() -> (PlaybackAdapter<FakeDecoder>, Arc<FakeBackend>, CallLog) {
    adapter_with(FakeDecoder::new, FakeBackend::new)
}

/// Poll until `condition` holds or two seconds pass.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Collect every event already published.
pub fn drain_events(events: &Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    events.try_iter().collect()
}
