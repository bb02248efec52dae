//! Playback session: the state shared by control calls and refills.

use crate::output::{AudioQueue, BufferId, PcmFormat};
use modplay_common::{FrameInfo, PlaybackState};
use std::fmt;
use tracing::debug;

/// Lifecycle of a playback session.
///
/// `Uninitialized → Initialized → Running ⇄ Paused → Stopped`, and back to
/// `Uninitialized` only through dispose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No output queue.
    #[default]
    Uninitialized,
    /// Queue and buffers allocated, nothing enqueued.
    Initialized,
    /// Buffers primed and the queue is rendering.
    Running,
    /// Rendering suspended, buffers still queued.
    Paused,
    /// Stopped by request, end of module or a decode failure.
    Stopped,
}

impl SessionState {
    /// Whether buffers are (or may be) queued with the platform.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    /// Front-end view of this state.
    pub fn playback_state(self) -> PlaybackState {
        match self {
            SessionState::Running => PlaybackState::Playing,
            SessionState::Paused => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initialized => "initialized",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        })
    }
}

/// Staging storage for one platform buffer.
#[derive(Debug)]
pub struct AudioBuffer {
    id: BufferId,
    data: Vec<u8>,
    len: usize,
    fills: u64,
}

impl AudioBuffer {
    pub(crate) fn new(id: BufferId, capacity: usize) -> Self {
        AudioBuffer {
            id,
            data: vec![0; capacity],
            len: 0,
            fills: 0,
        }
    }

    /// Platform id of this buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes filled by the last frame.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// How many frames have been copied into this buffer.
    pub fn fills(&self) -> u64 {
        self.fills
    }

    /// Copy one frame in, truncated to capacity. Returns the bytes kept.
    pub(crate) fn fill(&mut self, pcm: &[u8]) -> usize {
        let len = pcm.len().min(self.data.len());
        self.data[..len].copy_from_slice(&pcm[..len]);
        self.len = len;
        self.fills += 1;
        len
    }
}

/// The single owned playback session.
pub(crate) struct PlaybackSession {
    pub format: PcmFormat,
    pub buffer_byte_size: usize,
    pub buffers: Vec<AudioBuffer>,
    pub queue: Option<Box<dyn AudioQueue>>,
    pub state: SessionState,
    pub running: bool,
    pub valid: bool,
    pub volume: f32,
    /// Bumped whenever queued buffers stop belonging to the live session.
    pub generation: u64,
    pub position: usize,
    pub elapsed_ms: u32,
}

impl PlaybackSession {
    pub fn new(format: PcmFormat, buffer_byte_size: usize, volume: f32) -> Self {
        PlaybackSession {
            format,
            buffer_byte_size,
            buffers: Vec::new(),
            queue: None,
            state: SessionState::Uninitialized,
            running: false,
            valid: false,
            volume,
            generation: 0,
            position: 0,
            elapsed_ms: 0,
        }
    }

    pub fn buffer_index(&self, id: BufferId) -> Option<usize> {
        self.buffers.iter().position(|buffer| buffer.id() == id)
    }

    pub fn record(&mut self, info: &FrameInfo) {
        self.position = info.position;
        self.elapsed_ms = info.time_ms;
    }

    /// Invalidate queued buffers without touching the queue.
    pub fn retire(&mut self) {
        self.running = false;
        self.generation += 1;
    }

    /// Dispose the output queue, which invalidates every buffer.
    pub fn teardown_queue(&mut self) {
        if let Some(mut queue) = self.queue.take() {
            queue.dispose();
            debug!(generation = self.generation, "output queue disposed");
        }
        self.buffers.clear();
        self.valid = false;
        self.retire();
    }
}
