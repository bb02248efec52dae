//! Playback statistics for monitoring buffer health.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of playback counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Frames pulled from the decoder (priming and refills).
    pub frames_decoded: u64,
    /// Buffers handed to the platform queue.
    pub buffers_enqueued: u64,
    /// Drain events ignored because they belonged to a retired session.
    pub stale_drains: u64,
    /// Drain events lost because the worker queue was full.
    pub dropped_drains: u64,
}

/// Lock-free counters, writable from the audio thread.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    frames_decoded: AtomicU64,
    buffers_enqueued: AtomicU64,
    stale_drains: AtomicU64,
    dropped_drains: AtomicU64,
}

impl StatsCounters {
    pub fn frame_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_enqueued(&self) {
        self.buffers_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_drain(&self) {
        self.stale_drains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_drain(&self) {
        self.dropped_drains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PlaybackStats {
        PlaybackStats {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            buffers_enqueued: self.buffers_enqueued.load(Ordering::Relaxed),
            stale_drains: self.stale_drains.load(Ordering::Relaxed),
            dropped_drains: self.dropped_drains.load(Ordering::Relaxed),
        }
    }
}
