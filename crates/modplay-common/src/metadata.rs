//! Module and frame metadata reported by the decoder bridge.

use serde::{Deserialize, Serialize};

/// Static information about a loaded module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module title.
    pub name: String,
    /// Format description (e.g. "Protracker M.K.", "FastTracker v2.00 XM 1.04").
    pub format: String,
    /// Number of patterns.
    pub patterns: usize,
    /// Number of tracks.
    pub tracks: usize,
    /// Number of channels (tracks per pattern).
    pub channels: usize,
    /// Number of instruments.
    pub instruments: usize,
    /// Number of samples.
    pub samples: usize,
    /// Sequence length in patterns.
    pub length: usize,
    /// Duration of the main sequence in milliseconds.
    pub duration_ms: u32,
}

impl ModuleInfo {
    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f32 {
        self.duration_ms as f32 / 1000.0
    }
}

/// Transport metadata valid for one decoded frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Current position in the order list.
    pub position: usize,
    /// Pattern being played.
    pub pattern: usize,
    /// Row within the pattern.
    pub row: usize,
    /// Number of rows in the current pattern.
    pub rows: usize,
    /// Tick within the row.
    pub frame: usize,
    /// Ticks per row.
    pub speed: u32,
    /// Beats per minute.
    pub bpm: u32,
    /// Elapsed time in milliseconds.
    pub time_ms: u32,
    /// Total module time in milliseconds.
    pub total_time_ms: u32,
    /// Duration of this frame in microseconds.
    pub frame_time_us: u32,
    /// Size of the PCM data of this frame in bytes.
    pub buffer_size: usize,
    /// How many times the module has looped. Non-zero means it wrapped.
    pub loop_count: u32,
    /// Current sequence.
    pub sequence: usize,
    /// Number of virtual channels.
    pub virtual_channels: usize,
    /// Virtual channels in use.
    pub virtual_used: usize,
}

impl FrameInfo {
    /// Check whether the module has wrapped (end of playback).
    pub fn has_looped(&self) -> bool {
        self.loop_count != 0
    }
}

/// One decoded frame: PCM bytes borrowed from the decoder plus metadata.
///
/// The slice stays valid until the next call into the decoder.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Interleaved signed 16-bit native-endian PCM.
    pub pcm: &'a [u8],
    /// Transport metadata for this frame.
    pub info: FrameInfo,
}

impl Frame<'_> {
    /// Byte length reported for this frame, capped to the available PCM.
    pub fn byte_len(&self) -> usize {
        self.info.buffer_size.min(self.pcm.len())
    }

    /// The PCM bytes covered by the reported byte length.
    pub fn bytes(&self) -> &[u8] {
        &self.pcm[..self.byte_len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_respect_reported_size() {
        let pcm = [1u8, 2, 3, 4, 5, 6];
        let frame = Frame {
            pcm: &pcm,
            info: FrameInfo {
                buffer_size: 4,
                ..FrameInfo::default()
            },
        };
        assert_eq!(frame.bytes(), &[1, 2, 3, 4]);

        let oversized = Frame {
            pcm: &pcm,
            info: FrameInfo {
                buffer_size: 64,
                ..FrameInfo::default()
            },
        };
        assert_eq!(oversized.byte_len(), 6);
    }

    #[test]
    fn loop_count_marks_end() {
        let mut info = FrameInfo::default();
        assert!(!info.has_looped());
        info.loop_count = 1;
        assert!(info.has_looped());
    }
}
