//! ProTracker MOD decoder
//!
//! Native replayer for Amiga modules: 15-sample Soundtracker files and the
//! tagged 31-sample variants ("M.K.", "FLT4", "6CHN", "8CHN", "xxCH").
//! Voices are resampled from the PAL Paula clock and panned hard left or
//! right in the Amiga LRRL order. One frame is one tracker tick.
//!
//! Supported effects: arpeggio, portamento up and down, tone portamento,
//! vibrato, the volume-slide combinations, sample offset, volume slide,
//! position jump, set volume, pattern break, set speed and tempo, and the
//! extended fine slides, pattern loop, retrigger, note cut, note delay and
//! pattern delay.

mod format;
mod replay;

#[cfg(test)]
mod fixtures;

use format::{ROWS_PER_PATTERN, Song};
use modplay_common::{
    ChannelRequest, ChannelState, DecoderError, DecoderResult, Frame, FrameInfo, ModuleDecoder,
    ModuleInfo,
};
use replay::Replayer;
use std::path::Path;
use tracing::debug;

pub use replay::{DEFAULT_BPM, DEFAULT_SPEED};

/// Upper bound on ticks simulated while measuring a song.
const MAX_SCAN_TICKS: u64 = 1 << 22;

/// Song length and the time each order position is first reached.
#[derive(Debug, Default)]
struct Timeline {
    total_us: u64,
    position_start_us: Vec<Option<u64>>,
}

impl Timeline {
    fn scan(song: &Song) -> Timeline {
        let mut replayer = Replayer::new(song);
        let mut position_start_us = vec![None; song.orders.len()];
        if let Some(first) = position_start_us.first_mut() {
            *first = Some(0);
        }

        for _ in 0..MAX_SCAN_TICKS {
            replayer.process_tick(song);
            if replayer.advance(song) {
                break;
            }
            if let Some(slot) = position_start_us.get_mut(replayer.position) {
                slot.get_or_insert(replayer.elapsed_us);
            }
        }

        Timeline {
            total_us: replayer.elapsed_us,
            position_start_us,
        }
    }

    fn start_of(&self, position: usize) -> Option<u64> {
        self.position_start_us.get(position).copied().flatten()
    }

    fn total_ms(&self) -> u32 {
        (self.total_us / 1000) as u32
    }
}

/// Decoder bridge for ProTracker modules.
#[derive(Default)]
pub struct ProTrackerDecoder {
    song: Option<Song>,
    info: Option<ModuleInfo>,
    replayer: Option<Replayer>,
    timeline: Timeline,
    channels: Vec<ChannelState>,
    sample_rate: u32,
    playing: bool,
    /// The sequence wrapped at the end of the last tick.
    wrapped: bool,
    finished: bool,
    pcm: Vec<u8>,
}

impl ProTrackerDecoder {
    /// Create a decoder with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    fn song(&self) -> DecoderResult<&Song> {
        self.song.as_ref().ok_or(DecoderError::NotLoaded)
    }

    fn jump_to_position(&mut self, step: impl FnOnce(usize) -> usize) -> usize {
        let (Some(song), Some(replayer)) = (self.song.as_ref(), self.replayer.as_mut()) else {
            return 0;
        };
        let target = step(replayer.position).min(song.orders.len().saturating_sub(1));
        replayer.jump_to(target, self.timeline.start_of(target));
        self.wrapped = false;
        self.finished = false;
        target
    }
}

impl ModuleDecoder for ProTrackerDecoder {
    fn load(&mut self, path: &Path) -> DecoderResult<ModuleInfo> {
        let bytes = std::fs::read(path)?;
        let song = Song::parse(&bytes)?;
        let timeline = Timeline::scan(&song);

        let name = if song.title.is_empty() {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            song.title.clone()
        };
        let info = ModuleInfo {
            name,
            format: format!("ProTracker {}", song.tag),
            patterns: song.pattern_count,
            tracks: song.pattern_count * song.channels,
            channels: song.channels,
            instruments: song.used_samples(),
            samples: song.used_samples(),
            length: song.orders.len(),
            duration_ms: timeline.total_ms(),
        };
        debug!(
            name = %info.name,
            format = %info.format,
            duration_ms = info.duration_ms,
            "module loaded"
        );

        self.channels = vec![ChannelState::Unmuted; song.channels];
        self.replayer = Some(Replayer::new(&song));
        self.song = Some(song);
        self.timeline = timeline;
        self.playing = false;
        self.wrapped = false;
        self.finished = false;
        self.info = Some(info.clone());
        Ok(info)
    }

    fn start(&mut self, sample_rate: u32) -> DecoderResult<()> {
        if sample_rate == 0 {
            return Err(DecoderError::Rejected("sample rate must be non-zero".into()));
        }
        let replayer = Replayer::new(self.song()?);
        self.replayer = Some(replayer);
        self.sample_rate = sample_rate;
        self.wrapped = false;
        self.finished = false;
        self.playing = true;
        Ok(())
    }

    fn play_frame(&mut self) -> DecoderResult<Frame<'_>> {
        if !self.playing {
            return Err(DecoderError::NotPlaying);
        }
        let song = self.song.as_ref().ok_or(DecoderError::NotLoaded)?;
        let replayer = self.replayer.as_mut().ok_or(DecoderError::NotPlaying)?;
        if self.finished {
            return Err(DecoderError::EndOfData);
        }

        if self.wrapped {
            self.finished = true;
            self.pcm.clear();
            let info = FrameInfo {
                position: replayer.position,
                pattern: song.pattern_at(replayer.position),
                rows: ROWS_PER_PATTERN,
                speed: replayer.speed,
                bpm: replayer.bpm,
                time_ms: self.timeline.total_ms(),
                total_time_ms: self.timeline.total_ms(),
                loop_count: replayer.loop_count,
                virtual_channels: song.channels,
                ..FrameInfo::default()
            };
            return Ok(Frame {
                pcm: &self.pcm,
                info,
            });
        }

        replayer.process_tick(song);
        let frames = replayer.frames_per_tick(self.sample_rate);
        replayer.mix(song, frames, self.sample_rate, &self.channels, &mut self.pcm);

        let info = FrameInfo {
            position: replayer.position,
            pattern: song.pattern_at(replayer.position),
            row: replayer.row,
            rows: ROWS_PER_PATTERN,
            frame: replayer.tick as usize,
            speed: replayer.speed,
            bpm: replayer.bpm,
            time_ms: (replayer.elapsed_us / 1000) as u32,
            total_time_ms: self.timeline.total_ms(),
            frame_time_us: (frames as u64 * 1_000_000 / u64::from(self.sample_rate)) as u32,
            buffer_size: self.pcm.len(),
            loop_count: 0,
            sequence: 0,
            virtual_channels: song.channels,
            virtual_used: replayer.audible_voices(&self.channels),
        };
        self.wrapped = replayer.advance(song);

        Ok(Frame {
            pcm: &self.pcm,
            info,
        })
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, time_ms: u32) -> DecoderResult<usize> {
        let song = self.song()?;
        let target_us = u64::from(time_ms) * 1000;
        if target_us >= self.timeline.total_us {
            return Err(DecoderError::Rejected(format!(
                "{time_ms} ms is past the end of the module"
            )));
        }

        // Replay silently so speed, tempo and effect memory match the target.
        let mut replayer = Replayer::new(song);
        while replayer.elapsed_us + replayer.tick_us() <= target_us {
            replayer.process_tick(song);
            if replayer.advance(song) {
                break;
            }
        }
        let position = replayer.position;
        self.replayer = Some(replayer);
        self.wrapped = false;
        self.finished = false;
        Ok(position)
    }

    fn next_position(&mut self) -> usize {
        self.jump_to_position(|position| position + 1)
    }

    fn previous_position(&mut self) -> usize {
        self.jump_to_position(|position| position.saturating_sub(1))
    }

    fn update_channel(
        &mut self,
        channel: usize,
        request: ChannelRequest,
    ) -> DecoderResult<ChannelState> {
        if self.song.is_none() {
            return Err(DecoderError::NotLoaded);
        }
        let available = self.channels.len();
        let slot = self
            .channels
            .get_mut(channel)
            .ok_or(DecoderError::InvalidChannel { channel, available })?;
        if let ChannelRequest::Set(state) = request {
            *slot = state;
        }
        Ok(*slot)
    }

    fn module_info(&self) -> Option<&ModuleInfo> {
        self.info.as_ref()
    }
}
