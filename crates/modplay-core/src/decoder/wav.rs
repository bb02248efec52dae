//! WAV render decoder
//!
//! Replays a 16-bit PCM WAV render of a module one tick at a time. Transport
//! metadata is synthesised from a fixed tempo (speed 6, 125 bpm, 64-row
//! patterns), so rows, patterns and positions advance the way they would in
//! the tracker that produced the render. The two stereo lanes are exposed as
//! channels 0 (left) and 1 (right) for muting.

use hound::{SampleFormat, WavReader};
use modplay_common::{
    ChannelRequest, ChannelState, DecoderError, DecoderResult, Frame, FrameInfo, ModuleDecoder,
    ModuleInfo,
};
use std::path::Path;
use tracing::debug;

/// Ticks per row.
pub const RENDER_SPEED: u32 = 6;
/// Tempo in beats per minute.
pub const RENDER_BPM: u32 = 125;
/// Rows per pattern.
pub const ROWS_PER_PATTERN: usize = 64;
/// Channels declared for mute control, one per stereo lane.
pub const RENDER_CHANNELS: usize = OUTPUT_CHANNELS;

/// Output is always interleaved stereo.
const OUTPUT_CHANNELS: usize = 2;

struct Render {
    /// Interleaved stereo samples.
    samples: Vec<i16>,
    sample_rate: u32,
}

impl Render {
    fn frames(&self) -> usize {
        self.samples.len() / OUTPUT_CHANNELS
    }

    /// Sample frames per tracker tick (2.5 / bpm seconds).
    fn frames_per_tick(&self) -> usize {
        (self.sample_rate as usize * 5 / (2 * RENDER_BPM as usize)).max(1)
    }

    fn frames_per_pattern(&self) -> usize {
        self.frames_per_tick() * RENDER_SPEED as usize * ROWS_PER_PATTERN
    }

    fn millis(&self, frames: usize) -> u32 {
        (frames as u64 * 1000 / u64::from(self.sample_rate)) as u32
    }
}

/// Decoder bridge replaying WAV renders.
#[derive(Default)]
pub struct WavRenderDecoder {
    render: Option<Render>,
    info: Option<ModuleInfo>,
    channels: Vec<ChannelState>,
    /// Playback cursor in sample frames.
    cursor: usize,
    playing: bool,
    looped: bool,
    pcm: Vec<u8>,
}

impl WavRenderDecoder {
    /// Create a decoder with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self) -> DecoderResult<&Render> {
        self.render.as_ref().ok_or(DecoderError::NotLoaded)
    }

    fn position_at(&self, cursor: usize) -> usize {
        self.render
            .as_ref()
            .map_or(0, |render| cursor / render.frames_per_pattern())
    }

    fn jump_to_position(&mut self, position: usize) -> usize {
        let Some(render) = self.render.as_ref() else {
            return 0;
        };
        let last = render.frames().saturating_sub(1) / render.frames_per_pattern();
        let position = position.min(last);
        self.cursor = position * render.frames_per_pattern();
        self.looped = false;
        position
    }
}

fn read_render(path: &Path) -> DecoderResult<Render> {
    let reader = WavReader::open(path).map_err(|err| match err {
        hound::Error::IoError(io) => DecoderError::Io(io),
        other => DecoderError::UnsupportedFormat(other.to_string()),
    })?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(DecoderError::UnsupportedFormat(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if !matches!(spec.channels, 1 | 2) {
        return Err(DecoderError::UnsupportedFormat(format!(
            "expected mono or stereo, got {} channels",
            spec.channels
        )));
    }

    let raw = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| DecoderError::UnsupportedFormat(err.to_string()))?;
    let samples = if spec.channels == 1 {
        raw.iter().flat_map(|&sample| [sample, sample]).collect()
    } else {
        raw
    };

    Ok(Render {
        samples,
        sample_rate: spec.sample_rate,
    })
}

impl ModuleDecoder for WavRenderDecoder {
    fn load(&mut self, path: &Path) -> DecoderResult<ModuleInfo> {
        let render = read_render(path)?;

        let patterns = render.frames().div_ceil(render.frames_per_pattern());
        let info = ModuleInfo {
            name: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            format: format!("WAV render ({} Hz)", render.sample_rate),
            patterns,
            tracks: patterns * RENDER_CHANNELS,
            channels: RENDER_CHANNELS,
            instruments: 0,
            samples: 0,
            length: patterns,
            duration_ms: render.millis(render.frames()),
        };
        debug!(name = %info.name, frames = render.frames(), "render loaded");

        self.render = Some(render);
        self.channels = vec![ChannelState::Unmuted; RENDER_CHANNELS];
        self.cursor = 0;
        self.playing = false;
        self.looped = false;
        self.info = Some(info.clone());
        Ok(info)
    }

    fn start(&mut self, sample_rate: u32) -> DecoderResult<()> {
        let render = self.render()?;
        if render.sample_rate != sample_rate {
            return Err(DecoderError::UnsupportedFormat(format!(
                "render is {} Hz, output is {sample_rate} Hz",
                render.sample_rate
            )));
        }
        self.cursor = 0;
        self.looped = false;
        self.playing = true;
        Ok(())
    }

    fn play_frame(&mut self) -> DecoderResult<Frame<'_>> {
        if !self.playing {
            return Err(DecoderError::NotPlaying);
        }
        let render = self.render.as_ref().ok_or(DecoderError::NotLoaded)?;
        let total = render.frames();

        if self.cursor >= total {
            if self.looped {
                return Err(DecoderError::EndOfData);
            }
            // Report the wrap once, the way a tracker bumps its loop counter.
            self.looped = true;
            self.pcm.clear();
            let info = FrameInfo {
                position: self.position_at(total.saturating_sub(1)),
                time_ms: render.millis(total),
                total_time_ms: render.millis(total),
                loop_count: 1,
                speed: RENDER_SPEED,
                bpm: RENDER_BPM,
                ..FrameInfo::default()
            };
            return Ok(Frame {
                pcm: &self.pcm,
                info,
            });
        }

        let per_tick = render.frames_per_tick();
        let start = self.cursor;
        let frames = per_tick.min(total - start);

        self.pcm.clear();
        let window = &render.samples[start * OUTPUT_CHANNELS..(start + frames) * OUTPUT_CHANNELS];
        for (index, &sample) in window.iter().enumerate() {
            let sample = if self.channels[index % OUTPUT_CHANNELS].is_muted() {
                0
            } else {
                sample
            };
            self.pcm.extend_from_slice(&sample.to_ne_bytes());
        }

        let tick = start / per_tick;
        let row = tick / RENDER_SPEED as usize;
        let position = row / ROWS_PER_PATTERN;
        let info = FrameInfo {
            position,
            pattern: position,
            row: row % ROWS_PER_PATTERN,
            rows: ROWS_PER_PATTERN,
            frame: tick % RENDER_SPEED as usize,
            speed: RENDER_SPEED,
            bpm: RENDER_BPM,
            time_ms: render.millis(start),
            total_time_ms: render.millis(total),
            frame_time_us: (frames as u64 * 1_000_000 / u64::from(render.sample_rate)) as u32,
            buffer_size: self.pcm.len(),
            loop_count: 0,
            sequence: 0,
            virtual_channels: RENDER_CHANNELS,
            virtual_used: self.channels.iter().filter(|state| !state.is_muted()).count(),
        };
        self.cursor = start + frames;

        Ok(Frame {
            pcm: &self.pcm,
            info,
        })
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, time_ms: u32) -> DecoderResult<usize> {
        let render = self.render()?;
        let target = (u64::from(time_ms) * u64::from(render.sample_rate) / 1000) as usize;
        if target >= render.frames() {
            return Err(DecoderError::Rejected(format!(
                "{time_ms} ms is past the end of the module"
            )));
        }
        self.cursor = target;
        self.looped = false;
        Ok(self.position_at(target))
    }

    fn next_position(&mut self) -> usize {
        let next = self.position_at(self.cursor) + 1;
        self.jump_to_position(next)
    }

    fn previous_position(&mut self) -> usize {
        let previous = self.position_at(self.cursor).saturating_sub(1);
        self.jump_to_position(previous)
    }

    fn update_channel(
        &mut self,
        channel: usize,
        request: ChannelRequest,
    ) -> DecoderResult<ChannelState> {
        if self.render.is_none() {
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
