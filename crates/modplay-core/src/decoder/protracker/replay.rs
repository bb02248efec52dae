//! Pattern sequencer and software mixer.
//!
//! One call to [`Replayer::process_tick`] runs a tracker tick: on tick 0 of a
//! row the notes are read and triggered, on the other ticks the running
//! effects are updated. [`Replayer::mix`] then renders the tick into
//! interleaved stereo and [`Replayer::advance`] moves the sequence on.

use super::format::{Note, ROWS_PER_PATTERN, Sample, Song};
use modplay_common::ChannelState;

/// Paula clock (PAL) over two: the sample rate heard at period 1.
const PAULA_RATE: f64 = 3_546_894.6;
const MIN_PERIOD: u16 = 113;
const MAX_PERIOD: u16 = 856;

/// Ticks per row at song start.
pub const DEFAULT_SPEED: u32 = 6;
/// Tempo at song start.
pub const DEFAULT_BPM: u32 = 125;

const VIBRATO_TABLE: [u8; 32] = [
    0, 24, 49, 74, 97, 120, 141, 161, 180, 197, 212, 224, 235, 244, 250, 253, 255, 253, 250, 244,
    235, 224, 212, 197, 180, 161, 141, 120, 97, 74, 49, 24,
];

#[derive(Debug, Clone, Default)]
struct Voice {
    sample: Option<usize>,
    /// Read offset into the sample data, in sample frames.
    cursor: f64,
    active: bool,
    period: u16,
    /// Period heard this tick, after arpeggio or vibrato.
    output_period: u16,
    finetune: i8,
    volume: u8,
    effect: u8,
    param: u8,
    porta_target: u16,
    porta_speed: u8,
    /// Vibrato speed in the high nibble, depth in the low one.
    vibrato: u8,
    vibrato_pos: u8,
    offset: u8,
    loop_row: usize,
    loop_remaining: u8,
    delayed_period: u16,
    left: bool,
}

impl Voice {
    fn trigger(&mut self, period: u16) {
        self.period = period;
        self.cursor = 0.0;
        self.vibrato_pos = 0;
        self.active = self.sample.is_some();
    }

    /// Tick 0: take the row's note and run its one-shot effects.
    fn start_row(&mut self, note: Note, samples: &[Sample]) {
        let (hi, lo) = (note.param >> 4, note.param & 0x0f);
        self.effect = note.effect;
        self.param = note.param;

        if note.sample > 0 {
            let index = usize::from(note.sample) - 1;
            if let Some(sample) = samples.get(index) {
                self.sample = Some(index);
                self.volume = sample.volume;
                self.finetune = sample.finetune;
            }
        }

        if note.period > 0 {
            let period = tune(note.period, self.finetune);
            match (note.effect, hi) {
                (0x3 | 0x5, _) => self.porta_target = period,
                (0xe, 0xd) if lo > 0 => self.delayed_period = period,
                _ => self.trigger(period),
            }
        }

        match note.effect {
            0x3 if note.param != 0 => self.porta_speed = note.param,
            0x4 => {
                if lo != 0 {
                    self.vibrato = (self.vibrato & 0xf0) | lo;
                }
                if hi != 0 {
                    self.vibrato = (self.vibrato & 0x0f) | (hi << 4);
                }
            }
            0x9 => {
                if note.param != 0 {
                    self.offset = note.param;
                }
                if note.period > 0 {
                    self.cursor = f64::from(self.offset) * 256.0;
                }
            }
            0xc => self.volume = note.param.min(64),
            0xe => match hi {
                0x1 => self.slide_period(-i32::from(lo)),
                0x2 => self.slide_period(i32::from(lo)),
                0xa => self.volume = (self.volume + lo).min(64),
                0xb => self.volume = self.volume.saturating_sub(lo),
                0xc if lo == 0 => self.volume = 0,
                _ => {}
            },
            _ => {}
        }
        self.output_period = self.period;
    }

    /// Ticks 1 and later: update the running effect.
    fn update(&mut self, tick: u32) {
        let (hi, lo) = (self.param >> 4, self.param & 0x0f);
        self.output_period = self.period;

        match self.effect {
            0x0 if self.param != 0 => {
                let semitones = match tick % 3 {
                    0 => 0,
                    1 => hi,
                    _ => lo,
                };
                self.output_period = transpose(self.period, semitones);
            }
            0x1 => self.slide_period(-i32::from(self.param)),
            0x2 => self.slide_period(i32::from(self.param)),
            0x3 => self.tone_portamento(),
            0x4 => self.vibrato(),
            0x5 => {
                self.tone_portamento();
                self.volume_slide();
            }
            0x6 => {
                self.vibrato();
                self.volume_slide();
            }
            0xa => self.volume_slide(),
            0xe => match hi {
                0x9 if lo != 0 && tick % u32::from(lo) == 0 => self.cursor = 0.0,
                0xc if tick == u32::from(lo) => self.volume = 0,
                0xd if tick == u32::from(lo) && self.delayed_period != 0 => {
                    let period = std::mem::take(&mut self.delayed_period);
                    self.trigger(period);
                    self.output_period = period;
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn slide_period(&mut self, delta: i32) {
        if self.period == 0 {
            return;
        }
        let period = (i32::from(self.period) + delta)
            .clamp(i32::from(MIN_PERIOD), i32::from(MAX_PERIOD));
        self.period = period as u16;
        self.output_period = self.period;
    }

    fn tone_portamento(&mut self) {
        let target = self.porta_target;
        if target == 0 || self.period == 0 {
            return;
        }
        let speed = u16::from(self.porta_speed);
        self.period = if self.period < target {
            (self.period + speed).min(target)
        } else {
            self.period.saturating_sub(speed).max(target)
        };
        if self.period == target {
            self.porta_target = 0;
        }
        self.output_period = self.period;
    }

    fn vibrato(&mut self) {
        let depth = u16::from(self.vibrato & 0x0f);
        let amplitude = u16::from(VIBRATO_TABLE[usize::from((self.vibrato_pos >> 2) & 0x1f)]);
        let delta = (amplitude * depth) >> 7;
        self.output_period = if self.vibrato_pos & 0x80 == 0 {
            self.period + delta
        } else {
            self.period.saturating_sub(delta)
        };
        self.vibrato_pos = self.vibrato_pos.wrapping_add((self.vibrato >> 4) << 2);
    }

    fn volume_slide(&mut self) {
        let (up, down) = (self.param >> 4, self.param & 0x0f);
        self.volume = if up != 0 {
            (self.volume + up).min(64)
        } else {
            self.volume.saturating_sub(down)
        };
    }

    /// Next 8-bit sample, following the loop. `None` once a one-shot ends.
    fn next_sample(&mut self, sample: &Sample, step: f64) -> Option<i8> {
        if sample.has_loop() && self.cursor >= sample.loop_end() as f64 {
            let start = sample.loop_start as f64;
            self.cursor = start + (self.cursor - start) % sample.loop_len as f64;
        }
        let Some(&value) = sample.data.get(self.cursor as usize) else {
            self.active = false;
            return None;
        };
        self.cursor += step;
        Some(value)
    }
}

/// Apply a sample's finetune (eighths of a semitone) to a period.
fn tune(period: u16, finetune: i8) -> u16 {
    if finetune == 0 {
        return period;
    }
    (f64::from(period) * 2f64.powf(-f64::from(finetune) / 96.0)).round() as u16
}

fn transpose(period: u16, semitones: u8) -> u16 {
    if semitones == 0 {
        return period;
    }
    (f64::from(period) / 2f64.powf(f64::from(semitones) / 12.0)).round().max(1.0) as u16
}

/// Sequencer state of a playing song.
#[derive(Debug, Clone)]
pub struct Replayer {
    voices: Vec<Voice>,
    pub speed: u32,
    pub bpm: u32,
    pub tick: u32,
    pub position: usize,
    pub row: usize,
    jump: Option<usize>,
    break_row: Option<usize>,
    loop_jump: Option<usize>,
    row_delay: u32,
    repeating: bool,
    /// Order positions entered since the last wrap.
    visited: Vec<bool>,
    pub loop_count: u32,
    /// Song time at the start of the current tick, in microseconds.
    pub elapsed_us: u64,
    scratch: Vec<i32>,
}

impl Replayer {
    pub fn new(song: &Song) -> Self {
        let mut visited = vec![false; song.orders.len()];
        if let Some(first) = visited.first_mut() {
            *first = true;
        }
        Replayer {
            // Amiga panning: channels 0 and 3 left, 1 and 2 right.
            voices: (0..song.channels)
                .map(|channel| Voice {
                    left: matches!(channel % 4, 0 | 3),
                    ..Voice::default()
                })
                .collect(),
            speed: DEFAULT_SPEED,
            bpm: DEFAULT_BPM,
            tick: 0,
            position: 0,
            row: 0,
            jump: None,
            break_row: None,
            loop_jump: None,
            row_delay: 0,
            repeating: false,
            visited,
            loop_count: 0,
            elapsed_us: 0,
            scratch: Vec::new(),
        }
    }

    /// Length of the current tick in microseconds.
    pub fn tick_us(&self) -> u64 {
        2_500_000 / u64::from(self.bpm)
    }

    /// Output frames rendered for the current tick.
    pub fn frames_per_tick(&self, sample_rate: u32) -> usize {
        (sample_rate as usize * 5 / (2 * self.bpm as usize)).max(1)
    }

    /// Voices producing sound that are not muted.
    pub fn audible_voices(&self, mutes: &[ChannelState]) -> usize {
        self.voices
            .iter()
            .zip(mutes)
            .filter(|(voice, state)| voice.active && !state.is_muted())
            .count()
    }

    pub fn process_tick(&mut self, song: &Song) {
        if self.tick == 0 && !self.repeating {
            self.play_row(song);
        } else {
            let tick = self.tick;
            for voice in &mut self.voices {
                voice.update(tick);
            }
        }
    }

    /// Move to the next tick. Returns true when the sequence wrapped around
    /// or jumped back to a position it already played.
    pub fn advance(&mut self, song: &Song) -> bool {
        self.elapsed_us += self.tick_us();
        self.tick += 1;
        if self.tick < self.speed {
            return false;
        }
        self.tick = 0;
        if self.row_delay > 0 {
            self.row_delay -= 1;
            self.repeating = true;
            return false;
        }
        self.repeating = false;
        self.next_row(song)
    }

    /// Restart at row 0 of `position`, optionally resetting the song clock.
    pub fn jump_to(&mut self, position: usize, elapsed_us: Option<u64>) {
        self.position = position;
        self.row = 0;
        self.tick = 0;
        self.jump = None;
        self.break_row = None;
        self.loop_jump = None;
        self.row_delay = 0;
        self.repeating = false;
        self.visited.fill(false);
        if let Some(slot) = self.visited.get_mut(position) {
            *slot = true;
        }
        if let Some(elapsed_us) = elapsed_us {
            self.elapsed_us = elapsed_us;
        }
    }

    /// Render the current tick as interleaved native-endian i16 stereo.
    ///
    /// Muted voices keep advancing so they resume in place when unmuted.
    pub fn mix(
        &mut self,
        song: &Song,
        frames: usize,
        sample_rate: u32,
        mutes: &[ChannelState],
        out: &mut Vec<u8>,
    ) {
        self.scratch.clear();
        self.scratch.resize(frames * 2, 0);
        let gain = (8 / self.voices.len().max(1)).max(1) as i32;

        for (index, voice) in self.voices.iter_mut().enumerate() {
            if !voice.active || voice.output_period == 0 {
                continue;
            }
            let Some(sample) = voice.sample.and_then(|sample| song.samples.get(sample)) else {
                continue;
            };
            let muted = mutes.get(index).is_some_and(|state| state.is_muted());
            let step = PAULA_RATE / f64::from(voice.output_period) / f64::from(sample_rate);
            let volume = i32::from(voice.volume);
            let lane = usize::from(!voice.left);

            for frame in 0..frames {
                let Some(value) = voice.next_sample(sample, step) else {
                    break;
                };
                if !muted {
                    self.scratch[frame * 2 + lane] += i32::from(value) * volume;
                }
            }
        }

        out.clear();
        out.reserve(frames * 4);
        for &sum in &self.scratch {
            let value = (sum * gain).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
            out.extend_from_slice(&value.to_ne_bytes());
        }
    }

    fn play_row(&mut self, song: &Song) {
        let pattern = song.pattern_at(self.position);
        for channel in 0..self.voices.len() {
            let note = song.note(pattern, self.row, channel);
            self.voices[channel].start_row(note, &song.samples);
            self.sequence_effect(channel, note);
        }
    }

    /// Effects that steer the sequence rather than a voice.
    fn sequence_effect(&mut self, channel: usize, note: Note) {
        let (hi, lo) = (note.param >> 4, note.param & 0x0f);
        match note.effect {
            0xb => self.jump = Some(usize::from(note.param)),
            0xd => {
                let row = usize::from(hi) * 10 + usize::from(lo);
                self.break_row = Some(if row < ROWS_PER_PATTERN { row } else { 0 });
            }
            0xf if note.param == 0 => {}
            0xf if note.param < 0x20 => self.speed = u32::from(note.param),
            0xf => self.bpm = u32::from(note.param),
            0xe if hi == 0x6 => {
                let voice = &mut self.voices[channel];
                if lo == 0 {
                    voice.loop_row = self.row;
                } else if voice.loop_remaining == 0 {
                    voice.loop_remaining = lo;
                    self.loop_jump = Some(voice.loop_row);
                } else {
                    voice.loop_remaining -= 1;
                    if voice.loop_remaining > 0 {
                        self.loop_jump = Some(voice.loop_row);
                    }
                }
            }
            0xe if hi == 0xe => self.row_delay = u32::from(lo),
            _ => {}
        }
    }

    fn next_row(&mut self, song: &Song) -> bool {
        if let Some(row) = self.loop_jump.take() {
            self.row = row;
            self.jump = None;
            self.break_row = None;
            return false;
        }
        if self.jump.is_some() || self.break_row.is_some() {
            let target = self.jump.take().unwrap_or(self.position + 1);
            let row = self.break_row.take().unwrap_or(0);
            return self.enter(song, target, row);
        }
        self.row += 1;
        if self.row >= ROWS_PER_PATTERN {
            return self.enter(song, self.position + 1, 0);
        }
        false
    }

    fn enter(&mut self, song: &Song, target: usize, row: usize) -> bool {
        let (target, wrapped) = if target < song.orders.len() {
            (target, false)
        } else {
            (song.restart, true)
        };
        let looped = wrapped || self.visited.get(target).copied().unwrap_or(false);
        if looped {
            self.loop_count += 1;
            self.visited.fill(false);
        }
        if let Some(slot) = self.visited.get_mut(target) {
            *slot = true;
        }
        self.position = target;
        self.row = row;
        looped
    }
}
