//! ProTracker module layout
//!
//! A MOD file is a 20-byte title, 15 or 31 sample headers of 30 bytes, the
//! order table, an optional 4-byte format tag at offset 1080, the patterns and
//! finally the raw 8-bit sample data.

use modplay_common::{DecoderError, DecoderResult};

/// Rows in every ProTracker pattern.
pub const ROWS_PER_PATTERN: usize = 64;

const TITLE_LEN: usize = 20;
const SAMPLE_HEADER_LEN: usize = 30;
const ORDER_TABLE_LEN: usize = 128;
const TAG_OFFSET: usize = 1080;
const NOTE_LEN: usize = 4;

/// One sample with its 8-bit signed data.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Finetune in eighths of a semitone (-8..=7).
    pub finetune: i8,
    pub volume: u8,
    pub loop_start: usize,
    pub loop_len: usize,
    pub data: Vec<i8>,
}

impl Sample {
    pub fn has_loop(&self) -> bool {
        self.loop_len > 2
    }

    pub fn loop_end(&self) -> usize {
        self.loop_start + self.loop_len
    }
}

/// One pattern cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Note {
    /// 1-based sample number, 0 keeps the current sample.
    pub sample: u8,
    /// Amiga period, 0 means no new note.
    pub period: u16,
    pub effect: u8,
    pub param: u8,
}

impl Note {
    fn from_bytes(bytes: &[u8]) -> Self {
        Note {
            sample: (bytes[0] & 0xf0) | (bytes[2] >> 4),
            period: (u16::from(bytes[0] & 0x0f) << 8) | u16::from(bytes[1]),
            effect: bytes[2] & 0x0f,
            param: bytes[3],
        }
    }
}

/// A parsed module.
#[derive(Debug, Clone)]
pub struct Song {
    pub title: String,
    /// Format tag ("M.K.", "6CHN", ...) or "15-sample" for untagged files.
    pub tag: String,
    pub channels: usize,
    pub samples: Vec<Sample>,
    /// Pattern numbers, trimmed to the song length.
    pub orders: Vec<u8>,
    pub restart: usize,
    pub pattern_count: usize,
    notes: Vec<Note>,
}

impl Song {
    /// Parse a module image.
    pub fn parse(bytes: &[u8]) -> DecoderResult<Song> {
        let (tag, channels, sample_count) = detect_layout(bytes);

        let mut samples = Vec::with_capacity(sample_count);
        let mut lengths = Vec::with_capacity(sample_count);
        for index in 0..sample_count {
            let offset = TITLE_LEN + index * SAMPLE_HEADER_LEN;
            let (sample, length) = read_sample_header(slice(bytes, offset, SAMPLE_HEADER_LEN)?);
            samples.push(sample);
            lengths.push(length);
        }

        let song_offset = TITLE_LEN + sample_count * SAMPLE_HEADER_LEN;
        let header = slice(bytes, song_offset, 2 + ORDER_TABLE_LEN)?;
        let length = usize::from(header[0]);
        if length == 0 || length > ORDER_TABLE_LEN {
            return Err(DecoderError::UnsupportedFormat(format!(
                "invalid song length {length}"
            )));
        }
        let table = &header[2..];
        // Patterns referenced past the song length are still stored in the file.
        let pattern_count = usize::from(table.iter().copied().max().unwrap_or(0)) + 1;
        let orders = table[..length].to_vec();
        let restart = match usize::from(header[1]) {
            restart if restart < length => restart,
            _ => 0,
        };

        let mut offset = song_offset + 2 + ORDER_TABLE_LEN;
        if sample_count == 31 {
            offset += 4;
        }
        let pattern_len = ROWS_PER_PATTERN * channels * NOTE_LEN;
        let pattern_bytes = slice(bytes, offset, pattern_count * pattern_len)?;
        let notes = pattern_bytes
            .chunks_exact(NOTE_LEN)
            .map(Note::from_bytes)
            .collect();
        offset += pattern_count * pattern_len;

        // Ripped modules are often truncated; keep whatever sample data is there.
        for (sample, wanted) in samples.iter_mut().zip(lengths) {
            let available = bytes.len().saturating_sub(offset).min(wanted);
            sample.data = bytes[offset..offset + available]
                .iter()
                .map(|&byte| byte as i8)
                .collect();
            offset += available;
            if sample.loop_end() > sample.data.len() {
                sample.loop_len = sample.data.len().saturating_sub(sample.loop_start);
            }
        }

        Ok(Song {
            title: latin1(slice(bytes, 0, TITLE_LEN)?),
            tag,
            channels,
            samples,
            orders,
            restart,
            pattern_count,
            notes,
        })
    }

    /// Cell at `row` of `pattern` on `channel`. Missing cells read as empty.
    pub fn note(&self, pattern: usize, row: usize, channel: usize) -> Note {
        let index = (pattern * ROWS_PER_PATTERN + row) * self.channels + channel;
        self.notes.get(index).copied().unwrap_or_default()
    }

    /// Pattern played at an order position.
    pub fn pattern_at(&self, position: usize) -> usize {
        self.orders.get(position).map_or(0, |&pattern| usize::from(pattern))
    }

    /// Samples that carry data.
    pub fn used_samples(&self) -> usize {
        self.samples.iter().filter(|sample| !sample.data.is_empty()).count()
    }
}

fn detect_layout(bytes: &[u8]) -> (String, usize, usize) {
    let tag = bytes.get(TAG_OFFSET..TAG_OFFSET + 4).unwrap_or_default();
    let channels = match tag {
        b"M.K." | b"M!K!" | b"FLT4" | b"4CHN" => Some(4),
        b"6CHN" => Some(6),
        b"8CHN" | b"OKTA" | b"CD81" => Some(8),
        [digit, b'C', b'H', b'N'] if digit.is_ascii_digit() => Some(usize::from(digit - b'0')),
        [tens, units, b'C', b'H'] if tens.is_ascii_digit() && units.is_ascii_digit() => {
            Some(usize::from(tens - b'0') * 10 + usize::from(units - b'0'))
        }
        _ => None,
    };
    match channels {
        Some(channels) if (1..=32).contains(&channels) => (latin1(tag), channels, 31),
        _ => ("15-sample".to_string(), 4, 15),
    }
}

/// Header fields plus the stored sample length in bytes.
fn read_sample_header(header: &[u8]) -> (Sample, usize) {
    let word = |offset: usize| {
        usize::from(u16::from_be_bytes([header[offset], header[offset + 1]])) * 2
    };
    let nibble = (header[24] & 0x0f) as i8;
    let sample = Sample {
        finetune: if nibble > 7 { nibble - 16 } else { nibble },
        volume: header[25].min(64),
        loop_start: word(26),
        loop_len: word(28),
        data: Vec::new(),
    };
    (sample, word(22))
}

fn slice(bytes: &[u8], offset: usize, len: usize) -> DecoderResult<&[u8]> {
    bytes.get(offset..offset + len).ok_or_else(|| {
        DecoderError::UnsupportedFormat(format!(
            "module truncated at byte {offset} (file is {} bytes)",
            bytes.len()
        ))
    })
}

fn latin1(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&byte| byte != 0)
        .map(|&byte| char::from(byte))
        .collect::<String>()
        .trim_end()
        .to_string()
}
