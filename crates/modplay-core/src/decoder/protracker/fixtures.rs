//! Synthetic modules for tests.

use std::path::PathBuf;
use tempfile::TempDir;

/// Period of C-2.
pub const C2: u16 = 428;

/// Pattern cell as stored on disk.
pub fn cell(sample: u8, period: u16, effect: u8, param: u8) -> [u8; 4] {
    [
        (sample & 0xf0) | ((period >> 8) as u8 & 0x0f),
        period as u8,
        (sample << 4) | (effect & 0x0f),
        param,
    ]
}

/// A 4-channel "M.K." module with one looping square-wave sample.
pub struct ModuleBuilder {
    title: String,
    orders: Vec<u8>,
    channels: usize,
    tag: [u8; 4],
    cells: Vec<(usize, usize, usize, [u8; 4])>,
    sample: Vec<i8>,
    finetune: u8,
}

impl ModuleBuilder {
    pub fn new(orders: &[u8]) -> Self {
        ModuleBuilder {
            title: "test song".to_string(),
            orders: orders.to_vec(),
            channels: 4,
            tag: *b"M.K.",
            cells: Vec::new(),
            sample: (0..64).map(|i| if i < 32 { 100 } else { -100 }).collect(),
            finetune: 0,
        }
    }

    pub fn channels(mut self, channels: usize, tag: &[u8; 4]) -> Self {
        self.channels = channels;
        self.tag = *tag;
        self
    }

    pub fn finetune(mut self, nibble: u8) -> Self {
        self.finetune = nibble;
        self
    }

    pub fn cell(mut self, pattern: usize, row: usize, channel: usize, bytes: [u8; 4]) -> Self {
        self.cells.push((pattern, row, channel, bytes));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; 20];
        bytes[..self.title.len()].copy_from_slice(self.title.as_bytes());

        let words = (self.sample.len() / 2) as u16;
        for index in 0..31 {
            let mut header = [0u8; 30];
            if index == 0 {
                header[..8].copy_from_slice(b"square01");
                header[22..24].copy_from_slice(&words.to_be_bytes());
                header[24] = self.finetune;
                header[25] = 64;
                header[28..30].copy_from_slice(&words.to_be_bytes());
            }
            bytes.extend_from_slice(&header);
        }

        bytes.push(self.orders.len() as u8);
        bytes.push(0x7f);
        let mut table = [0u8; 128];
        table[..self.orders.len()].copy_from_slice(&self.orders);
        bytes.extend_from_slice(&table);
        bytes.extend_from_slice(&self.tag);

        let patterns = usize::from(self.orders.iter().copied().max().unwrap_or(0)) + 1;
        let pattern_len = 64 * self.channels * 4;
        let start = bytes.len();
        bytes.resize(start + patterns * pattern_len, 0);
        for &(pattern, row, channel, cell) in &self.cells {
            let offset = start + pattern * pattern_len + (row * self.channels + channel) * 4;
            bytes[offset..offset + 4].copy_from_slice(&cell);
        }

        bytes.extend(self.sample.iter().map(|&value| value as u8));
        bytes
    }

    pub fn write(&self, dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Interleaved i16 samples of a PCM byte buffer.
pub fn samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}
