//! Player configuration.
//!
//! Everything has a default matching the classic queue setup (three 50 000
//! byte buffers of 44.1 kHz 16-bit stereo), so a configuration file only needs
//! the fields it changes:
//!
//! ```json
//! { "volume": 0.6, "buffer_byte_size": 16384 }
//! ```

use crate::output::PcmFormat;
use modplay_common::{BUFFER_COUNT, DEFAULT_BUFFER_BYTE_SIZE, DEFAULT_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid JSON for [`PlayerConfig`].
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field holds an unusable value.
    #[error("{0}")]
    Invalid(String),
}

/// Configuration for the playback adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Size of each platform buffer in bytes.
    pub buffer_byte_size: usize,
    /// Output gain (0.0 to 1.0).
    pub volume: f32,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bits per sample (8 or 16).
    pub bits_per_sample: u16,
}

impl PlayerConfig {
    /// Smaller buffers for quicker reaction to seeks and mutes.
    /// 16 384 bytes ≈ 93ms per buffer @ 44.1 kHz 16-bit stereo
    pub fn low_latency() -> Self {
        PlayerConfig {
            buffer_byte_size: 16_384,
            ..Self::default()
        }
    }

    /// Read a JSON configuration file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: PlayerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the output gain.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// The PCM format described by this configuration.
    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            channels: self.channels,
        }
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.format()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.buffer_byte_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer_byte_size must be greater than 0".into(),
            ));
        }
        if self.buffer_byte_size % self.format().bytes_per_frame() != 0 {
            return Err(ConfigError::Invalid(format!(
                "buffer_byte_size {} is not a multiple of the {}-byte frame size",
                self.buffer_byte_size,
                self.format().bytes_per_frame()
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::Invalid(format!(
                "volume {} is outside 0.0..=1.0",
                self.volume
            )));
        }
        Ok(())
    }

    /// Audio held by all buffers when full, in milliseconds.
    pub fn latency_ms(&self) -> f32 {
        self.format()
            .duration_of(self.buffer_byte_size * BUFFER_COUNT)
            .as_secs_f32()
            * 1000.0
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            buffer_byte_size: DEFAULT_BUFFER_BYTE_SIZE,
            volume: 1.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn default_matches_cd_queue() {
        let config = PlayerConfig::default();
        assert_eq!(config.format(), PcmFormat::CD);
        assert_eq!(config.buffer_byte_size, 50_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn low_latency_is_shorter() {
        let low = PlayerConfig::low_latency();
        assert!(low.latency_ms() < PlayerConfig::default().latency_ms());
        assert_relative_eq!(low.latency_ms(), 278.64, epsilon = 0.01);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "volume": 0.25 }}"#).unwrap();

        let config = PlayerConfig::from_json_file(file.path()).unwrap();
        assert_relative_eq!(config.volume, 0.25);
        assert_eq!(config.buffer_byte_size, DEFAULT_BUFFER_BYTE_SIZE);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let config = PlayerConfig::default().with_volume(1.5);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn rejects_misaligned_buffer() {
        let config = PlayerConfig {
            buffer_byte_size: 50_001,
            ..PlayerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PlayerConfig::from_json_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
