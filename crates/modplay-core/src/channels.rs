//! Per-channel mute strip.
//!
//! Holds the confirmed mute state of every channel of the loaded module,
//! indexed by channel number. A state only changes after the decoder has
//! confirmed it.

use crate::playback::PlaybackAdapter;
use crate::{PlayerError, Result};
use modplay_common::{ChannelState, DecoderError, ModuleDecoder, ModuleInfo};
use tracing::debug;

/// Confirmed mute states, one per module channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStrip {
    states: Vec<ChannelState>,
}

impl ChannelStrip {
    /// A strip of `count` unmuted channels.
    pub fn new(count: usize) -> Self {
        ChannelStrip {
            states: vec![ChannelState::Unmuted; count],
        }
    }

    /// A strip sized for a module.
    pub fn for_module(info: &ModuleInfo) -> Self {
        Self::new(info.channels)
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if the strip has no channels.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State of one channel.
    pub fn get(&self, channel: usize) -> Option<ChannelState> {
        self.states.get(channel).copied()
    }

    /// Iterate `(channel, state)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ChannelState)> + '_ {
        self.states.iter().copied().enumerate()
    }

    /// Number of muted channels.
    pub fn muted_count(&self) -> usize {
        self.states.iter().filter(|state| state.is_muted()).count()
    }

    /// Toggle a channel through the adapter.
    ///
    /// The stored state only changes when the decoder confirms; on error the
    /// previous state is kept. Channels outside the strip are refused without
    /// reaching the decoder.
    pub fn toggle<D: ModuleDecoder + 'static>(
        &mut self,
        adapter: &PlaybackAdapter<D>,
        channel: usize,
    ) -> Result<ChannelState> {
        let available = self.len();
        let slot = self
            .states
            .get_mut(channel)
            .ok_or(PlayerError::Decoder(DecoderError::InvalidChannel { channel, available }))?;
        let confirmed = adapter.set_channel_mute(channel, slot.toggled())?;
        *slot = confirmed;
        debug!(channel, state = %confirmed, "channel toggled");
        Ok(confirmed)
    }

    /// Re-read every channel from the decoder.
    ///
    /// Channels the decoder cannot report keep their stored state.
    pub fn refresh<D: ModuleDecoder + 'static>(&mut self, adapter: &PlaybackAdapter<D>) {
        for (channel, slot) in self.states.iter_mut().enumerate() {
            if let Ok(state) = adapter.channel_state(channel) {
                *slot = state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_from_module() {
        let info = ModuleInfo {
            channels: 8,
            ..ModuleInfo::default()
        };
        let strip = ChannelStrip::for_module(&info);
        assert_eq!(strip.len(), 8);
        assert_eq!(strip.muted_count(), 0);
        assert_eq!(strip.get(7), Some(ChannelState::Unmuted));
        assert_eq!(strip.get(8), None);
    }

    #[test]
    fn iter_yields_indices() {
        let strip = ChannelStrip::new(3);
        let indices: Vec<usize> = strip.iter().map(|(index, _)| index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
