//! Per-channel mute state as exchanged with the decoder bridge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confirmed mute state of a single module channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelState {
    /// Channel is audible.
    #[default]
    Unmuted,
    /// Channel is silenced.
    Muted,
}

impl ChannelState {
    /// The opposite state.
    pub fn toggled(self) -> Self {
        match self {
            ChannelState::Muted => ChannelState::Unmuted,
            ChannelState::Unmuted => ChannelState::Muted,
        }
    }

    /// Check whether the channel is silenced.
    pub fn is_muted(self) -> bool {
        self == ChannelState::Muted
    }

    /// Build a state from a mute flag.
    pub fn from_muted(muted: bool) -> Self {
        if muted {
            ChannelState::Muted
        } else {
            ChannelState::Unmuted
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::Muted => "muted",
            ChannelState::Unmuted => "unmuted",
        })
    }
}

/// Request sent to the decoder bridge's channel setter.
///
/// `Query` reads the current state without changing it. It never appears
/// as a confirmed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest {
    /// Set the channel to the given state.
    Set(ChannelState),
    /// Read the current state.
    Query,
}

impl From<ChannelState> for ChannelRequest {
    fn from(state: ChannelState) -> Self {
        ChannelRequest::Set(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggled_flips_state() {
        assert_eq!(ChannelState::Muted.toggled(), ChannelState::Unmuted);
        assert_eq!(ChannelState::Unmuted.toggled(), ChannelState::Muted);
        assert_eq!(ChannelState::Muted.toggled().toggled(), ChannelState::Muted);
    }

    #[test]
    fn from_muted_matches_is_muted() {
        assert!(ChannelState::from_muted(true).is_muted());
        assert!(!ChannelState::from_muted(false).is_muted());
    }
}
