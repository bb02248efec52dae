//! Front-end view of the transport.

/// Playback state as presented to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing is playing (no module, stopped, or ended).
    #[default]
    Stopped,
    /// Audio is being rendered.
    Playing,
    /// Rendering is suspended with buffers still queued.
    Paused,
}

impl PlaybackState {
    /// Transport controls other than "open" are disabled while stopped.
    pub fn controls_disabled(self) -> bool {
        self == PlaybackState::Stopped
    }

    /// Whether a play button (rather than pause) should be offered.
    pub fn shows_play(self) -> bool {
        self != PlaybackState::Playing
    }
}
