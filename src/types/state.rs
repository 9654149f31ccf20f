/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// No resources held
    #[default]
    Uninitialized,
    /// Sink and buffer ready, not playing
    Initialized,
    /// Consumer is emitting frames
    Playing,
    /// Consumer idle, buffer retained
    Paused,
    /// Backend fault; only cleanup leaves this state
    Error,
}

impl PlaybackState {
    /// Check if the session holds a buffer and sink
    #[must_use]
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::Playing | Self::Paused)
    }

    /// Check if producers may keep writing
    #[must_use]
    pub fn accepts_writes(self) -> bool {
        self.is_initialized()
    }

    /// Check if the consumer should emit frames
    #[must_use]
    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
