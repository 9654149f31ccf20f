//! Remote control records

use crate::error::{AudioError, Result};

/// Command carried in a 4-byte `{command, volume, reserved[2]}` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Start or resume
    Play,
    /// Pause if playing
    Pause,
    /// Stop and discard buffered audio
    Stop,
    /// Set volume, 0-100
    SetVolume(u8),
    /// Silence, remembering the current volume
    Mute,
    /// Restore the volume saved by mute
    Unmute,
}

impl ControlCommand {
    /// Record length
    pub const LEN: usize = 4;

    /// Wire code of the command
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Play => 0x01,
            Self::Pause => 0x02,
            Self::Stop => 0x03,
            Self::SetVolume(_) => 0x04,
            Self::Mute => 0x05,
            Self::Unmute => 0x06,
        }
    }

    /// Parse a control record
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a length other than 4, an unknown command code,
    /// or a volume above 100.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let [command, volume, _, _] = bytes else {
            return Err(AudioError::invalid_argument(
                "control",
                format!("expected {} bytes, got {}", Self::LEN, bytes.len()),
            ));
        };

        match *command {
            0x01 => Ok(Self::Play),
            0x02 => Ok(Self::Pause),
            0x03 => Ok(Self::Stop),
            0x04 if *volume <= 100 => Ok(Self::SetVolume(*volume)),
            0x04 => Err(AudioError::invalid_argument(
                "volume",
                format!("{volume} is above 100"),
            )),
            0x05 => Ok(Self::Mute),
            0x06 => Ok(Self::Unmute),
            other => Err(AudioError::invalid_argument(
                "control",
                format!("unknown command 0x{other:02x}"),
            )),
        }
    }

    /// Encode as a control record
    #[must_use]
    pub fn encode(self) -> [u8; Self::LEN] {
        let volume = match self {
            Self::SetVolume(v) => v,
            _ => 0,
        };
        [self.code(), volume, 0, 0]
    }
}

impl TryFrom<&[u8]> for ControlCommand {
    type Error = AudioError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes)
    }
}
