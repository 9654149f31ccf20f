//! Audio format definitions

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

/// Linear PCM stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels (1 or 2)
    pub channels: u16,
    /// Bits per sample (8 or 16)
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// 16-bit 44.1kHz mono, the layout the tone generator was tuned for
    pub const MONO_16: Self = Self {
        sample_rate: 44100,
        channels: 1,
        bits_per_sample: 16,
    };

    /// Standard CD audio format (16-bit 44.1kHz stereo)
    pub const CD_QUALITY: Self = Self {
        sample_rate: 44100,
        channels: 2,
        bits_per_sample: 16,
    };

    /// Create a new audio format
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Check the format against what the pipeline can play
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero sample rate, a channel count other
    /// than 1 or 2, or a bit depth other than 8 or 16.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::invalid_argument(
                "sample_rate",
                "must be non-zero",
            ));
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(AudioError::invalid_argument(
                "channels",
                format!("{} channels not supported", self.channels),
            ));
        }
        if !matches!(self.bits_per_sample, 8 | 16) {
            return Err(AudioError::invalid_argument(
                "bits_per_sample",
                format!("{}-bit samples not supported", self.bits_per_sample),
            ));
        }
        Ok(())
    }

    /// Get bytes per sample of a single channel
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Get bytes per frame (all channels for one sample)
    #[must_use]
    pub fn bytes_per_frame(self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Get bytes per second
    #[must_use]
    pub fn bytes_per_second(self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Calculate duration for given number of frames
    #[must_use]
    pub fn frames_to_duration(self, frames: u64) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_nanos(
            frames.saturating_mul(1_000_000_000) / u64::from(self.sample_rate),
        )
    }

    /// Calculate frames for given duration
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn duration_to_frames(self, duration: std::time::Duration) -> u64 {
        (duration.as_nanos() * u128::from(self.sample_rate) / 1_000_000_000) as u64
    }

    /// Calculate bytes for given duration, rounded down to whole frames
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn duration_to_bytes(self, duration: std::time::Duration) -> usize {
        self.duration_to_frames(duration) as usize * self.bytes_per_frame()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::MONO_16
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let layout = if self.channels == 1 { "mono" } else { "stereo" };
        write!(
            f,
            "{} Hz {}-bit {}",
            self.sample_rate, self.bits_per_sample, layout
        )
    }
}
