use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::error::{AudioError, Result};
use crate::output::OutputKind;
use crate::streaming::DEFAULT_MAX_HEADER_BYTES;

/// Configuration for a playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Output backend (default: tone)
    pub output: OutputKind,

    /// Format of the bytes written into the session (default: 44.1kHz 16-bit mono)
    pub format: AudioFormat,

    /// Ring buffer capacity in bytes (default: 2048)
    pub buffer_capacity: usize,

    /// Smoothing filter weight out of 10 (default: 8)
    pub filter_weight: u8,

    /// Fill level above which incoming chunks are dropped (default: 75%)
    pub drop_threshold_percent: u8,

    /// How long the consumer waits for a frame (default: 10ms)
    pub frame_read_timeout: Duration,

    /// Consumer sleep while not playing (default: 10ms)
    pub idle_poll_interval: Duration,

    /// How long a producer write waits for space (default: 10ms)
    pub write_timeout: Duration,

    /// Header accumulation limit for streamed containers (default: 4096)
    pub max_header_bytes: usize,

    /// Volume at init, 0-100 (default: 50)
    pub initial_volume: u8,

    /// Lag behind schedule after which pacing restarts (default: 50ms)
    pub max_lag: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output: OutputKind::Tone,
            format: AudioFormat::MONO_16,
            buffer_capacity: 2048,
            filter_weight: 8,
            drop_threshold_percent: 75,
            frame_read_timeout: Duration::from_millis(10),
            idle_poll_interval: Duration::from_millis(10),
            write_timeout: Duration::from_millis(10),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            initial_volume: 50,
            max_lag: Duration::from_millis(50),
        }
    }
}

impl SessionConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Parse a JSON document; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AudioError::invalid_argument("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.format.validate()?;

        if self.buffer_capacity < self.format.bytes_per_frame() {
            return Err(AudioError::invalid_argument(
                "buffer_capacity",
                format!(
                    "{} bytes cannot hold one {}-byte frame",
                    self.buffer_capacity,
                    self.format.bytes_per_frame()
                ),
            ));
        }
        if self.filter_weight > 10 {
            return Err(AudioError::invalid_argument(
                "filter_weight",
                format!("{} is outside 0..=10", self.filter_weight),
            ));
        }
        if self.drop_threshold_percent == 0 || self.drop_threshold_percent > 100 {
            return Err(AudioError::invalid_argument(
                "drop_threshold_percent",
                format!("{} is outside 1..=100", self.drop_threshold_percent),
            ));
        }
        if self.initial_volume > 100 {
            return Err(AudioError::invalid_argument(
                "initial_volume",
                format!("{} is above 100", self.initial_volume),
            ));
        }
        if self.frame_read_timeout.is_zero() || self.idle_poll_interval.is_zero() {
            return Err(AudioError::invalid_argument(
                "frame_read_timeout",
                "consumer timeouts must be non-zero",
            ));
        }
        Ok(())
    }

    /// Fill level in bytes above which writes are dropped
    #[must_use]
    pub fn drop_threshold_bytes(&self) -> usize {
        self.buffer_capacity * usize::from(self.drop_threshold_percent) / 100
    }

    /// Audio the ring holds when full
    #[must_use]
    pub fn buffer_duration(&self) -> Duration {
        let frames = self.buffer_capacity / self.format.bytes_per_frame().max(1);
        self.format.frames_to_duration(frames as u64)
    }
}

/// Builder for `SessionConfig`
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set output backend
    #[must_use]
    pub fn output(mut self, output: OutputKind) -> Self {
        self.config.output = output;
        self
    }

    /// Set stream format
    #[must_use]
    pub fn format(mut self, format: AudioFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set ring capacity in bytes
    #[must_use]
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.buffer_capacity = bytes;
        self
    }

    /// Size the ring to hold `duration` of audio in the configured format
    ///
    /// Call after [`format`](Self::format).
    #[must_use]
    pub fn buffer_duration(mut self, duration: Duration) -> Self {
        self.config.buffer_capacity = self
            .config
            .format
            .duration_to_bytes(duration)
            .max(self.config.format.bytes_per_frame());
        self
    }

    /// Set smoothing filter weight (0-10)
    #[must_use]
    pub fn filter_weight(mut self, weight: u8) -> Self {
        self.config.filter_weight = weight;
        self
    }

    /// Set overflow drop threshold in percent
    #[must_use]
    pub fn drop_threshold_percent(mut self, percent: u8) -> Self {
        self.config.drop_threshold_percent = percent;
        self
    }

    /// Set consumer frame wait
    #[must_use]
    pub fn frame_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.frame_read_timeout = timeout;
        self
    }

    /// Set consumer idle sleep
    #[must_use]
    pub fn idle_poll_interval(mut self, interval: Duration) -> Self {
        self.config.idle_poll_interval = interval;
        self
    }

    /// Set producer write wait
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set header accumulation limit
    #[must_use]
    pub fn max_header_bytes(mut self, bytes: usize) -> Self {
        self.config.max_header_bytes = bytes;
        self
    }

    /// Set starting volume
    #[must_use]
    pub fn initial_volume(mut self, volume: u8) -> Self {
        self.config.initial_volume = volume;
        self
    }

    /// Set lag tolerance before pacing restarts
    #[must_use]
    pub fn max_lag(mut self, lag: Duration) -> Self {
        self.config.max_lag = lag;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
