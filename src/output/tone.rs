//! PWM tone generator sink

use std::sync::Arc;

use super::{AudioSink, OutputKind, SinkError};
use crate::audio::SampleRange;

/// 4 kHz carrier
pub const DEFAULT_PWM_PERIOD_NS: u32 = 250_000;

/// One PWM output pin
pub trait PwmChannel: Send + Sync {
    /// Whether the device can be driven
    fn is_ready(&self) -> bool;

    /// Program period and high time, both in nanoseconds
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the setting.
    fn set_pulse(&self, period_ns: u32, pulse_ns: u32) -> Result<(), SinkError>;
}

/// Drives a PWM channel with one unsigned 16-bit sample per frame
///
/// Samples map linearly onto 10%..90% duty so the carrier never stops.
pub struct ToneSink {
    pwm: Arc<dyn PwmChannel>,
    period_ns: u32,
    started: bool,
}

impl ToneSink {
    /// Create a sink with the default carrier
    #[must_use]
    pub fn new(pwm: Arc<dyn PwmChannel>) -> Self {
        Self::with_period(pwm, DEFAULT_PWM_PERIOD_NS)
    }

    /// Create a sink with a custom carrier period
    #[must_use]
    pub fn with_period(pwm: Arc<dyn PwmChannel>, period_ns: u32) -> Self {
        Self {
            pwm,
            period_ns,
            started: false,
        }
    }

    /// Carrier period
    #[must_use]
    pub fn period_ns(&self) -> u32 {
        self.period_ns
    }

    /// High time for `sample`
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn pulse_for(&self, sample: u16) -> u32 {
        let period = u64::from(self.period_ns);
        let min = period / 10;
        let max = period * 9 / 10;
        (min + u64::from(sample) * (max - min) / 65535) as u32
    }

    /// Check if [`start`](AudioSink::start) has been called
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl AudioSink for ToneSink {
    fn kind(&self) -> OutputKind {
        OutputKind::Tone
    }

    fn sample_range(&self) -> SampleRange {
        SampleRange::Unsigned
    }

    fn wants_smoothing(&self) -> bool {
        true
    }

    fn is_ready(&self) -> bool {
        self.pwm.is_ready()
    }

    fn start(&mut self) -> Result<(), SinkError> {
        if !self.pwm.is_ready() {
            return Err(SinkError::Fault("PWM device not ready".to_string()));
        }
        self.started = true;
        tracing::debug!("Tone output started, period {} ns", self.period_ns);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        self.started = false;
        if !self.pwm.is_ready() {
            return Ok(());
        }
        self.pwm.set_pulse(self.period_ns, 0)
    }

    fn write(&mut self, frame: &[u8]) -> Result<usize, SinkError> {
        if !self.pwm.is_ready() {
            return Err(SinkError::Fault("PWM device not ready".to_string()));
        }

        let mut written = 0;
        for bytes in frame.chunks_exact(2) {
            let sample = u16::from_le_bytes([bytes[0], bytes[1]]);
            self.pwm
                .set_pulse(self.period_ns, self.pulse_for(sample))
                .map_err(|e| match e {
                    SinkError::Fault(msg) => SinkError::Fault(msg),
                    other => SinkError::Rejected(other.to_string()),
                })?;
            written += 2;
        }
        Ok(written)
    }

    fn free_space(&self) -> usize {
        // A single duty register
        2
    }

    fn cleanup(&mut self) {
        if self.started {
            if let Err(e) = self.stop() {
                tracing::warn!("Tone stop failed during cleanup: {}", e);
            }
        }
        tracing::debug!("Tone output cleaned up");
    }
}
