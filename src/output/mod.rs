//! Output sinks and the capability interface shared by all backends
//!
//! A sink receives one transformed frame at a time from the playback
//! consumer. Which sink a session drives is chosen at init through a
//! [`SinkRegistry`] keyed by [`OutputKind`].

mod notify;
mod tone;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioFormat, SampleRange};
use crate::error::{AudioError, Result};

pub use notify::{AudioInfo, NotifySettings, NotifySink, NotifyTransport};
pub use tone::{DEFAULT_PWM_PERIOD_NS, PwmChannel, ToneSink};

/// Errors reported by a sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Peer link is down
    #[error("not connected")]
    NotConnected,

    /// Sink cannot take more data right now; retry later
    #[error("sink busy")]
    Busy,

    /// A single write was refused; later writes may succeed
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Device is unusable until re-initialized
    #[error("sink fault: {0}")]
    Fault(String),
}

impl SinkError {
    /// Check if the sink must be torn down
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

/// Available output backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// PWM tone generator
    Tone,
    /// Wireless GATT notifications
    Notify,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tone => write!(f, "tone"),
            Self::Notify => write!(f, "notify"),
        }
    }
}

/// Capability interface every output backend implements
pub trait AudioSink: Send {
    /// Backend identity
    fn kind(&self) -> OutputKind;

    /// Range the sink expects samples in
    fn sample_range(&self) -> SampleRange;

    /// Whether the consumer should low-pass samples for this sink
    fn wants_smoothing(&self) -> bool;

    /// Whether a frame written now would be delivered
    ///
    /// The consumer skips frames while this is false.
    fn is_ready(&self) -> bool {
        true
    }

    /// Begin accepting frames
    ///
    /// # Errors
    ///
    /// Returns `Fault` if the device cannot be used.
    fn start(&mut self) -> std::result::Result<(), SinkError>;

    /// Silence the output
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the request.
    fn stop(&mut self) -> std::result::Result<(), SinkError>;

    /// Deliver one transformed frame; returns bytes accepted
    ///
    /// # Errors
    ///
    /// Non-fatal errors drop the frame, `Fault` stops playback.
    fn write(&mut self, frame: &[u8]) -> std::result::Result<usize, SinkError>;

    /// Volume change notification, 0..=100
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the request.
    fn set_volume(&mut self, _volume: u8) -> std::result::Result<(), SinkError> {
        Ok(())
    }

    /// Bytes the sink can take without blocking
    fn free_space(&self) -> usize;

    /// Release the device
    fn cleanup(&mut self);
}

/// Builds a sink for a stream format
pub type SinkFactory =
    Arc<dyn Fn(AudioFormat) -> std::result::Result<Box<dyn AudioSink>, SinkError> + Send + Sync>;

/// Output backends available to a session
#[derive(Clone, Default)]
pub struct SinkRegistry {
    factories: HashMap<OutputKind, SinkFactory>,
}

impl SinkRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`, replacing any previous one
    #[must_use]
    pub fn register<F>(mut self, kind: OutputKind, factory: F) -> Self
    where
        F: Fn(AudioFormat) -> std::result::Result<Box<dyn AudioSink>, SinkError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
        self
    }

    /// Register a PWM tone generator
    #[must_use]
    pub fn with_tone(self, pwm: Arc<dyn PwmChannel>) -> Self {
        self.register(OutputKind::Tone, move |_format| {
            Ok(Box::new(ToneSink::new(Arc::clone(&pwm))) as Box<dyn AudioSink>)
        })
    }

    /// Register a notification transport
    #[must_use]
    pub fn with_notify(self, transport: Arc<dyn NotifyTransport>, settings: NotifySettings) -> Self {
        self.register(OutputKind::Notify, move |format| {
            Ok(Box::new(NotifySink::new(Arc::clone(&transport), format, settings.clone()))
                as Box<dyn AudioSink>)
        })
    }

    /// Check if `kind` has a backend
    #[must_use]
    pub fn supports(&self, kind: OutputKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build the sink for `kind`
    ///
    /// # Errors
    ///
    /// `Unsupported` if nothing is registered for `kind`, `BackendFault` if
    /// the factory fails.
    pub fn build(&self, kind: OutputKind, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        let factory = self.factories.get(&kind).ok_or_else(|| AudioError::Unsupported {
            feature: format!("{kind} output"),
        })?;

        (**factory)(format).map_err(|e| AudioError::BackendFault {
            message: format!("{kind} output init failed: {e}"),
        })
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
