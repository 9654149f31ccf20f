use thiserror::Error;

use crate::output::SinkError;
use crate::streaming::WavError;

/// Errors surfaced by the playback pipeline
///
/// Buffer and pool size mismatches are never reported here: they show up as
/// short writes, short reads, or a missing pool handle.
#[derive(Debug, Error)]
pub enum AudioError {
    // ===== Caller Errors =====
    /// Malformed or missing caller input
    #[error("invalid argument: {name} - {message}")]
    InvalidArgument {
        /// The name of the argument
        name: &'static str,
        /// Description of the problem
        message: String,
    },

    /// Operation is not allowed in the current state
    #[error("invalid state: {message} (current state: {current_state})")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },

    /// Component used before it was initialized
    #[error("{component} not initialized")]
    NotInitialized {
        /// Name of the component
        component: &'static str,
    },

    /// Component initialized twice without cleanup
    #[error("{component} already initialized")]
    AlreadyInitialized {
        /// Name of the component
        component: &'static str,
    },

    /// Requested output kind has no registered backend
    #[error("unsupported: {feature}")]
    Unsupported {
        /// What is unsupported
        feature: String,
    },

    // ===== Stream Errors =====
    /// Not enough container bytes yet; retry with more data
    #[error("insufficient data: need {needed} bytes, have {available}")]
    InsufficientData {
        /// Minimum number of bytes required
        needed: usize,
        /// Bytes currently available
        available: usize,
    },

    /// Container is invalid or uses an unsupported encoding
    #[error("format error: {0}")]
    Format(#[source] WavError),

    /// Container header was not located within the accumulation limit
    #[error("header not found within the first {limit} bytes")]
    HeaderTooFragmented {
        /// The accumulation limit in bytes
        limit: usize,
    },

    /// Upstream byte source failed
    #[error("upstream error: {message}")]
    Upstream {
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Backend Errors =====
    /// No capacity within the allotted time
    #[error("resource exhausted: {resource}")]
    ResourceExhausted {
        /// The exhausted resource
        resource: &'static str,
    },

    /// Recoverable sink failure
    #[error("sink error: {0}")]
    Sink(#[source] SinkError),

    /// Fatal output backend failure; requires cleanup and re-init
    #[error("backend fault: {message}")]
    BackendFault {
        /// Description of the fault
        message: String,
    },
}

impl AudioError {
    /// Shorthand for [`AudioError::InvalidArgument`]
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Check if the operation can succeed when retried with more data or time
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::ResourceExhausted { .. } | Self::Sink(_)
        )
    }

    /// Check if the error ends the current stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Format(_)
                | Self::HeaderTooFragmented { .. }
                | Self::BackendFault { .. }
                | Self::Upstream { .. }
        )
    }
}

impl From<WavError> for AudioError {
    fn from(err: WavError) -> Self {
        match err {
            WavError::InsufficientData { needed, available } => {
                Self::InsufficientData { needed, available }
            }
            WavError::NotInitialized => Self::NotInitialized {
                component: "wav decoder",
            },
            WavError::SeekOutOfRange { .. } => Self::InvalidArgument {
                name: "offset",
                message: err.to_string(),
            },
            WavError::HeaderTooFragmented { limit } => Self::HeaderTooFragmented { limit },
            other => Self::Format(other),
        }
    }
}

impl From<SinkError> for AudioError {
    fn from(err: SinkError) -> Self {
        if err.is_fatal() {
            Self::BackendFault {
                message: err.to_string(),
            }
        } else {
            Self::Sink(err)
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AudioError>;
