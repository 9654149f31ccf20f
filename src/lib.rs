//! # rewind-audio
//!
//! Streaming PCM playback for small devices.
//!
//! ## Features
//!
//! - Bounded ring buffer with blocking, timed and non-blocking access
//! - Fixed-size buffer pool for staging network chunks
//! - Incremental WAV decoding over complete images or chunked streams
//! - Real-time consumer paced by the sample clock
//! - Pluggable outputs: PWM tone generator and wireless notifications
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rewind_audio::output::{PwmChannel, SinkError};
//! use rewind_audio::{OutputKind, PlaybackSession, SessionConfig, SinkRegistry};
//!
//! struct Pin;
//!
//! impl PwmChannel for Pin {
//!     fn is_ready(&self) -> bool {
//!         true
//!     }
//!
//!     fn set_pulse(&self, _period_ns: u32, _pulse_ns: u32) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//! }
//!
//! # fn example() -> Result<(), rewind_audio::AudioError> {
//! let session = PlaybackSession::new(SinkRegistry::new().with_tone(Arc::new(Pin)));
//! session.init(SessionConfig::builder().output(OutputKind::Tone).build())?;
//! session.start()?;
//!
//! // Producer side
//! let pcm = vec![0u8; 512];
//! let accepted = session.write(&pcm)?;
//! # let _ = accepted;
//!
//! session.cleanup();
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Producers**: [`streaming::StreamFeeder`] (async, chunked WAV) and
//!   [`streaming::pump_source`] (blocking, any [`streaming::AudioSource`])
//! - **Session**: [`PlaybackSession`] owns the ring, the state machine and
//!   the consumer thread
//! - **Outputs**: [`output::AudioSink`] implementations chosen through a
//!   [`SinkRegistry`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// State management
pub mod state;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod audio;
pub mod output;
pub mod player;
/// Streaming support
pub mod streaming;

// Re-exports
pub use audio::{AudioFormat, BoundedByteBuffer, BufferPool};
pub use error::{AudioError, Result};
pub use output::{AudioSink, OutputKind, SinkError, SinkRegistry};
pub use player::{ControlCommand, PlaybackSession};
pub use state::SessionEvent;
pub use streaming::{StreamFeeder, WavDecoder, WavError};
pub use types::{PlaybackState, SessionConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        AudioError, AudioFormat, ControlCommand, OutputKind, PlaybackSession, PlaybackState,
        SessionConfig, SessionEvent, SinkRegistry, StreamFeeder, WavDecoder,
    };
}
