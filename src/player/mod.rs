//! Playback session, consumer loop and remote control

mod consumer;
mod control;
mod session;

#[cfg(test)]
mod tests;

pub use consumer::{ConsumerStats, ProducerStats};
pub use control::ControlCommand;
pub use session::PlaybackSession;
