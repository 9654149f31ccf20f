//! Core types shared across the pipeline

mod config;
mod state;

#[cfg(test)]
mod tests;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use state::PlaybackState;
