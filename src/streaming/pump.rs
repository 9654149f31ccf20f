//! Blocking producer loop from an [`AudioSource`] into a session

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::source::AudioSource;
use crate::error::{AudioError, Result};
use crate::player::PlaybackSession;
use crate::types::PlaybackState;

/// Producer tuning for [`pump_source`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpSettings {
    /// Bytes read from the source per iteration
    pub chunk_size: usize,
    /// Back-off between rejected writes
    pub retry_delay: Duration,
    /// Consecutive rejected writes before the rest of a chunk is dropped
    pub max_retries: u32,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            retry_delay: Duration::from_millis(10),
            max_retries: 100,
        }
    }
}

impl PumpSettings {
    /// Settings with the given chunk size and back-off
    #[must_use]
    pub fn new(chunk_size: usize, retry_delay: Duration) -> Self {
        Self {
            chunk_size,
            retry_delay,
            ..Self::default()
        }
    }

    /// Set the retry limit
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Totals from [`pump_source`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Bytes read from the source
    pub bytes_read: usize,
    /// Bytes accepted by the session
    pub bytes_written: usize,
    /// Bytes given up on after retries ran out
    pub dropped_bytes: usize,
    /// Writes that had to be retried
    pub retries: usize,
    /// Chunks that lost data
    pub discontinuities: usize,
    /// Whether the source reached its end
    pub finished: bool,
}

/// Copy `source` into `session` in `settings.chunk_size` pieces
///
/// Rejected or short writes are retried after `retry_delay`. Once a chunk
/// has been refused `max_retries` times in a row its remainder is dropped
/// and counted. Stops early, with `finished == false`, as soon as the
/// session is neither playing nor paused.
///
/// # Errors
///
/// `Upstream` if the source fails, `InvalidArgument` for a zero chunk size,
/// and session write errors.
pub fn pump_source<S>(
    source: &mut S,
    session: &PlaybackSession,
    settings: &PumpSettings,
) -> Result<PumpReport>
where
    S: AudioSource + ?Sized,
{
    if settings.chunk_size == 0 {
        return Err(AudioError::invalid_argument("chunk_size", "must be non-zero"));
    }

    let mut report = PumpReport::default();
    let mut chunk = vec![0u8; settings.chunk_size];

    loop {
        let n = source.read(&mut chunk).map_err(|e| AudioError::Upstream {
            message: "audio source read failed".to_string(),
            source: Some(Box::new(e)),
        })?;
        if n == 0 {
            report.finished = true;
            tracing::debug!("Source drained: {} bytes", report.bytes_read);
            return Ok(report);
        }
        report.bytes_read += n;

        let mut offset = 0;
        let mut retries = 0;
        while offset < n {
            if !matches!(
                session.state(),
                PlaybackState::Playing | PlaybackState::Paused
            ) {
                tracing::debug!("Session closed, pump stopping");
                return Ok(report);
            }

            let written = session.write(&chunk[offset..n])?;
            if written > 0 {
                offset += written;
                report.bytes_written += written;
                retries = 0;
                continue;
            }

            retries += 1;
            report.retries += 1;
            if retries > settings.max_retries {
                let lost = n - offset;
                tracing::warn!("Giving up on {} bytes after {} retries", lost, retries - 1);
                report.dropped_bytes += lost;
                report.discontinuities += 1;
                break;
            }
            std::thread::sleep(settings.retry_delay);
        }
    }
}
