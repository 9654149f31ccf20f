//! Async feeder from a chunked byte stream (an HTTP body) into a session

use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::wav::{DEFAULT_MAX_HEADER_BYTES, MIN_HEADER_LEN, WavError, WavFormat, WavStream};
use crate::audio::{AudioFormat, BufferFlags, BufferPool, PooledBuffer};
use crate::error::{AudioError, Result};
use crate::player::PlaybackSession;
use crate::types::{PlaybackState, SessionConfig};

/// Feeder tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederSettings {
    /// Give up on the container header after this many bytes
    pub max_header_bytes: usize,
    /// Back-off between rejected writes or failed pool acquisitions
    pub retry_delay: Duration,
    /// Consecutive rejected writes before a staged buffer is dropped
    pub max_retries: u32,
}

impl Default for FeederSettings {
    fn default() -> Self {
        Self {
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            retry_delay: Duration::from_millis(10),
            max_retries: 100,
        }
    }
}

impl From<&SessionConfig> for FeederSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_header_bytes: config.max_header_bytes,
            ..Self::default()
        }
    }
}

/// Totals from one [`StreamFeeder::feed`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// Chunks received from the stream
    pub chunks: usize,
    /// Bytes received, header included
    pub bytes_in: usize,
    /// Audio bytes accepted by the session
    pub audio_bytes: usize,
    /// Audio bytes given up on after retries ran out
    pub dropped_bytes: usize,
    /// Staged buffers that lost data
    pub discontinuities: usize,
    /// Container format, once the header was found
    pub format: Option<WavFormat>,
}

/// Why delivery ended early
enum Halt {
    /// Session is no longer playing or paused
    SessionClosed,
}

/// Drives a [`PlaybackSession`] from a stream of byte chunks
///
/// Accumulates chunks until the WAV header is located, then stages audio
/// payload through pool buffers and pushes it into the session without
/// blocking the runtime, backing off while the ring is over its threshold.
pub struct StreamFeeder {
    session: Arc<PlaybackSession>,
    pool: BufferPool,
    settings: FeederSettings,
}

impl StreamFeeder {
    /// Create a feeder staging through `pool`
    ///
    /// # Errors
    ///
    /// `NotInitialized` if `pool` has not been initialized.
    pub fn new(session: Arc<PlaybackSession>, pool: BufferPool, settings: FeederSettings) -> Result<Self> {
        if !pool.is_initialized() {
            return Err(AudioError::NotInitialized {
                component: "buffer pool",
            });
        }
        Ok(Self {
            session,
            pool,
            settings,
        })
    }

    /// Session being fed
    #[must_use]
    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    /// Consume `stream` until it ends or the session stops playing
    ///
    /// # Errors
    ///
    /// - `Upstream` if the stream yields an error
    /// - `HeaderTooFragmented`, `Format` or `InsufficientData` for a bad or
    ///   missing container header
    /// - `Unsupported` if the stream format differs from the session's
    /// - `ResourceExhausted` if no pool buffer frees up within the retries
    /// - session write errors
    pub async fn feed<S, E>(&self, stream: S) -> Result<FeedReport>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut stream = std::pin::pin!(stream);
        let mut wav = WavStream::new(self.settings.max_header_bytes);
        let mut pending = BytesMut::new();
        let mut report = FeedReport::default();

        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| AudioError::Upstream {
                message: "stream chunk failed".to_string(),
                source: Some(Box::new(e)),
            })?;
            report.chunks += 1;
            report.bytes_in += chunk.len();

            let payload = if wav.is_initialized() {
                chunk
            } else {
                pending.extend_from_slice(&chunk);
                match self.locate_header(&mut wav, &mut pending, &mut report)? {
                    Some(payload) => payload,
                    None => continue,
                }
            };

            if payload.is_empty() {
                continue;
            }
            if let Err(Halt::SessionClosed) = self.deliver(payload, &mut report).await? {
                tracing::info!("Session stopped playing, feeder done after {} chunks", report.chunks);
                return Ok(report);
            }
        }

        if !wav.is_initialized() {
            return Err(WavError::InsufficientData {
                needed: MIN_HEADER_LEN.max(pending.len() + 1),
                available: pending.len(),
            }
            .into());
        }

        tracing::info!(
            "Stream finished: {} chunks, {} audio bytes, {} dropped",
            report.chunks,
            report.audio_bytes,
            report.dropped_bytes
        );
        Ok(report)
    }

    /// Retry header detection on everything received so far
    fn locate_header(
        &self,
        wav: &mut WavStream,
        pending: &mut BytesMut,
        report: &mut FeedReport,
    ) -> Result<Option<Bytes>> {
        let extracted = wav.feed_chunk(pending)?.len();
        let Some(header) = wav.header().copied() else {
            return Ok(None);
        };

        let stream_format = AudioFormat::from(&header.format);
        let session_format = self.session.format().ok_or(AudioError::NotInitialized {
            component: "playback session",
        })?;
        if stream_format != session_format {
            return Err(AudioError::Unsupported {
                feature: format!("stream format {stream_format} on a {session_format} session"),
            });
        }
        report.format = Some(header.format);

        let accumulated = pending.split().freeze();
        Ok(Some(accumulated.slice(
            header.data_offset..header.data_offset + extracted,
        )))
    }

    /// Push `payload` into the session through pool buffers
    async fn deliver(
        &self,
        mut payload: Bytes,
        report: &mut FeedReport,
    ) -> Result<std::result::Result<(), Halt>> {
        while !payload.is_empty() {
            let mut staged = self.acquire_staging().await?;
            let n = staged.write(&payload);
            payload.advance(n);

            if let Err(halt) = self.push(&mut staged, report).await? {
                return Ok(Err(halt));
            }
            if staged.flags().contains(BufferFlags::DISCONTINUITY) {
                report.discontinuities += 1;
            }
        }
        Ok(Ok(()))
    }

    async fn acquire_staging(&self) -> Result<PooledBuffer> {
        for _ in 0..=self.settings.max_retries {
            if let Some(buffer) = self.pool.acquire(Duration::ZERO) {
                return Ok(buffer);
            }
            tokio::time::sleep(self.settings.retry_delay).await;
        }
        Err(AudioError::ResourceExhausted {
            resource: "buffer pool",
        })
    }

    /// Write one staged buffer, retrying rejected writes with back-off
    async fn push(
        &self,
        staged: &mut PooledBuffer,
        report: &mut FeedReport,
    ) -> Result<std::result::Result<(), Halt>> {
        let mut offset = 0;
        let mut retries = 0;

        while offset < staged.used() {
            if !matches!(
                self.session.state(),
                PlaybackState::Playing | PlaybackState::Paused
            ) {
                return Ok(Err(Halt::SessionClosed));
            }

            let written = self
                .session
                .write_timeout(&staged.data()[offset..], Duration::ZERO)?;
            if written > 0 {
                offset += written;
                report.audio_bytes += written;
                retries = 0;
                continue;
            }

            retries += 1;
            if retries > self.settings.max_retries {
                let lost = staged.used() - offset;
                tracing::warn!("Giving up on {} bytes after {} retries", lost, retries - 1);
                report.dropped_bytes += lost;
                staged.set_flags(staged.flags() | BufferFlags::DISCONTINUITY);
                break;
            }
            tokio::time::sleep(self.settings.retry_delay).await;
        }
        Ok(Ok(()))
    }
}

impl std::fmt::Debug for StreamFeeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFeeder")
            .field("session", &self.session)
            .field("pool", &self.pool)
            .field("settings", &self.settings)
            .finish()
    }
}
