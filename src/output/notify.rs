//! Wireless notification sink
//!
//! Frames are queued and sent in small notifications at a limited rate, the
//! way a GATT characteristic has to be fed. When no peer is subscribed the
//! queue is discarded instead of filling up.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{AudioSink, OutputKind, SinkError};
use crate::audio::{AudioFormat, SampleRange};

/// Link that carries notifications to one peer
pub trait NotifyTransport: Send + Sync {
    /// Whether a peer is connected
    fn is_connected(&self) -> bool;

    /// Whether the peer enabled notifications
    fn is_subscribed(&self) -> bool;

    /// Send one notification
    ///
    /// # Errors
    ///
    /// `Busy` when the stack is out of buffers, `NotConnected` when the link
    /// dropped.
    fn notify(&self, payload: &[u8]) -> Result<(), SinkError>;
}

/// Notification pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Largest payload per notification (ATT minimum MTU minus header)
    pub max_chunk: usize,
    /// Minimum spacing between notifications
    pub min_interval: Duration,
    /// Bytes held while waiting for the next send slot
    pub queue_limit: usize,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            max_chunk: 20,
            min_interval: Duration::from_millis(50),
            queue_limit: 2048,
        }
    }
}

/// Stream description published to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    /// Frames per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Bytes per frame
    pub frame_size: u16,
}

impl AudioInfo {
    /// Encoded length
    pub const LEN: usize = 10;

    /// Packed little-endian layout
    #[must_use]
    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.sample_rate);
        LittleEndian::write_u16(&mut buf[4..6], self.channels);
        LittleEndian::write_u16(&mut buf[6..8], self.bits_per_sample);
        LittleEndian::write_u16(&mut buf[8..10], self.frame_size);
        buf
    }

    /// Parse the packed layout
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LEN {
            return None;
        }
        Some(Self {
            sample_rate: LittleEndian::read_u32(&bytes[0..4]),
            channels: LittleEndian::read_u16(&bytes[4..6]),
            bits_per_sample: LittleEndian::read_u16(&bytes[6..8]),
            frame_size: LittleEndian::read_u16(&bytes[8..10]),
        })
    }
}

impl From<AudioFormat> for AudioInfo {
    #[allow(clippy::cast_possible_truncation)]
    fn from(format: AudioFormat) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            frame_size: format.bytes_per_frame() as u16,
        }
    }
}

/// Sends frames as rate-limited notifications
pub struct NotifySink {
    transport: Arc<dyn NotifyTransport>,
    settings: NotifySettings,
    format: AudioFormat,
    pending: VecDeque<u8>,
    last_sent: Option<Instant>,
    volume: u8,
    sent_bytes: u64,
}

impl NotifySink {
    /// Create a sink for a stream in `format`
    #[must_use]
    pub fn new(transport: Arc<dyn NotifyTransport>, format: AudioFormat, settings: NotifySettings) -> Self {
        Self {
            transport,
            pending: VecDeque::with_capacity(settings.queue_limit),
            settings,
            format,
            last_sent: None,
            volume: 100,
            sent_bytes: 0,
        }
    }

    /// Stream description for the peer
    #[must_use]
    pub fn audio_info(&self) -> AudioInfo {
        AudioInfo::from(self.format)
    }

    /// Last volume reported by the session
    #[must_use]
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Bytes waiting for a send slot
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Bytes delivered so far
    #[must_use]
    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    fn check_link(&self) -> Result<(), SinkError> {
        if !self.transport.is_connected() || !self.transport.is_subscribed() {
            return Err(SinkError::NotConnected);
        }
        Ok(())
    }

    fn rate_limited(&self, now: Instant) -> bool {
        self.last_sent
            .is_some_and(|last| now.duration_since(last) < self.settings.min_interval)
    }

    /// Send up to one chunk of `payload` immediately, bypassing the queue
    ///
    /// Returns the bytes sent, at most `max_chunk`.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a subscribed peer, `Busy` inside the minimum
    /// interval, `Rejected` for an empty payload.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, SinkError> {
        self.check_link()?;
        if payload.is_empty() {
            return Err(SinkError::Rejected("empty payload".to_string()));
        }

        let now = Instant::now();
        if self.rate_limited(now) {
            return Err(SinkError::Busy);
        }

        let len = payload.len().min(self.settings.max_chunk);
        self.transport.notify(&payload[..len])?;
        self.last_sent = Some(now);
        self.sent_bytes += len as u64;
        tracing::trace!("Sent {} byte notification", len);
        Ok(len)
    }

    /// Send the next queued chunk if a slot is free; returns bytes sent
    ///
    /// # Errors
    ///
    /// Transport failures other than rate limiting.
    pub fn flush(&mut self) -> Result<usize, SinkError> {
        if self.pending.is_empty() || self.rate_limited(Instant::now()) {
            return Ok(0);
        }

        let len = self.pending.len().min(self.settings.max_chunk);
        let chunk: Vec<u8> = self.pending.iter().take(len).copied().collect();
        match self.send(&chunk) {
            Ok(sent) => {
                self.pending.drain(..sent);
                Ok(sent)
            }
            Err(SinkError::Busy) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl AudioSink for NotifySink {
    fn kind(&self) -> OutputKind {
        OutputKind::Notify
    }

    fn sample_range(&self) -> SampleRange {
        SampleRange::Signed
    }

    fn wants_smoothing(&self) -> bool {
        false
    }

    fn is_ready(&self) -> bool {
        self.transport.is_connected() && self.transport.is_subscribed()
    }

    fn start(&mut self) -> Result<(), SinkError> {
        tracing::debug!("Notify output started: {}", self.format);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        self.pending.clear();
        Ok(())
    }

    fn write(&mut self, frame: &[u8]) -> Result<usize, SinkError> {
        if !self.transport.is_connected() {
            return Err(SinkError::NotConnected);
        }
        if !self.transport.is_subscribed() {
            // Nobody listening
            self.pending.clear();
            return Ok(frame.len());
        }

        if self.pending.len() + frame.len() > self.settings.queue_limit {
            // Try to make room before refusing
            self.flush()?;
            if self.pending.len() + frame.len() > self.settings.queue_limit {
                return Err(SinkError::Busy);
            }
        }

        self.pending.extend(frame.iter().copied());
        if self.pending.len() >= self.settings.max_chunk {
            self.flush()?;
        }
        Ok(frame.len())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), SinkError> {
        self.volume = volume;
        Ok(())
    }

    fn free_space(&self) -> usize {
        self.settings.queue_limit.saturating_sub(self.pending.len())
    }

    fn cleanup(&mut self) {
        self.pending.clear();
        self.last_sent = None;
        tracing::debug!("Notify output cleaned up after {} bytes", self.sent_bytes);
    }
}
