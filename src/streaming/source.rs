//! Pull-based PCM sources

use std::io;
use std::time::Duration;

use bytes::Bytes;

use super::wav::WavDecoder;
use crate::audio::AudioFormat;

/// Producer of raw PCM bytes in a fixed format
pub trait AudioSource: Send {
    /// Format of the bytes returned by [`read`](Self::read)
    fn format(&self) -> AudioFormat;

    /// Read PCM bytes into buffer
    ///
    /// Returns the number of bytes read, or 0 at end of stream
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source fails
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    /// Total duration if known
    fn duration(&self) -> Option<Duration> {
        None
    }

    /// Current position
    fn position(&self) -> Duration {
        Duration::ZERO
    }

    /// Seek to position (if supported)
    ///
    /// # Errors
    ///
    /// Returns an error if seeking is unsupported or out of range
    fn seek(&mut self, _position: Duration) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "seek not supported"))
    }

    /// Check if source is seekable
    fn is_seekable(&self) -> bool {
        false
    }
}

/// Raw PCM held in memory
pub struct SliceSource {
    data: Bytes,
    position: usize,
    format: AudioFormat,
}

impl SliceSource {
    /// Create from raw PCM data
    #[must_use]
    pub fn new(data: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self {
            data: data.into(),
            position: 0,
            format,
        }
    }

    /// Create from 16-bit samples
    #[must_use]
    pub fn from_i16(samples: &[i16], format: AudioFormat) -> Self {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, format)
    }

    /// Bytes not yet read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl AudioSource for SliceSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let to_read = buffer.len().min(self.remaining());
        buffer[..to_read].copy_from_slice(&self.data[self.position..self.position + to_read]);
        self.position += to_read;
        Ok(to_read)
    }

    fn duration(&self) -> Option<Duration> {
        let frames = self.data.len() / self.format.bytes_per_frame().max(1);
        Some(self.format.frames_to_duration(frames as u64))
    }

    fn position(&self) -> Duration {
        let frames = self.position / self.format.bytes_per_frame().max(1);
        self.format.frames_to_duration(frames as u64)
    }

    fn seek(&mut self, position: Duration) -> io::Result<()> {
        let byte_pos = self.format.duration_to_bytes(position);
        if byte_pos > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek beyond end"));
        }
        self.position = byte_pos;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Endless silence in the given format
pub struct SilenceSource {
    format: AudioFormat,
}

impl SilenceSource {
    /// Create a new silence source
    #[must_use]
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

impl AudioSource for SilenceSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        // 8-bit PCM is offset binary
        let fill = if self.format.bits_per_sample == 8 { 0x80 } else { 0 };
        buffer.fill(fill);
        Ok(buffer.len())
    }
}

impl AudioSource for WavDecoder {
    fn format(&self) -> AudioFormat {
        self.format().map(AudioFormat::from).unwrap_or_default()
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        if !self.is_initialized() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "decoder not initialized"));
        }
        Ok(WavDecoder::read(self, buffer))
    }

    fn duration(&self) -> Option<Duration> {
        self.is_initialized()
            .then(|| Duration::from_millis(self.duration_ms()))
    }

    fn position(&self) -> Duration {
        let format = AudioSource::format(self);
        let frames = self.tell() / format.bytes_per_frame().max(1);
        format.frames_to_duration(frames as u64)
    }

    fn seek(&mut self, position: Duration) -> io::Result<()> {
        let offset = AudioSource::format(self).duration_to_bytes(position);
        WavDecoder::seek(self, offset)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    fn is_seekable(&self) -> bool {
        self.is_initialized()
    }
}
