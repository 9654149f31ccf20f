//! RIFF/WAVE container parsing over complete or partial byte slices

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use thiserror::Error;

use crate::audio::AudioFormat;

/// Smallest byte count that can hold a canonical WAV header
pub const MIN_HEADER_LEN: usize = 44;

/// `WAVE_FORMAT_PCM`
pub const FORMAT_TAG_PCM: u16 = 1;

/// Default limit for header accumulation in streaming mode
pub const DEFAULT_MAX_HEADER_BYTES: usize = 4096;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_MIN_LEN: u32 = 16;

/// Container-level decode errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    /// Not enough bytes to finish parsing; retry with more
    #[error("need {needed} bytes, have {available}")]
    InsufficientData {
        /// Bytes required to make progress
        needed: usize,
        /// Bytes supplied
        available: usize,
    },

    /// `RIFF` or `WAVE` marker missing
    #[error("expected {expected:?} marker, found {found:?}")]
    BadMarker {
        /// Marker that should be present
        expected: &'static str,
        /// Bytes found in its place
        found: [u8; 4],
    },

    /// `fmt ` sub-chunk shorter than the 16 bytes of a PCM description
    #[error("fmt chunk is {0} bytes, need at least 16")]
    FmtTooShort(u32),

    /// Encoding other than linear PCM
    #[error("unsupported format tag {0}, only PCM (1) is supported")]
    UnsupportedFormatTag(u16),

    /// Channel count outside 1..=2
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(u16),

    /// Bit depth other than 8 or 16
    #[error("unsupported bit depth {0}")]
    UnsupportedBitDepth(u16),

    /// Sample rate of zero
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    /// `data` sub-chunk seen before any `fmt ` sub-chunk
    #[error("data chunk precedes fmt chunk")]
    MissingFmtChunk,

    /// Chunk walk ended without a `data` sub-chunk
    #[error("no data chunk found")]
    DataChunkNotFound,

    /// Decoder used before a successful init
    #[error("decoder not initialized")]
    NotInitialized,

    /// Seek target past the end of the audio region
    #[error("offset {offset} beyond audio region of {len} bytes")]
    SeekOutOfRange {
        /// Requested offset
        offset: usize,
        /// Audio region length
        len: usize,
    },

    /// Complete image ends inside a sub-chunk
    #[error("image truncated: chunk needs {needed} bytes, image has {available}")]
    Truncated {
        /// Bytes the cut-off chunk requires
        needed: usize,
        /// Image length
        available: usize,
    },

    /// Streaming header not located within the accumulation limit
    #[error("header not found within {limit} bytes")]
    HeaderTooFragmented {
        /// Accumulation limit
        limit: usize,
    },
}

impl WavError {
    /// Check if more input could let parsing succeed
    #[must_use]
    pub fn needs_more_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. } | Self::DataChunkNotFound)
    }
}

/// Contents of the `fmt ` sub-chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// Encoding tag, 1 for PCM
    pub format_tag: u16,
    /// Interleaved channel count
    pub channels: u16,
    /// Frames per second
    pub sample_rate: u32,
    /// Average byte rate
    pub bytes_per_sec: u32,
    /// Bytes per frame as declared
    pub block_align: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl WavFormat {
    fn parse(body: &[u8]) -> Self {
        Self {
            format_tag: LittleEndian::read_u16(&body[0..2]),
            channels: LittleEndian::read_u16(&body[2..4]),
            sample_rate: LittleEndian::read_u32(&body[4..8]),
            bytes_per_sec: LittleEndian::read_u32(&body[8..12]),
            block_align: LittleEndian::read_u16(&body[12..14]),
            bits_per_sample: LittleEndian::read_u16(&body[14..16]),
        }
    }

    /// Check that the stream is playable linear PCM
    ///
    /// # Errors
    ///
    /// Returns the first unsupported property found.
    pub fn validate(&self) -> Result<(), WavError> {
        if self.format_tag != FORMAT_TAG_PCM {
            return Err(WavError::UnsupportedFormatTag(self.format_tag));
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(WavError::UnsupportedChannels(self.channels));
        }
        if !matches!(self.bits_per_sample, 8 | 16) {
            return Err(WavError::UnsupportedBitDepth(self.bits_per_sample));
        }
        if self.sample_rate == 0 {
            return Err(WavError::ZeroSampleRate);
        }
        Ok(())
    }

    /// Bytes per frame computed from channels and bit depth
    #[must_use]
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }
}

impl From<&WavFormat> for AudioFormat {
    fn from(format: &WavFormat) -> Self {
        AudioFormat::new(format.sample_rate, format.channels, format.bits_per_sample)
    }
}

impl From<WavFormat> for AudioFormat {
    fn from(format: WavFormat) -> Self {
        Self::from(&format)
    }
}

/// Result of a successful chunk walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Validated stream format
    pub format: WavFormat,
    /// Offset of the first audio byte
    pub data_offset: usize,
    /// Audio bytes present in the parsed slice
    pub data_len: usize,
    /// Length the `data` sub-chunk declares, which may exceed what is present
    pub declared_data_len: u32,
}

impl WavHeader {
    /// Walk the container at the start of `bytes`
    ///
    /// The `data` length is clamped to the bytes actually present so
    /// `data_offset + data_len <= bytes.len()` always holds.
    ///
    /// # Errors
    ///
    /// `InsufficientData` below the 44-byte minimum or when a `fmt ` body is
    /// cut off, `DataChunkNotFound` when the walk runs out of bytes, and a
    /// format error for bad markers or an unsupported encoding.
    pub fn parse(bytes: &[u8]) -> Result<Self, WavError> {
        let len = bytes.len();
        if len < MIN_HEADER_LEN {
            return Err(WavError::InsufficientData {
                needed: MIN_HEADER_LEN,
                available: len,
            });
        }

        check_marker(&bytes[0..4], "RIFF")?;
        check_marker(&bytes[8..12], "WAVE")?;

        let mut format = None;
        let mut pos = RIFF_HEADER_LEN;

        while len - pos >= CHUNK_HEADER_LEN {
            let id = &bytes[pos..pos + 4];
            let size = LittleEndian::read_u32(&bytes[pos + 4..pos + 8]);
            let body = pos + CHUNK_HEADER_LEN;

            match id {
                b"fmt " => {
                    if size < FMT_MIN_LEN {
                        return Err(WavError::FmtTooShort(size));
                    }
                    let end = body + FMT_MIN_LEN as usize;
                    if end > len {
                        return Err(WavError::InsufficientData {
                            needed: end,
                            available: len,
                        });
                    }
                    let parsed = WavFormat::parse(&bytes[body..end]);
                    tracing::debug!(
                        "WAV fmt: tag={} channels={} rate={} bits={}",
                        parsed.format_tag,
                        parsed.channels,
                        parsed.sample_rate,
                        parsed.bits_per_sample
                    );
                    format = Some(parsed);
                }
                b"data" => {
                    let format = format.ok_or(WavError::MissingFmtChunk)?;
                    format.validate()?;

                    let data_len = (size as usize).min(len - body);
                    tracing::debug!(
                        "WAV data: offset={} present={} declared={}",
                        body,
                        data_len,
                        size
                    );
                    return Ok(Self {
                        format,
                        data_offset: body,
                        data_len,
                        declared_data_len: size,
                    });
                }
                other => {
                    tracing::trace!("Skipping WAV chunk {:?} ({} bytes)", other, size);
                }
            }

            // Odd-sized chunks carry one pad byte
            let padded = u64::from(size) + u64::from(size & 1);
            match usize::try_from(padded)
                .ok()
                .and_then(|p| body.checked_add(p))
            {
                Some(next) if next <= len => pos = next,
                _ => break,
            }
        }

        Err(WavError::DataChunkNotFound)
    }
}

fn check_marker(found: &[u8], expected: &'static str) -> Result<(), WavError> {
    if found == expected.as_bytes() {
        return Ok(());
    }
    let mut marker = [0u8; 4];
    marker.copy_from_slice(found);
    Err(WavError::BadMarker {
        expected,
        found: marker,
    })
}

/// Seekable reader over the audio region of a complete WAV image
#[derive(Debug, Default)]
pub struct WavDecoder {
    source: Bytes,
    header: Option<WavHeader>,
    /// Offset into the audio region
    cursor: usize,
}

impl WavDecoder {
    /// Create an uninitialized decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize in one step
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    pub fn open(source: impl Into<Bytes>) -> Result<Self, WavError> {
        let mut decoder = Self::new();
        decoder.init(source)?;
        Ok(decoder)
    }

    /// Parse the header of `source` and position at the first audio byte
    ///
    /// Any previous stream is discarded, even when parsing fails.
    ///
    /// # Errors
    ///
    /// See [`WavHeader::parse`]. Only an image below the 44-byte minimum
    /// reports `InsufficientData`; a longer image cut off inside a chunk is
    /// `Truncated` and a missing `data` sub-chunk is `DataChunkNotFound`.
    pub fn init(&mut self, source: impl Into<Bytes>) -> Result<(), WavError> {
        self.cleanup();
        let source = source.into();
        let header = WavHeader::parse(&source).map_err(|err| match err {
            WavError::InsufficientData { needed, available } if available >= MIN_HEADER_LEN => {
                WavError::Truncated { needed, available }
            }
            other => other,
        })?;

        tracing::info!(
            "WAV decoder initialized: {} Hz, {} ch, {}-bit, {} audio bytes",
            header.format.sample_rate,
            header.format.channels,
            header.format.bits_per_sample,
            header.data_len
        );

        self.source = source;
        self.header = Some(header);
        Ok(())
    }

    /// Check if a header has been parsed
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.header.is_some()
    }

    /// Parsed header
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before a successful init.
    pub fn header(&self) -> Result<&WavHeader, WavError> {
        self.header.as_ref().ok_or(WavError::NotInitialized)
    }

    /// Stream format
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before a successful init.
    pub fn format(&self) -> Result<WavFormat, WavError> {
        self.header().map(|h| h.format)
    }

    /// The audio region
    #[must_use]
    pub fn audio(&self) -> &[u8] {
        match &self.header {
            Some(h) => &self.source[h.data_offset..h.data_offset + h.data_len],
            None => &[],
        }
    }

    /// Copy audio bytes from the cursor; 0 at end of region or before init
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let remaining = &self.audio()[self.cursor.min(self.total_audio_bytes())..];
        let n = out.len().min(remaining.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        n
    }

    /// Move the cursor to `offset` bytes into the audio region
    ///
    /// # Errors
    ///
    /// `NotInitialized` before init, `SeekOutOfRange` past the region end.
    pub fn seek(&mut self, offset: usize) -> Result<(), WavError> {
        let len = self.header()?.data_len;
        if offset > len {
            return Err(WavError::SeekOutOfRange { offset, len });
        }
        self.cursor = offset;
        Ok(())
    }

    /// Cursor position within the audio region
    #[must_use]
    pub fn tell(&self) -> usize {
        self.cursor
    }

    /// Check if the cursor reached the end of the region; true before init
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.cursor >= self.total_audio_bytes()
    }

    /// Length of the audio region
    #[must_use]
    pub fn total_audio_bytes(&self) -> usize {
        self.header.map_or(0, |h| h.data_len)
    }

    /// Length the `data` sub-chunk declared
    #[must_use]
    pub fn declared_audio_bytes(&self) -> usize {
        self.header.map_or(0, |h| h.declared_data_len as usize)
    }

    /// Whole frames in the audio region
    #[must_use]
    pub fn total_sample_frames(&self) -> usize {
        match &self.header {
            Some(h) => h.data_len / h.format.bytes_per_frame().max(1),
            None => 0,
        }
    }

    /// Playback length in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        match &self.header {
            Some(h) if h.format.sample_rate > 0 => {
                self.total_sample_frames() as u64 * 1000 / u64::from(h.format.sample_rate)
            }
            _ => 0,
        }
    }

    /// Forget the stream; the decoder can be initialized again
    pub fn cleanup(&mut self) {
        if self.header.take().is_some() {
            tracing::debug!("WAV decoder cleaned up");
        }
        self.source = Bytes::new();
        self.cursor = 0;
    }
}

/// Incremental header detection over a chunked byte stream
///
/// The first call(s) locate the header; once found, every later chunk is
/// passed through unchanged as audio payload. The caller keeps the
/// accumulated bytes and re-feeds them until the header is found. The
/// declared `data` length is not applied, so streams of unknown length
/// that declare 0 still play.
#[derive(Debug, Clone)]
pub struct WavStream {
    header: Option<WavHeader>,
    max_header_bytes: usize,
}

impl Default for WavStream {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES)
    }
}

impl WavStream {
    /// Create a stream that gives up on the header after `max_header_bytes`
    #[must_use]
    pub fn new(max_header_bytes: usize) -> Self {
        Self {
            header: None,
            max_header_bytes: max_header_bytes.max(MIN_HEADER_LEN),
        }
    }

    /// Accumulation limit
    #[must_use]
    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    /// Check if the header has been located
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.header.is_some()
    }

    /// Header found by the first successful feed
    #[must_use]
    pub fn header(&self) -> Option<&WavHeader> {
        self.header.as_ref()
    }

    /// Stream format, once known
    #[must_use]
    pub fn format(&self) -> Option<WavFormat> {
        self.header.map(|h| h.format)
    }

    /// Extract the audio payload from `chunk`
    ///
    /// Before the header is found, `chunk` must hold everything received so
    /// far; an empty slice means more bytes are needed. Afterwards `chunk` is
    /// just the next piece of the stream.
    ///
    /// # Errors
    ///
    /// `HeaderTooFragmented` once `chunk` reaches the accumulation limit
    /// without a header, or a format error for an invalid header.
    pub fn feed_chunk<'c>(&mut self, chunk: &'c [u8]) -> Result<&'c [u8], WavError> {
        if self.header.is_some() {
            return Ok(chunk);
        }

        match WavHeader::parse(chunk) {
            Ok(header) => {
                self.header = Some(header);
                tracing::info!(
                    "WAV stream header found: {} Hz, {} ch, {}-bit, audio at {}",
                    header.format.sample_rate,
                    header.format.channels,
                    header.format.bits_per_sample,
                    header.data_offset
                );
                Ok(&chunk[header.data_offset..])
            }
            Err(err) if err.needs_more_data() => {
                if chunk.len() >= self.max_header_bytes {
                    tracing::warn!(
                        "WAV header not found in {} bytes (limit {})",
                        chunk.len(),
                        self.max_header_bytes
                    );
                    return Err(WavError::HeaderTooFragmented {
                        limit: self.max_header_bytes,
                    });
                }
                tracing::debug!("WAV header incomplete at {} bytes, need more data", chunk.len());
                Ok(&[])
            }
            Err(err) => Err(err),
        }
    }

    /// Forget the header so a new stream can start
    pub fn reset(&mut self) {
        self.header = None;
    }
}
