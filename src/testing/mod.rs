//! Fixtures and mock backends for exercising sessions without hardware

pub mod mocks;


use byteorder::{ByteOrder, LittleEndian};

use crate::audio::AudioFormat;

pub use mocks::{MockNotifier, MockPwm, RecordedFrame, RecordingSink, SinkMonitor, recording_registry};

/// Canonical 44-byte header with a `data` sub-chunk declaring `data_len` bytes
#[must_use]
pub fn wav_header(format: AudioFormat, data_len: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(44);
    push_riff(&mut out, 36 + data_len);
    push_fmt(&mut out, format, 1);
    push_chunk_header(&mut out, b"data", data_len);
    out
}

/// Complete WAV image holding `audio`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn wav_bytes(format: AudioFormat, audio: &[u8]) -> Vec<u8> {
    let mut out = wav_header(format, audio.len() as u32);
    out.extend_from_slice(audio);
    out
}

/// WAV image with extra sub-chunks between `fmt ` and `data`
///
/// Odd-sized extra chunks get their pad byte.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn wav_with_chunks(format: AudioFormat, extra: &[(&[u8; 4], &[u8])], audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    push_fmt(&mut body, format, 1);
    for (id, payload) in extra {
        push_chunk_header(&mut body, id, payload.len() as u32);
        body.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            body.push(0);
        }
    }
    push_chunk_header(&mut body, b"data", audio.len() as u32);
    body.extend_from_slice(audio);

    let mut out = Vec::with_capacity(12 + body.len());
    push_riff(&mut out, 4 + body.len() as u32);
    out.extend_from_slice(&body);
    out
}

/// Header with an arbitrary format tag, for rejection tests
#[must_use]
pub fn wav_header_with_tag(format: AudioFormat, format_tag: u16, data_len: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(44);
    push_riff(&mut out, 36 + data_len);
    push_fmt(&mut out, format, format_tag);
    push_chunk_header(&mut out, b"data", data_len);
    out
}

/// 60-byte image: 44100 Hz 16-bit mono, 16 audio bytes `0..16`, `data`
/// declaring 2048
#[must_use]
pub fn fixture_60() -> Vec<u8> {
    let mut out = wav_header(AudioFormat::MONO_16, 2048);
    out.extend(0u8..16);
    out
}

/// Interleaved 16-bit little-endian ramp: frame `i` holds `i * step` on every channel
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn ramp_pcm16(frames: usize, channels: u16, step: i16) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * usize::from(channels) * 2);
    for i in 0..frames {
        let sample = (i as i16).wrapping_mul(step);
        for _ in 0..channels {
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
    out
}

fn push_riff(out: &mut Vec<u8>, riff_len: u32) {
    out.extend_from_slice(b"RIFF");
    push_u32(out, riff_len);
    out.extend_from_slice(b"WAVE");
}

fn push_fmt(out: &mut Vec<u8>, format: AudioFormat, format_tag: u16) {
    let block_align = format.channels * (format.bits_per_sample / 8);
    push_chunk_header(out, b"fmt ", 16);
    push_u16(out, format_tag);
    push_u16(out, format.channels);
    push_u32(out, format.sample_rate);
    push_u32(out, format.sample_rate * u32::from(block_align));
    push_u16(out, block_align);
    push_u16(out, format.bits_per_sample);
}

fn push_chunk_header(out: &mut Vec<u8>, id: &[u8; 4], len: u32) {
    out.extend_from_slice(id);
    push_u32(out, len);
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}
