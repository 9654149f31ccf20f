//! Per-sample transform between the ring and a sink

use super::format::AudioFormat;

/// Midpoint of the unsigned 16-bit range
pub const UNSIGNED_MIDPOINT: i32 = 32768;

/// Numeric range a sink expects its samples in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRange {
    /// Two's complement, centered on 0 (`i16` LE on the wire)
    Signed,
    /// Offset binary, centered on 32768 (`u16` LE on the wire)
    Unsigned,
}

impl SampleRange {
    /// Value of silence in this range
    #[must_use]
    pub fn midpoint(self) -> i32 {
        match self {
            Self::Signed => 0,
            Self::Unsigned => UNSIGNED_MIDPOINT,
        }
    }
}

/// Decode one little-endian sample into the signed 16-bit range
///
/// 8-bit PCM is unsigned offset binary and is shifted into the high byte.
/// Returns silence if `bytes` is shorter than one sample.
#[must_use]
pub fn decode_sample(bytes: &[u8], bits_per_sample: u16) -> i16 {
    match (bits_per_sample, bytes) {
        (16, [lo, hi, ..]) => i16::from_le_bytes([*lo, *hi]),
        (8, [b, ..]) => (i16::from(*b) - 128) << 8,
        _ => 0,
    }
}

/// Single-pole low-pass: `out = (in * w + prev * (10 - w)) / 10`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingFilter {
    weight: i32,
    initial: i32,
    previous: i32,
}

impl SmoothingFilter {
    /// Largest accepted weight; at this weight the filter passes input through
    pub const MAX_WEIGHT: u8 = 10;

    /// Create a filter whose memory starts at `initial`
    ///
    /// `weight` is clamped to [`MAX_WEIGHT`](Self::MAX_WEIGHT).
    #[must_use]
    pub fn new(weight: u8, initial: i32) -> Self {
        Self {
            weight: i32::from(weight.min(Self::MAX_WEIGHT)),
            initial,
            previous: initial,
        }
    }

    /// Filter one sample and remember the result
    pub fn apply(&mut self, input: i32) -> i32 {
        let weight = self.weight;
        let output = (input * weight + self.previous * (10 - weight)) / 10;
        self.previous = output;
        output
    }

    /// Last emitted sample
    #[must_use]
    pub fn previous(&self) -> i32 {
        self.previous
    }

    /// Restore the initial memory
    pub fn reset(&mut self) {
        self.previous = self.initial;
    }
}

/// Decode, volume, filter and re-encode one frame at a time
///
/// Unsigned output mixes all channels into one `u16` per frame, the layout a
/// single PWM channel consumes. Signed output keeps the channel count and
/// emits `i16` per channel.
#[derive(Debug, Clone)]
pub struct FrameTransform {
    format: AudioFormat,
    range: SampleRange,
    filters: Vec<SmoothingFilter>,
}

impl FrameTransform {
    /// Create a transform; `smoothing` is the filter weight, `None` disables it
    #[must_use]
    pub fn new(format: AudioFormat, range: SampleRange, smoothing: Option<u8>) -> Self {
        let lanes = match range {
            SampleRange::Unsigned => 1,
            SampleRange::Signed => usize::from(format.channels),
        };
        let filters = smoothing
            .map(|weight| vec![SmoothingFilter::new(weight, range.midpoint()); lanes])
            .unwrap_or_default();

        Self {
            format,
            range,
            filters,
        }
    }

    /// Input bytes consumed per call
    #[must_use]
    pub fn input_frame_bytes(&self) -> usize {
        self.format.bytes_per_frame()
    }

    /// Output bytes produced per call
    #[must_use]
    pub fn output_frame_bytes(&self) -> usize {
        match self.range {
            SampleRange::Unsigned => 2,
            SampleRange::Signed => 2 * usize::from(self.format.channels),
        }
    }

    /// Range this transform produces
    #[must_use]
    pub fn range(&self) -> SampleRange {
        self.range
    }

    /// Check if the smoothing filter is active
    #[must_use]
    pub fn is_smoothing(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Forget filter history
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    /// Transform one input frame and append the result to `out`
    ///
    /// `volume` is a percentage, values above 100 are treated as 100.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn process(&mut self, frame: &[u8], volume: u8, out: &mut Vec<u8>) {
        let volume = i32::from(volume.min(100));
        let width = self.format.bytes_per_sample();
        let samples = frame
            .chunks_exact(width)
            .take(usize::from(self.format.channels))
            .map(|bytes| i32::from(decode_sample(bytes, self.format.bits_per_sample)));

        match self.range {
            SampleRange::Unsigned => {
                let (sum, n) = samples.fold((0i32, 0i32), |(sum, n), s| (sum + s, n + 1));
                let mixed = if n == 0 { 0 } else { sum / n };
                let mut value = (mixed + UNSIGNED_MIDPOINT) * volume / 100;
                if let Some(filter) = self.filters.first_mut() {
                    value = filter.apply(value);
                }
                out.extend_from_slice(&(value.clamp(0, 65535) as u16).to_le_bytes());
            }
            SampleRange::Signed => {
                for (lane, sample) in samples.enumerate() {
                    let mut value = sample * volume / 100;
                    if let Some(filter) = self.filters.get_mut(lane) {
                        value = filter.apply(value);
                    }
                    let value = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
}
