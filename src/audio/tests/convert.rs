use crate::audio::convert::*;
use crate::audio::format::AudioFormat;

#[test]
fn test_decode_sample() {
    assert_eq!(decode_sample(&[0x00, 0x00], 16), 0);
    assert_eq!(decode_sample(&[0xFF, 0x7F], 16), i16::MAX);
    assert_eq!(decode_sample(&[0x00, 0x80], 16), i16::MIN);
    assert_eq!(decode_sample(&[0xFF, 0xFF], 16), -1);

    assert_eq!(decode_sample(&[128], 8), 0);
    assert_eq!(decode_sample(&[0], 8), i16::MIN);
    assert_eq!(decode_sample(&[255], 8), 127 << 8);

    // Short input decodes as silence
    assert_eq!(decode_sample(&[0x12], 16), 0);
}

#[test]
fn test_smoothing_filter() {
    let mut filter = SmoothingFilter::new(8, 32768);
    assert_eq!(filter.apply(65535), (65535 * 8 + 32768 * 2) / 10);
    assert_eq!(filter.previous(), 58981);

    filter.reset();
    assert_eq!(filter.previous(), 32768);

    let mut passthrough = SmoothingFilter::new(10, 0);
    assert_eq!(passthrough.apply(1234), 1234);
    assert_eq!(passthrough.apply(-5), -5);
}

#[test]
fn test_filter_weight_clamped() {
    let mut filter = SmoothingFilter::new(200, 0);
    assert_eq!(filter.apply(100), 100);
}

#[test]
fn test_unsigned_transform_rebias_and_volume() {
    let mut transform = FrameTransform::new(AudioFormat::MONO_16, SampleRange::Unsigned, None);
    let mut out = Vec::new();

    transform.process(&0i16.to_le_bytes(), 100, &mut out);
    transform.process(&i16::MAX.to_le_bytes(), 100, &mut out);
    transform.process(&i16::MIN.to_le_bytes(), 100, &mut out);
    transform.process(&i16::MAX.to_le_bytes(), 50, &mut out);

    let samples: Vec<u16> = out
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(samples, vec![32768, 65535, 0, 32767]);
}

#[test]
fn test_unsigned_transform_mixes_stereo() {
    let mut transform = FrameTransform::new(AudioFormat::CD_QUALITY, SampleRange::Unsigned, None);
    assert_eq!(transform.input_frame_bytes(), 4);
    assert_eq!(transform.output_frame_bytes(), 2);

    let mut frame = Vec::new();
    frame.extend_from_slice(&1000i16.to_le_bytes());
    frame.extend_from_slice(&(-3000i16).to_le_bytes());

    let mut out = Vec::new();
    transform.process(&frame, 100, &mut out);
    assert_eq!(u16::from_le_bytes([out[0], out[1]]), 32768 - 1000);
}

#[test]
fn test_unsigned_transform_filters() {
    let mut transform = FrameTransform::new(AudioFormat::MONO_16, SampleRange::Unsigned, Some(8));
    assert!(transform.is_smoothing());

    let mut out = Vec::new();
    transform.process(&i16::MAX.to_le_bytes(), 100, &mut out);
    assert_eq!(u16::from_le_bytes([out[0], out[1]]), 58981);

    transform.reset();
    out.clear();
    transform.process(&0i16.to_le_bytes(), 100, &mut out);
    assert_eq!(u16::from_le_bytes([out[0], out[1]]), 32768);
}

#[test]
fn test_signed_transform_passthrough() {
    let format = AudioFormat::new(8000, 2, 16);
    let mut transform = FrameTransform::new(format, SampleRange::Signed, None);
    assert_eq!(transform.output_frame_bytes(), 4);

    let frame = [0x34, 0x12, 0xCC, 0xED];
    let mut out = Vec::new();
    transform.process(&frame, 100, &mut out);
    assert_eq!(out, frame);

    out.clear();
    transform.process(&frame, 0, &mut out);
    assert_eq!(out, [0, 0, 0, 0]);
}

#[test]
fn test_eight_bit_input() {
    let format = AudioFormat::new(8000, 1, 8);
    let mut transform = FrameTransform::new(format, SampleRange::Unsigned, None);

    let mut out = Vec::new();
    transform.process(&[0x80], 100, &mut out);
    transform.process(&[0xFF], 100, &mut out);
    assert_eq!(u16::from_le_bytes([out[0], out[1]]), 0x8000);
    assert_eq!(u16::from_le_bytes([out[2], out[3]]), 0xFF00);
}
