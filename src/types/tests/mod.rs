use std::time::Duration;

use super::*;
use crate::audio::AudioFormat;
use crate::error::AudioError;
use crate::output::OutputKind;

// --- config.rs tests ---

#[test]
fn test_config_defaults() {
    let config = SessionConfig::default();

    assert_eq!(config.output, OutputKind::Tone);
    assert_eq!(config.format, AudioFormat::MONO_16);
    assert_eq!(config.buffer_capacity, 2048);
    assert_eq!(config.filter_weight, 8);
    assert_eq!(config.drop_threshold_percent, 75);
    assert_eq!(config.frame_read_timeout, Duration::from_millis(10));
    assert_eq!(config.idle_poll_interval, Duration::from_millis(10));
    assert_eq!(config.write_timeout, Duration::from_millis(10));
    assert_eq!(config.max_header_bytes, 4096);
    assert_eq!(config.initial_volume, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_builder() {
    let config = SessionConfig::builder()
        .output(OutputKind::Notify)
        .format(AudioFormat::new(8000, 1, 8))
        .buffer_duration(Duration::from_millis(500))
        .filter_weight(6)
        .drop_threshold_percent(90)
        .write_timeout(Duration::from_millis(25))
        .initial_volume(80)
        .build();

    assert_eq!(config.output, OutputKind::Notify);
    assert_eq!(config.buffer_capacity, 4000);
    assert_eq!(config.filter_weight, 6);
    assert_eq!(config.drop_threshold_bytes(), 3600);
    assert_eq!(config.buffer_duration(), Duration::from_millis(500));
    assert_eq!(config.initial_volume, 80);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation() {
    let cases = [
        SessionConfig::builder().filter_weight(11).build(),
        SessionConfig::builder().drop_threshold_percent(0).build(),
        SessionConfig::builder().initial_volume(101).build(),
        SessionConfig::builder().buffer_capacity(1).build(),
        SessionConfig::builder()
            .format(AudioFormat::new(44100, 1, 24))
            .build(),
        SessionConfig::builder()
            .frame_read_timeout(Duration::ZERO)
            .build(),
    ];

    for config in cases {
        assert!(
            matches!(config.validate(), Err(AudioError::InvalidArgument { .. })),
            "accepted {config:?}"
        );
    }
}

#[test]
fn test_config_from_json() {
    let config = SessionConfig::from_json(
        r#"{"output": "notify", "format": {"sample_rate": 8000, "channels": 2, "bits_per_sample": 16}, "initial_volume": 30}"#,
    )
    .unwrap();

    assert_eq!(config.output, OutputKind::Notify);
    assert_eq!(config.format.channels, 2);
    assert_eq!(config.initial_volume, 30);
    assert_eq!(config.buffer_capacity, 2048);

    assert!(SessionConfig::from_json("{not json").is_err());
    assert!(SessionConfig::from_json(r#"{"filter_weight": 12}"#).is_err());
}

// --- state.rs tests ---

#[test]
fn test_playback_state() {
    assert_eq!(PlaybackState::default(), PlaybackState::Uninitialized);
    assert!(PlaybackState::Paused.is_initialized());
    assert!(PlaybackState::Playing.accepts_writes());
    assert!(!PlaybackState::Error.accepts_writes());
    assert!(!PlaybackState::Uninitialized.is_initialized());
    assert_eq!(PlaybackState::Playing.to_string(), "playing");
}
