use std::sync::Arc;

use crate::audio::SampleRange;
use crate::output::{AudioSink, DEFAULT_PWM_PERIOD_NS, OutputKind, SinkError, ToneSink};
use crate::testing::MockPwm;

fn sink() -> (ToneSink, Arc<MockPwm>) {
    let pwm = Arc::new(MockPwm::new());
    (ToneSink::new(pwm.clone()), pwm)
}

#[test]
fn test_capabilities() {
    let (sink, _pwm) = sink();
    assert_eq!(sink.kind(), OutputKind::Tone);
    assert_eq!(sink.sample_range(), SampleRange::Unsigned);
    assert!(sink.wants_smoothing());
    assert_eq!(sink.period_ns(), DEFAULT_PWM_PERIOD_NS);
}

#[test]
fn test_pulse_mapping_stays_within_duty_bounds() {
    let (sink, _pwm) = sink();
    assert_eq!(sink.pulse_for(0), 25_000);
    assert_eq!(sink.pulse_for(u16::MAX), 225_000);
    assert_eq!(sink.pulse_for(32768), 125_001);
}

#[test]
fn test_write_programs_one_pulse_per_sample() {
    let (mut sink, pwm) = sink();
    sink.start().unwrap();

    let frame = [0x00, 0x80, 0xFF, 0xFF];
    assert_eq!(sink.write(&frame).unwrap(), 4);
    assert_eq!(
        pwm.pulses(),
        vec![(250_000, 125_001), (250_000, 225_000)]
    );
}

#[test]
fn test_start_requires_ready_device() {
    let (mut sink, pwm) = sink();
    pwm.set_ready(false);

    assert!(matches!(sink.start(), Err(SinkError::Fault(_))));
    assert!(!sink.is_started());
    assert!(!sink.is_ready());
}

#[test]
fn test_write_to_lost_device_is_fatal() {
    let (mut sink, pwm) = sink();
    sink.start().unwrap();
    pwm.set_ready(false);

    let err = sink.write(&[0, 0]).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_driver_rejection_is_not_fatal() {
    let (mut sink, pwm) = sink();
    sink.start().unwrap();
    pwm.set_failure(Some(SinkError::Busy));

    let err = sink.write(&[0, 0]).unwrap_err();
    assert!(matches!(err, SinkError::Rejected(_)));
}

#[test]
fn test_stop_silences_output() {
    let (mut sink, pwm) = sink();
    sink.start().unwrap();
    sink.write(&[0xFF, 0xFF]).unwrap();

    sink.stop().unwrap();
    assert_eq!(pwm.last_pulse(), Some((250_000, 0)));
    assert!(!sink.is_started());
}

#[test]
fn test_cleanup_stops_started_sink() {
    let (mut sink, pwm) = sink();
    sink.cleanup();
    assert!(pwm.pulses().is_empty());

    sink.start().unwrap();
    sink.cleanup();
    assert_eq!(pwm.last_pulse(), Some((250_000, 0)));
}

#[test]
fn test_cleanup_survives_driver_error() {
    let (mut sink, pwm) = sink();
    sink.start().unwrap();
    let before = pwm.pulses().len();

    pwm.set_failure(Some(SinkError::Fault("bus error".to_string())));
    sink.cleanup();

    assert!(!sink.is_started());
    assert_eq!(pwm.pulses().len(), before);
}
