use std::sync::Arc;

use crate::audio::{AudioFormat, SampleRange};
use crate::error::AudioError;
use crate::output::{NotifySettings, OutputKind, SinkError, SinkRegistry};
use crate::testing::{MockNotifier, MockPwm};

#[test]
fn test_builds_registered_backends() {
    let registry = SinkRegistry::new()
        .with_tone(Arc::new(MockPwm::new()))
        .with_notify(Arc::new(MockNotifier::new()), NotifySettings::default());

    let tone = registry.build(OutputKind::Tone, AudioFormat::MONO_16).unwrap();
    assert_eq!(tone.kind(), OutputKind::Tone);
    assert_eq!(tone.sample_range(), SampleRange::Unsigned);

    let notify = registry.build(OutputKind::Notify, AudioFormat::MONO_16).unwrap();
    assert_eq!(notify.kind(), OutputKind::Notify);
}

#[test]
fn test_unregistered_kind_unsupported() {
    let registry = SinkRegistry::new().with_tone(Arc::new(MockPwm::new()));
    assert!(registry.supports(OutputKind::Tone));
    assert!(!registry.supports(OutputKind::Notify));

    assert!(matches!(
        registry.build(OutputKind::Notify, AudioFormat::MONO_16),
        Err(AudioError::Unsupported { .. })
    ));
}

#[test]
fn test_factory_failure_is_backend_fault() {
    let registry = SinkRegistry::new().register(OutputKind::Tone, |_format| {
        Err(SinkError::Fault("no pwm node".to_string()))
    });

    let Err(err) = registry.build(OutputKind::Tone, AudioFormat::MONO_16) else {
        panic!("factory failure should not build a sink");
    };
    assert!(matches!(err, AudioError::BackendFault { .. }));
    assert!(err.to_string().contains("no pwm node"));
}

#[test]
fn test_output_kind_serde() {
    assert_eq!(serde_json::to_string(&OutputKind::Notify).unwrap(), "\"notify\"");
    let kind: OutputKind = serde_json::from_str("\"tone\"").unwrap();
    assert_eq!(kind, OutputKind::Tone);
    assert_eq!(OutputKind::Tone.to_string(), "tone");
}
