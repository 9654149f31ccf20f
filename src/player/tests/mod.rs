mod session;

use crate::audio::{AudioFormat, SampleRange};
use crate::output::OutputKind;
use crate::player::PlaybackSession;
use crate::testing::{SinkMonitor, recording_registry};
use crate::types::SessionConfig;

pub(super) const FORMAT: AudioFormat = AudioFormat {
    sample_rate: 8000,
    channels: 1,
    bits_per_sample: 16,
};

pub(super) fn config() -> SessionConfig {
    SessionConfig::builder()
        .output(OutputKind::Notify)
        .format(FORMAT)
        .initial_volume(100)
        .build()
}

pub(super) fn session_with(range: SampleRange, smoothing: bool) -> (PlaybackSession, SinkMonitor) {
    let (registry, monitor) = recording_registry(OutputKind::Notify, range, smoothing);
    (PlaybackSession::new(registry), monitor)
}

pub(super) fn session() -> (PlaybackSession, SinkMonitor) {
    session_with(SampleRange::Signed, false)
}

pub(super) fn samples(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
