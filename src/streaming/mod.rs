//! WAV decoding and producers feeding a playback session

mod feeder;
mod pump;
mod source;
mod wav;


pub use feeder::{FeedReport, FeederSettings, StreamFeeder};
pub use pump::{PumpReport, PumpSettings, pump_source};
pub use source::{AudioSource, SilenceSource, SliceSource};
pub use wav::{
    DEFAULT_MAX_HEADER_BYTES, FORMAT_TAG_PCM, MIN_HEADER_LEN, WavDecoder, WavError, WavFormat,
    WavHeader, WavStream,
};
