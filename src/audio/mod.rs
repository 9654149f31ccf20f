//! Audio buffering, sample conversion and pacing primitives

pub mod buffer;
pub mod clock;
pub mod convert;
pub mod format;
pub mod pool;

#[cfg(test)]
mod tests;

pub use buffer::BoundedByteBuffer;
pub use clock::FramePacer;
pub use convert::{FrameTransform, SampleRange, SmoothingFilter, decode_sample};
pub use format::AudioFormat;
pub use pool::{BufferFlags, BufferPool, PoolConfig, PoolStats, PooledBuffer};
