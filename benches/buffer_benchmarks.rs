use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rewind_audio::AudioFormat;
use rewind_audio::audio::{BoundedByteBuffer, BufferPool, FrameTransform, SampleRange};
use rewind_audio::streaming::WavHeader;
use rewind_audio::testing::{ramp_pcm16, wav_bytes};

fn benchmark_ring(c: &mut Criterion) {
    let ring = BoundedByteBuffer::new(2048).unwrap();
    let chunk = vec![0x5Au8; 256];
    let mut out = vec![0u8; 256];

    c.bench_function("ring_write_read_256", |b| {
        b.iter(|| {
            ring.write(black_box(&chunk));
            ring.read(black_box(&mut out))
        })
    });

    // Consumer-sized reads
    let mut frame = [0u8; 2];
    c.bench_function("ring_frame_reads", |b| {
        b.iter(|| {
            ring.write(black_box(&chunk));
            for _ in 0..128 {
                ring.read_blocking(black_box(&mut frame), Duration::ZERO);
            }
        })
    });
}

fn benchmark_pool(c: &mut Criterion) {
    let pool = BufferPool::new();
    pool.init(4, 2048).unwrap();
    let data = vec![1u8; 2048];

    c.bench_function("pool_acquire_fill_release", |b| {
        b.iter(|| {
            let mut buffer = pool.acquire(Duration::ZERO).unwrap();
            buffer.write(black_box(&data));
            pool.release(buffer).unwrap();
        })
    });
}

fn benchmark_transform(c: &mut Criterion) {
    let format = AudioFormat::CD_QUALITY;
    let input = ramp_pcm16(1024, 2, 17);
    let mut out = Vec::with_capacity(4096);

    let mut unsigned = FrameTransform::new(format, SampleRange::Unsigned, Some(8));
    c.bench_function("transform_unsigned_smoothed_1024", |b| {
        b.iter(|| {
            out.clear();
            for frame in input.chunks_exact(4) {
                unsigned.process(black_box(frame), 80, &mut out);
            }
        })
    });

    let mut signed = FrameTransform::new(format, SampleRange::Signed, None);
    c.bench_function("transform_signed_1024", |b| {
        b.iter(|| {
            out.clear();
            for frame in input.chunks_exact(4) {
                signed.process(black_box(frame), 80, &mut out);
            }
        })
    });
}

fn benchmark_header(c: &mut Criterion) {
    let image = wav_bytes(AudioFormat::MONO_16, &[0u8; 4096]);
    c.bench_function("wav_header_parse", |b| {
        b.iter(|| WavHeader::parse(black_box(&image)))
    });
}

criterion_group!(
    benches,
    benchmark_ring,
    benchmark_pool,
    benchmark_transform,
    benchmark_header
);
criterion_main!(benches);
