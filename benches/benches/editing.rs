use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wavecut_engine::{MemoryStorage, SampleFormat, Track, TrackCache};

const RATE: u32 = 44_100;

/// A single clip of reproducible noise.
fn long_track(seconds: usize, seed: u64) -> Track {
    let storage = Arc::new(MemoryStorage::new());
    let mut track = Track::new(storage, SampleFormat::Float32, RATE);
    let mut rng = StdRng::seed_from_u64(seed);
    let samples: Vec<f32> = (0..RATE as usize * seconds)
        .map(|_| rng.gen_range(-0.5..0.5))
        .collect();
    track.append(&samples).expect("append");
    track.flush().expect("flush");
    track
}

fn region_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("editing");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    let source = long_track(60, 1);

    group.bench_function("split_join_60s", |b| {
        b.iter(|| {
            let mut track = source.duplicate().expect("duplicate");
            for second in 1..60 {
                track.split_at(second as f64).expect("split");
            }
            track.join(0.0, 60.0).expect("join");
            black_box(track.num_clips())
        });
    });

    group.bench_function("cut_paste_60s", |b| {
        b.iter(|| {
            let mut track = source.duplicate().expect("duplicate");
            let clipboard = track.cut(10.0, 20.0).expect("cut");
            track.paste(40.0, &clipboard).expect("paste");
            black_box(track.end_time())
        });
    });

    group.finish();
}

fn cached_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    group.sample_size(20);

    let track = Arc::new(long_track(30, 2));
    let total = RATE as i64 * 30;
    group.bench_function("sequential_4096", |b| {
        let mut cache = TrackCache::new(Arc::clone(&track));
        b.iter(|| {
            let mut start = 0i64;
            let mut sum = 0.0f32;
            while start + 4096 <= total {
                if let Ok(wavecut_engine::CachedSamples::Float(samples)) =
                    cache.get(SampleFormat::Float32, start, 4096, true)
                {
                    sum += samples[0];
                }
                start += 4096;
            }
            black_box(sum)
        });
    });

    group.bench_function("near_sequential_4096", |b| {
        let mut cache = TrackCache::new(Arc::clone(&track));
        let mut rng = StdRng::seed_from_u64(3);
        let jumps: Vec<i64> = (0..256).map(|_| rng.gen_range(-2048..8192)).collect();
        b.iter(|| {
            let mut start = 0i64;
            let mut sum = 0.0f32;
            for &jump in &jumps {
                start = (start + jump).clamp(0, total - 4096);
                if let Ok(wavecut_engine::CachedSamples::Float(samples)) =
                    cache.get(SampleFormat::Float32, start, 4096, true)
                {
                    sum += samples[0];
                }
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, region_edits, cached_reads);
criterion_main!(benches);
