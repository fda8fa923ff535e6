use criterion::{Criterion, black_box, criterion_group, criterion_main};
use horizon_dcm::{Ahrs, AhrsSettings, DeviceProfile, RawImu, SharedAhrs, StoredConfig};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_pcg::Pcg64;
use std::f32::consts::PI;

// Pre-generated raw samples to eliminate RNG overhead during benchmarks
struct ReplayImu {
    samples: Vec<Vector3<i16>>,
    index: usize,
}

impl ReplayImu {
    fn new(count: usize, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut samples = Vec::with_capacity(count);

        for i in 0..count {
            let time = i as f32 / 250.0;
            let phase = time * 0.25 * 2.0 * PI;

            // weaving: roll and yaw rates swing together, in counts
            samples.push(Vector3::new(
                (2000.0 * phase.cos()) as i16 + rng.random_range(-20..20),
                rng.random_range(-20..20),
                (1500.0 * phase.sin()) as i16 + rng.random_range(-20..20),
            ));
        }

        Self { samples, index: 0 }
    }
}

impl RawImu for ReplayImu {
    fn profile(&self) -> &DeviceProfile {
        &DeviceProfile::MPU6050
    }

    fn read_gyro(&mut self) -> Vector3<i16> {
        let sample = self.samples[self.index];
        self.index = (self.index + 1) % self.samples.len();
        sample
    }

    fn read_accel(&mut self) -> Vector3<i16> {
        Vector3::new(0, 0, DeviceProfile::MPU6050.one_gee)
    }
}

/// Benchmark one fusion cycle while turning
fn bench_update(c: &mut Criterion) {
    let mut ahrs = Ahrs::new();
    ahrs.align(0.0, 0.0, 0.0);
    let gyro_delta = Vector3::new(0.001, -0.0005, 0.002);

    c.bench_function("ahrs_update", |b| {
        b.iter(|| ahrs.update(black_box(gyro_delta), black_box(0.5)))
    });
}

/// Benchmark one fusion cycle while upright, paying out a correction
fn bench_update_upright(c: &mut Criterion) {
    let mut ahrs = Ahrs::new();
    ahrs.align(0.0, 0.0, 0.0);
    ahrs.update(Vector3::new(0.05, 0.0, 0.0), 0.5);
    for _ in 0..20 {
        ahrs.update(Vector3::zeros(), 0.0);
    }

    c.bench_function("ahrs_update_upright", |b| {
        b.iter(|| ahrs.update(black_box(Vector3::zeros()), black_box(0.0)))
    });
}

/// Benchmark the full interrupt-side cycle: read, smooth, correct, integrate
fn bench_dispatch(c: &mut Criterion) {
    let shared = SharedAhrs::new(ReplayImu::new(10_000, 42), AhrsSettings::default()).unwrap();
    shared.zero();

    c.bench_function("shared_dispatch", |b| b.iter(|| shared.dispatch()));
}

/// Benchmark batch processing: one second of fusion cycles
fn bench_batch_dispatch(c: &mut Criterion) {
    let shared = SharedAhrs::new(ReplayImu::new(10_000, 7), AhrsSettings::default()).unwrap();
    shared.zero();

    c.bench_function("shared_batch_250_dispatches", |b| {
        b.iter(|| {
            for _ in 0..250 {
                shared.dispatch();
            }
        })
    });
}

/// Benchmark foreground angle reads
fn bench_attitude_access(c: &mut Criterion) {
    let shared = SharedAhrs::new(ReplayImu::new(1000, 3), AhrsSettings::default()).unwrap();
    shared.align(0.1, -0.05, 0.3);

    c.bench_function("shared_attitude", |b| b.iter(|| black_box(shared.attitude())));
    c.bench_function("shared_roll_angle", |b| b.iter(|| black_box(shared.roll_angle())));
}

/// Benchmark alignment
fn bench_align(c: &mut Criterion) {
    let mut ahrs = Ahrs::new();

    c.bench_function("ahrs_align", |b| {
        b.iter(|| ahrs.align(black_box(0.1), black_box(-0.05), black_box(0.3)))
    });
}

/// Benchmark configuration blob decoding
fn bench_config_decode(c: &mut Criterion) {
    let bytes = StoredConfig::default().to_bytes();

    c.bench_function("stored_config_decode", |b| {
        b.iter(|| black_box(StoredConfig::from_bytes(black_box(&bytes))))
    });
}

criterion_group!(
    benches,
    bench_update,
    bench_update_upright,
    bench_dispatch,
    bench_batch_dispatch,
    bench_attitude_access,
    bench_align,
    bench_config_decode
);

criterion_main!(benches);
