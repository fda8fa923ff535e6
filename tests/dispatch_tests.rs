//! End-to-end runs through the timer dispatch path: raw register bytes in,
//! angles out, with the foreground reading concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use horizon_dcm::{
    AhrsSettings, CalibrationKind, CycleCounter, DEG_TO_RAD, DeviceProfile, RawImu, SharedAhrs,
    StoredConfig, Ticker,
};
use nalgebra::Vector3;

/// MPU-6050 stand-in holding its output registers
struct Mpu6050Registers {
    gyro: [u8; 6],
    accel: [u8; 6],
}

impl Mpu6050Registers {
    /// Registers for a level, still device with the given sensor-frame gyro words
    fn new(gyro: Vector3<i16>) -> Self {
        let mut regs = Self {
            gyro: [0; 6],
            accel: [0; 6],
        };
        regs.set_gyro(gyro);
        // gravity reaction on sensor +x
        regs.accel[0..2].copy_from_slice(&DeviceProfile::MPU6050.one_gee.to_be_bytes());
        regs
    }

    fn set_gyro(&mut self, sensor: Vector3<i16>) {
        for (i, word) in sensor.iter().enumerate() {
            self.gyro[2 * i..2 * i + 2].copy_from_slice(&word.to_be_bytes());
        }
    }
}

impl RawImu for Mpu6050Registers {
    fn profile(&self) -> &DeviceProfile {
        &DeviceProfile::MPU6050
    }

    fn read_gyro(&mut self) -> Vector3<i16> {
        DeviceProfile::MPU6050.decode_gyro(&self.gyro)
    }

    fn read_accel(&mut self) -> Vector3<i16> {
        DeviceProfile::MPU6050.decode_accel(&self.accel)
    }
}

/// Cycle counter that advances by a fixed amount per read
struct SteppingCounter(AtomicU32);

impl CycleCounter for SteppingCounter {
    fn now(&self) -> u32 {
        self.0.fetch_add(3, Ordering::Relaxed)
    }

    fn counts_per_second(&self) -> f32 {
        15_625.0
    }
}

fn ticker() -> Ticker<SteppingCounter> {
    Ticker::new(&AhrsSettings::default(), SteppingCounter(AtomicU32::new(0))).unwrap()
}

#[test]
fn test_yaw_through_ticker() {
    // body yaw = -sensor x on the MPU-6050, so a negative sensor x word yaws right
    let shared = SharedAhrs::new(Mpu6050Registers::new(Vector3::new(-1311, 0, 0)), AhrsSettings::default()).unwrap();
    let ticker = ticker();
    shared.zero();

    let mut dispatches = 0;
    for _ in 0..4000 {
        if ticker.on_tick(|| shared.dispatch()).is_some() {
            dispatches += 1;
        }
    }

    assert_eq!(dispatches, 1000);
    assert!((ticker.elapsed(0) - 4.0).abs() < 1e-6);
    assert_eq!(ticker.duration(), 3);
    assert_eq!(ticker.overruns(), 0);

    let attitude = shared.attitude();
    // 1311 counts is 10.002 deg/s, for four seconds
    assert!((attitude.yaw - 40.01 * DEG_TO_RAD).abs() < 0.05 * DEG_TO_RAD, "yaw {}", attitude.yaw);
    assert!(attitude.roll.abs() < 1e-5);
    assert!(attitude.pitch.abs() < 1e-5);
}

#[test]
fn test_calibrate_then_fly_level() {
    let offset = Vector3::new(17, -9, 30);
    let shared = SharedAhrs::new(Mpu6050Registers::new(offset), AhrsSettings::default()).unwrap();
    let ticker = ticker();

    shared.begin_calibration(CalibrationKind::Gyroscope);
    for _ in 0..2000 {
        ticker.on_tick(|| shared.dispatch());
    }
    let biases = shared.finish_calibration().unwrap();
    // body x = -sensor y, body y = sensor z, body z = -sensor x
    assert_eq!(biases.gyroscope, Vector3::new(9, 30, -17));

    shared.begin_calibration(CalibrationKind::Accelerometer);
    for _ in 0..2000 {
        ticker.on_tick(|| shared.dispatch());
    }
    let biases = shared.finish_calibration().unwrap();
    assert_eq!(biases.accelerometer, Vector3::zeros());

    let level = shared.align_level();
    assert!(level.roll.abs() < 1e-6 && level.pitch.abs() < 1e-6);

    for _ in 0..4000 {
        ticker.on_tick(|| shared.dispatch());
    }
    assert!(shared.attitude().roll.abs() < 1e-6);
    assert!(shared.flags().stance.is_upright());

    let saved = StoredConfig::from_bytes(&shared.stored_config(true).to_bytes()).unwrap();
    assert!(saved.ready);
    assert_eq!(saved.biases, biases);
}

#[test]
fn test_foreground_reads_while_interrupt_runs() {
    let settings = AhrsSettings::default();
    let shared = Arc::new(SharedAhrs::new(Mpu6050Registers::new(Vector3::new(0, 400, 0)), settings).unwrap());
    let ticker = Arc::new(ticker());
    shared.zero();

    let stop = Arc::new(AtomicBool::new(false));
    let timer = {
        let shared = Arc::clone(&shared);
        let ticker = Arc::clone(&ticker);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                ticker.on_tick(|| shared.dispatch());
                thread::yield_now();
            }
        })
    };

    // realign over and over while the roll gyro keeps turning the matrix
    for i in 0..2000 {
        let roll = (i % 7) as f32 * 0.1 - 0.3;
        shared.align(roll, 0.0, 0.0);

        let attitude = shared.attitude();
        assert!(attitude.roll.is_finite() && attitude.pitch.is_finite() && attitude.yaw.is_finite());
        assert!(shared.internal_states().orthonormality_error < 1e-3);
        // nothing can have integrated more than a few cycles since the alignment
        assert!(attitude.pitch.abs() < 1e-3, "pitch {}", attitude.pitch);
    }

    ticker.pause(0.1);
    stop.store(true, Ordering::Relaxed);
    timer.join().unwrap();

    assert!(ticker.now() >= 100);
    assert!(shared.is_aligned());
}
