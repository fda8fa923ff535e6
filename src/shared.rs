//! Estimator state shared between the timer interrupt and the foreground loop
//!
//! The interrupt runs [`SharedAhrs::dispatch`] once per fusion cycle. The
//! foreground reads angles, realigns and calibrates through the same handle.
//! Every access goes through a critical section, so the foreground never sees a
//! half-written matrix and the interrupt never integrates against one.
//!
//! Critical sections are kept short: angle reads copy the matrix out and do the
//! trig after the section ends.

use core::cell::RefCell;

use critical_section::Mutex;
use nalgebra::Vector3;

use crate::ahrs::Ahrs;
use crate::axes::DeviceProfile;
use crate::calibration::Accumulator;
use crate::dcm::Dcm;
use crate::error::Error;
use crate::sensor::Sensors;
use crate::storage::StoredConfig;
use crate::types::{AhrsFlags, AhrsInternalStates, AhrsSettings, Attitude, Biases, CalibrationKind, Mode};
use crate::{log_debug, log_info, log_warn};

/// Accelerometer readings taken when aligning to the gravity vector
///
/// Enough for the tilt smoothing filter to settle.
pub const LEVEL_READINGS: usize = 10;

/// Source of raw body-frame samples
///
/// Implementations own the bus; they read the device registers and decode them
/// with [`DeviceProfile::decode_gyro`] and [`DeviceProfile::decode_accel`].
/// Bus errors are the implementation's business: return the last good sample.
pub trait RawImu {
    /// Scale factors and axis maps of the device
    fn profile(&self) -> &DeviceProfile;

    /// Raw gyro sample, body frame, in counts
    fn read_gyro(&mut self) -> Vector3<i16>;

    /// Raw accelerometer sample, body frame, in counts
    fn read_accel(&mut self) -> Vector3<i16>;
}

struct Fusion<I> {
    imu: I,
    sensors: Sensors,
    ahrs: Ahrs,
    mode: Mode,
    accumulator: Accumulator,
    /// Angles passed to the last alignment
    mount: Attitude,
}

impl<I: RawImu> Fusion<I> {
    fn cycle(&mut self) {
        match self.mode {
            Mode::Running => {
                let raw = self.imu.read_gyro();
                self.sensors.update_gyro(raw);
                self.ahrs.update(self.sensors.gyro_delta(), self.sensors.yaw_rate());
            }
            Mode::Calibrating(CalibrationKind::Gyroscope) => {
                let raw = self.imu.read_gyro();
                self.accumulator.add(raw);
            }
            Mode::Calibrating(CalibrationKind::Accelerometer) => {
                let raw = self.imu.read_accel();
                self.accumulator.add(raw);
            }
        }
    }

    fn align(&mut self, attitude: Attitude) {
        self.mount = attitude;
        self.ahrs.align(attitude.roll, attitude.pitch, attitude.yaw);
    }
}

/// Interrupt-safe handle to the estimator and its sensor
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use horizon_dcm::{AhrsSettings, DeviceProfile, RawImu, SharedAhrs};
///
/// struct StillImu;
///
/// impl RawImu for StillImu {
///     fn profile(&self) -> &DeviceProfile {
///         &DeviceProfile::MPU6050
///     }
///     fn read_gyro(&mut self) -> Vector3<i16> {
///         Vector3::zeros()
///     }
///     fn read_accel(&mut self) -> Vector3<i16> {
///         Vector3::new(0, 0, DeviceProfile::MPU6050.one_gee)
///     }
/// }
///
/// let shared = SharedAhrs::new(StillImu, AhrsSettings::default()).unwrap();
/// shared.zero();
/// for _ in 0..250 {
///     shared.dispatch(); // from the timer interrupt
/// }
/// assert_eq!(shared.roll_angle(), 0.0);
/// ```
pub struct SharedAhrs<I> {
    inner: Mutex<RefCell<Fusion<I>>>,
}

impl<I: RawImu> SharedAhrs<I> {
    /// Wrap a sensor; the estimator starts unaligned with zero biases
    pub fn new(imu: I, settings: AhrsSettings) -> Result<Self, Error> {
        settings.validate()?;
        let sensors = Sensors::new(*imu.profile(), &settings);
        log_info!(
            "imu: {} timestep={} ms T={} s",
            imu.profile().name,
            settings.timestep() * 1000.0,
            settings.time_constant
        );

        Ok(Self {
            inner: Mutex::new(RefCell::new(Fusion {
                imu,
                sensors,
                ahrs: Ahrs::with_settings(settings),
                mode: Mode::Running,
                accumulator: Accumulator::new(),
                mount: Attitude::ZERO,
            })),
        })
    }

    /// Run one fusion cycle; called from the timer interrupt
    pub fn dispatch(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).cycle());
    }

    /// Set the attitude, in radians, and make it the new home attitude
    pub fn align(&self, roll: f32, pitch: f32, yaw: f32) {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref_mut(cs)
                .align(Attitude::new(roll, pitch, yaw))
        });
    }

    /// Align roll and pitch to the gravity vector, yaw to zero
    ///
    /// The vehicle must be level and at rest. Used when the camera sits on the
    /// vehicle at some deliberately non-level attitude. Returns the alignment.
    pub fn align_level(&self) -> Attitude {
        let mut tilt = (0.0, 0.0);
        for _ in 0..LEVEL_READINGS {
            tilt = self.accel_tilt();
        }
        let attitude = Attitude::new(tilt.0, tilt.1, 0.0);
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).align(attitude));
        attitude
    }

    /// Align to level with zero yaw
    pub fn zero(&self) {
        self.align(0.0, 0.0, 0.0);
    }

    /// Align to the attitude of the last alignment (or the restored mount)
    pub fn realign(&self) {
        critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            let mount = fusion.mount;
            fusion.align(mount);
        });
    }

    fn dcm(&self) -> Dcm {
        critical_section::with(|cs| self.inner.borrow_ref(cs).ahrs.dcm())
    }

    /// Roll angle, in radians
    pub fn roll_angle(&self) -> f32 {
        self.dcm().roll()
    }

    /// Pitch angle, in radians
    pub fn pitch_angle(&self) -> f32 {
        self.dcm().pitch()
    }

    /// Yaw angle, in radians
    pub fn yaw_angle(&self) -> f32 {
        self.dcm().yaw()
    }

    /// All three angles from one consistent matrix
    pub fn attitude(&self) -> Attitude {
        self.dcm().attitude()
    }

    pub fn is_aligned(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).ahrs.is_aligned())
    }

    pub fn set_drift_correction(&self, enabled: bool) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).ahrs.set_drift_correction(enabled));
    }

    /// Flip drift correction; returns the new state
    pub fn toggle_drift_correction(&self) -> bool {
        critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            let enabled = !fusion.ahrs.drift_correction();
            fusion.ahrs.set_drift_correction(enabled);
            enabled
        })
    }

    pub fn flags(&self) -> AhrsFlags {
        critical_section::with(|cs| self.inner.borrow_ref(cs).ahrs.flags())
    }

    pub fn internal_states(&self) -> AhrsInternalStates {
        critical_section::with(|cs| self.inner.borrow_ref(cs).ahrs.internal_states())
    }

    /// Smoothed gyro rates (roll, pitch, yaw), in radians per second
    pub fn rates(&self) -> Vector3<f32> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).sensors.smoothed_rates())
    }

    /// Last bias-corrected gyro sample, in counts
    pub fn gyro_counts(&self) -> Vector3<i16> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).sensors.gyro_counts())
    }

    /// Roll and pitch of the gravity vector, in radians
    ///
    /// Reads the accelerometer, so it also feeds the tilt smoothing filter.
    pub fn accel_tilt(&self) -> (f32, f32) {
        critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            let raw = fusion.imu.read_accel();
            fusion.sensors.accel_tilt(raw)
        })
    }

    /// Bias-corrected acceleration, in g
    pub fn acceleration(&self) -> Vector3<f32> {
        critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            let raw = fusion.imu.read_accel();
            fusion.sensors.acceleration(raw)
        })
    }

    pub fn mode(&self) -> Mode {
        critical_section::with(|cs| self.inner.borrow_ref(cs).mode)
    }

    /// Start accumulating raw samples for a bias calibration
    ///
    /// Fusion is suspended until [`SharedAhrs::finish_calibration`]. The device
    /// must be motionless; for the accelerometer it must also be level.
    pub fn begin_calibration(&self, kind: CalibrationKind) {
        critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            fusion.accumulator.clear();
            fusion.mode = Mode::Calibrating(kind);
        });
        log_info!("imu: calibrating {}", kind_name(kind));
    }

    /// Stop accumulating, install the new biases and resume fusion
    ///
    /// The new biases are in place before the next fusion cycle can run. The
    /// previous biases stay in place if nothing was accumulated.
    pub fn finish_calibration(&self) -> Result<Biases, Error> {
        let (kind, count, bias, biases) = critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            let Mode::Calibrating(kind) = fusion.mode else {
                return Err(Error::NotCalibrating);
            };

            let bias = match kind {
                CalibrationKind::Gyroscope => fusion.accumulator.gyro_bias(),
                CalibrationKind::Accelerometer => {
                    fusion.accumulator.accel_bias(fusion.sensors.profile().one_gee)
                }
            };
            let bias = match bias {
                Ok(bias) => bias,
                Err(e) => {
                    fusion.mode = Mode::Running;
                    return Err(e);
                }
            };

            let mut biases = fusion.sensors.biases();
            match kind {
                CalibrationKind::Gyroscope => biases.gyroscope = bias,
                CalibrationKind::Accelerometer => biases.accelerometer = bias,
            }
            fusion.sensors.set_biases(biases);
            fusion.sensors.reset_filters();
            fusion.mode = Mode::Running;
            Ok((kind, fusion.accumulator.count(), bias, biases))
        })
        .inspect_err(|e| log_warn!("imu: calibration not finished: {}", e))?;

        log_info!(
            "imu: {} cnt={} bias=({} {} {})",
            kind_name(kind),
            count,
            bias.x,
            bias.y,
            bias.z
        );
        Ok(biases)
    }

    pub fn biases(&self) -> Biases {
        critical_section::with(|cs| self.inner.borrow_ref(cs).sensors.biases())
    }

    pub fn set_biases(&self, biases: Biases) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).sensors.set_biases(biases));
    }

    /// Snapshot of everything worth persisting
    pub fn stored_config(&self, ready: bool) -> StoredConfig {
        let config = critical_section::with(|cs| {
            let fusion = self.inner.borrow_ref(cs);
            StoredConfig {
                ready,
                biases: fusion.sensors.biases(),
                mount: fusion.mount,
            }
        });
        log_debug!("config: saving ready={}", config.ready);
        config
    }

    /// Install persisted biases and align to the persisted mount attitude
    pub fn restore(&self, config: &StoredConfig) {
        log_debug!(
            "config: restoring gyro=({} {} {}) accel=({} {} {})",
            config.biases.gyroscope.x,
            config.biases.gyroscope.y,
            config.biases.gyroscope.z,
            config.biases.accelerometer.x,
            config.biases.accelerometer.y,
            config.biases.accelerometer.z
        );
        critical_section::with(|cs| {
            let mut fusion = self.inner.borrow_ref_mut(cs);
            fusion.sensors.set_biases(config.biases);
            fusion.align(config.mount);
        });
    }
}

fn kind_name(kind: CalibrationKind) -> &'static str {
    match kind {
        CalibrationKind::Gyroscope => "gyro",
        CalibrationKind::Accelerometer => "acco",
    }
}
