//! Bias-corrected gyro and accelerometer readouts
//!
//! Raw body-frame samples come in as `i16` counts. The integrator consumes the
//! unsmoothed gyro rate, scaled to the angle turned during one fusion cycle;
//! smoothing would only add lag there, and any jitter averages out in the
//! integral. The stance classifier and the operator readouts use low-passed
//! rates instead.

use nalgebra::{ComplexField, RealField, Vector3};

use crate::axes::DeviceProfile;
use crate::calibration::remove_bias;
use crate::types::{AhrsSettings, Biases};

/// Integer shift low-pass filter
///
/// `f <- f - (f >> K) + x`, output `f >> K`. The state settles at `x << K`,
/// so an `i32` state holds any `i16` input for `K <= 15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftFilter {
    state: Vector3<i32>,
    shift: u8,
}

impl ShiftFilter {
    /// `shift` is the filter strength: 0 = none, 1 = weak, 4+ = strong
    pub fn new(shift: u8) -> Self {
        Self {
            state: Vector3::zeros(),
            shift,
        }
    }

    pub fn update(&mut self, sample: Vector3<i16>) -> Vector3<i16> {
        let k = self.shift;
        self.state = self
            .state
            .zip_map(&sample, |f, x| f - (f >> k) + i32::from(x));
        self.output()
    }

    pub fn output(&self) -> Vector3<i16> {
        let k = self.shift;
        self.state
            .map(|f| (f >> k).clamp(i16::MIN as i32, i16::MAX as i32) as i16)
    }

    pub fn reset(&mut self) {
        self.state = Vector3::zeros();
    }
}

/// Scaled sensor readouts for one device
#[derive(Debug, Clone, Copy)]
pub struct Sensors {
    profile: DeviceProfile,
    biases: Biases,
    timestep: f32,
    /// Latest bias-corrected gyro sample
    rate: Vector3<i16>,
    rate_filter: ShiftFilter,
    tilt_filter: ShiftFilter,
}

impl Sensors {
    pub fn new(profile: DeviceProfile, settings: &AhrsSettings) -> Self {
        Self {
            profile,
            biases: Biases::default(),
            timestep: settings.timestep(),
            rate: Vector3::zeros(),
            rate_filter: ShiftFilter::new(settings.yaw_rate_smoothing),
            tilt_filter: ShiftFilter::new(settings.tilt_smoothing),
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn biases(&self) -> Biases {
        self.biases
    }

    pub fn set_biases(&mut self, biases: Biases) {
        self.biases = biases;
    }

    /// Take a fresh raw gyro sample; called once per fusion cycle
    pub fn update_gyro(&mut self, raw: Vector3<i16>) {
        self.rate = remove_bias(raw, self.biases.gyroscope);
        self.rate_filter.update(self.rate);
    }

    /// Angle turned about each body axis during the last fusion cycle, in radians
    pub fn gyro_delta(&self) -> Vector3<f32> {
        self.rate.map(f32::from) * (self.profile.gyro_scale * self.timestep)
    }

    /// Last bias-corrected gyro sample, in counts
    pub fn gyro_counts(&self) -> Vector3<i16> {
        self.rate
    }

    /// Unsmoothed bias-corrected rates, in radians per second
    pub fn gyro_rates(&self) -> Vector3<f32> {
        self.rate.map(f32::from) * self.profile.gyro_scale
    }

    /// Smoothed bias-corrected rates, in radians per second
    pub fn smoothed_rates(&self) -> Vector3<f32> {
        self.rate_filter.output().map(f32::from) * self.profile.gyro_scale
    }

    /// Smoothed yaw rate, in radians per second
    pub fn yaw_rate(&self) -> f32 {
        self.smoothed_rates().z
    }

    /// Smoothed roll rate, in radians per second
    pub fn roll_rate(&self) -> f32 {
        self.smoothed_rates().x
    }

    /// Smoothed pitch rate, in radians per second
    pub fn pitch_rate(&self) -> f32 {
        self.smoothed_rates().y
    }

    /// Bias-corrected acceleration, in g
    pub fn acceleration(&self, raw: Vector3<i16>) -> Vector3<f32> {
        remove_bias(raw, self.biases.accelerometer).map(f32::from) * self.profile.accel_scale
    }

    /// Roll and pitch of the gravity vector, in radians
    ///
    /// Only meaningful while standing still or moving in a straight line at
    /// constant speed. The raw sample is smoothed before the bias is removed.
    pub fn accel_tilt(&mut self, raw: Vector3<i16>) -> (f32, f32) {
        let smoothed = self.tilt_filter.update(raw);
        let a = remove_bias(smoothed, self.biases.accelerometer).map(f32::from)
            * self.profile.accel_scale;

        let roll = a.y.atan2(a.z);
        let pitch = (-a.x).atan2((a.y * a.y + a.z * a.z).sqrt());
        (roll, pitch)
    }

    /// Forget the filter histories and the last gyro sample
    pub fn reset_filters(&mut self) {
        self.rate = Vector3::zeros();
        self.rate_filter.reset();
        self.tilt_filter.reset();
    }
}
