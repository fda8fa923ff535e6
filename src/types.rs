//! Core types and conventions for the horizon-dcm library
//!
//! All angles use the aerospace convention:
//! - x is the roll axis, points ahead, positive rotation rolls right
//! - y is the pitch axis, points right, positive rotation pitches up
//! - z is the yaw axis, points down, positive rotation yaws right

use nalgebra::Vector3;

use crate::error::Error;
use crate::math::DEG_TO_RAD;

/// Estimator settings
///
/// Immutable configuration supplied when the estimator is created. Defaults
/// match the values the motorcycle camera mount was tuned with.
///
/// # Example
/// ```
/// use horizon_dcm::AhrsSettings;
///
/// let settings = AhrsSettings {
///     time_constant: 1.0,     // blend corrections in more slowly
///     dispatch_rate: 500,     // 500 Hz fusion cycle
///     ..Default::default()
/// };
/// assert_eq!(settings.divider(), Ok(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AhrsSettings {
    /// Yaw rate below which the vehicle may be upright, in radians per second
    pub rate_threshold: f32,
    /// How long the yaw rate must stay below the threshold before a drift
    /// snapshot is taken, in seconds
    pub dwell_time: f32,
    /// Time constant for spreading out drift corrections, in seconds
    ///
    /// Short enough to limit cross-axis artifacts during turns, long enough
    /// that the camera blends corrections in without visible jumps.
    pub time_constant: f32,
    /// Timer interrupt rate, in Hz
    pub tick_rate: u32,
    /// Fusion cycle rate, in Hz
    ///
    /// Must divide `tick_rate` by a power of two.
    pub dispatch_rate: u32,
    /// Low-pass strength for the smoothed gyro rates (0 = none, 1 = weak, 4+ = strong)
    pub yaw_rate_smoothing: u8,
    /// Low-pass strength for the accelerometer tilt readout
    pub tilt_smoothing: u8,
}

impl Default for AhrsSettings {
    fn default() -> Self {
        Self {
            rate_threshold: 1.0 * DEG_TO_RAD,
            dwell_time: 0.040,
            time_constant: 0.5,
            tick_rate: 1000,
            dispatch_rate: 250,
            yaw_rate_smoothing: 3,
            tilt_smoothing: 1,
        }
    }
}

impl AhrsSettings {
    /// Number of timer ticks per fusion cycle
    ///
    /// Returns an error unless `tick_rate / dispatch_rate` is an exact power of two.
    pub fn divider(&self) -> Result<u32, Error> {
        let invalid = Error::InvalidDivider {
            tick_rate: self.tick_rate,
            dispatch_rate: self.dispatch_rate,
        };
        if self.dispatch_rate == 0 || self.tick_rate % self.dispatch_rate != 0 {
            return Err(invalid);
        }
        let divider = self.tick_rate / self.dispatch_rate;
        if !divider.is_power_of_two() {
            return Err(invalid);
        }
        Ok(divider)
    }

    /// Duration of one fusion cycle, in seconds
    pub fn timestep(&self) -> f32 {
        1.0 / self.dispatch_rate as f32
    }

    /// Check every field, including the tick divider
    pub fn validate(&self) -> Result<(), Error> {
        self.divider()?;
        if !(self.time_constant > 0.0) || !(self.dwell_time >= 0.0) || !(self.rate_threshold >= 0.0)
        {
            return Err(Error::InvalidSettings);
        }
        // shifts past 15 would wipe out every 16 bit sample
        if self.yaw_rate_smoothing > 15 || self.tilt_smoothing > 15 {
            return Err(Error::InvalidSettings);
        }
        Ok(())
    }
}

/// Euler angles extracted from the orientation matrix, in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Attitude {
    pub const ZERO: Attitude = Attitude {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    pub fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Angles converted to degrees, as (roll, pitch, yaw)
    pub fn to_degrees(&self) -> Vector3<f32> {
        Vector3::new(self.roll, self.pitch, self.yaw) * crate::math::RAD_TO_DEG
    }
}

/// Vehicle stance inferred from the smoothed yaw rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stance {
    /// Yaw rate above threshold
    #[default]
    Turning,
    /// Yaw rate below threshold, dwell time not yet reached
    UprightCandidate,
    /// Yaw rate below threshold for at least the dwell time
    UprightConfirmed,
}

impl Stance {
    pub fn is_upright(&self) -> bool {
        matches!(self, Stance::UprightConfirmed)
    }
}

/// What the dispatcher does with each fusion cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Normal fusion: read gyros, correct drift, integrate
    #[default]
    Running,
    /// Zero-rate calibration in progress: raw samples are accumulated, nothing is integrated
    Calibrating(CalibrationKind),
}

/// Which sensor a calibration run produces biases for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationKind {
    /// Device motionless
    Gyroscope,
    /// Device motionless, upright and level
    Accelerometer,
}

/// Internal drift corrector states, for logging and tuning
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AhrsInternalStates {
    /// Drift still waiting to be corrected, per body axis, in radians
    ///
    /// The yaw component is always zero: there is no yaw reference.
    pub pending_error: Vector3<f32>,
    /// Number of drift snapshots taken since the estimator was created
    pub snapshots: u32,
    /// Largest deviation of the orientation matrix from orthonormality
    pub orthonormality_error: f32,
}

/// Estimator status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AhrsFlags {
    /// An attitude has been supplied and the integrator is running
    pub aligned: bool,
    /// Drift corrections are being fed to the integrator
    pub drift_correction: bool,
    /// Current stance
    pub stance: Stance,
}

/// Per-axis zero-rate offsets, in raw sensor counts (body frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Biases {
    pub gyroscope: Vector3<i16>,
    pub accelerometer: Vector3<i16>,
}

impl Default for Biases {
    fn default() -> Self {
        Self {
            gyroscope: Vector3::zeros(),
            accelerometer: Vector3::zeros(),
        }
    }
}
