//! Attitude estimator for the horizon-dcm library
//!
//! Ties the orientation matrix to the drift corrector. Once per fusion cycle
//! the corrector's output is added to the gyro rotation and the sum is
//! integrated; until an attitude has been supplied nothing is integrated.

use nalgebra::Vector3;

use crate::dcm::Dcm;
use crate::drift::DriftCorrector;
use crate::log_info;
use crate::types::{AhrsFlags, AhrsInternalStates, AhrsSettings, Attitude, Stance};

/// Main estimator structure
///
/// Not thread safe on its own; see [`crate::SharedAhrs`] for the interrupt-shared
/// wrapper.
#[derive(Debug, Clone, Copy)]
pub struct Ahrs {
    settings: AhrsSettings,
    dcm: Dcm,
    drift: DriftCorrector,
    /// False until the first alignment; integration is suppressed while false
    aligned: bool,
}

impl Ahrs {
    /// Create an unaligned estimator with default settings
    pub fn new() -> Self {
        Self::with_settings(AhrsSettings::default())
    }

    /// Create an unaligned estimator with the given settings
    ///
    /// Never fails and never panics. Use [`AhrsSettings::validate`] to reject
    /// bad settings up front; left unchecked, a dwell is rounded up to whole
    /// cycles and a degenerate time constant corrects drift in a single cycle.
    pub fn with_settings(settings: AhrsSettings) -> Self {
        Self {
            settings,
            dcm: Dcm::identity(),
            drift: DriftCorrector::new(&settings),
            aligned: false,
        }
    }

    pub fn settings(&self) -> AhrsSettings {
        self.settings
    }

    /// Set the attitude, in radians
    ///
    /// Rebuilds the matrix, forgets any pending drift error and makes
    /// `(roll, pitch)` the new home attitude. Callers sharing the estimator
    /// with an interrupt must hold it exclusively for the whole call.
    pub fn align(&mut self, roll: f32, pitch: f32, yaw: f32) {
        self.aligned = false;
        self.dcm = Dcm::from_euler(roll, pitch, yaw);
        self.drift.reset(roll, pitch);
        self.aligned = true;

        let degrees = Attitude::new(roll, pitch, yaw).to_degrees();
        log_info!(
            "imu: aligned roll={} pitch={} yaw={}",
            degrees.x,
            degrees.y,
            degrees.z
        );
    }

    /// Run one fusion cycle
    ///
    /// # Arguments
    /// * `gyro_delta` - Angle turned about each body axis during the cycle, in radians
    /// * `yaw_rate` - Smoothed yaw rate, in radians per second
    pub fn update(&mut self, gyro_delta: Vector3<f32>, yaw_rate: f32) {
        if !self.aligned {
            return;
        }
        let correction = self.drift.update(yaw_rate, &self.dcm);
        self.dcm.rotate(gyro_delta + correction);
    }

    /// Current orientation matrix
    pub fn dcm(&self) -> Dcm {
        self.dcm
    }

    /// Roll angle, in radians
    pub fn roll(&self) -> f32 {
        self.dcm.roll()
    }

    /// Pitch angle, in radians
    pub fn pitch(&self) -> f32 {
        self.dcm.pitch()
    }

    /// Yaw angle, in radians
    pub fn yaw(&self) -> f32 {
        self.dcm.yaw()
    }

    pub fn attitude(&self) -> Attitude {
        self.dcm.attitude()
    }

    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Turn drift correction on or off
    pub fn set_drift_correction(&mut self, enabled: bool) {
        self.drift.set_enabled(enabled);
        log_info!("imu: drift correction {}", if enabled { "on" } else { "off" });
    }

    pub fn drift_correction(&self) -> bool {
        self.drift.is_enabled()
    }

    pub fn stance(&self) -> Stance {
        self.drift.stance()
    }

    /// Home roll and pitch recorded at the last alignment, in radians
    pub fn reference(&self) -> (f32, f32) {
        self.drift.reference()
    }

    pub fn internal_states(&self) -> AhrsInternalStates {
        AhrsInternalStates {
            pending_error: self.drift.pending_error(),
            snapshots: self.drift.snapshots(),
            orthonormality_error: self.dcm.orthonormality_error(),
        }
    }

    pub fn flags(&self) -> AhrsFlags {
        AhrsFlags {
            aligned: self.aligned,
            drift_correction: self.drift.is_enabled(),
            stance: self.drift.stance(),
        }
    }
}

impl Default for Ahrs {
    fn default() -> Self {
        Self::new()
    }
}
