//! Gyro drift correction for the horizon-dcm library
//!
//! There is no absolute attitude reference on board, so drift is measured by
//! inference: whenever the yaw rate has stayed near zero for long enough, the
//! vehicle is assumed to be upright and back at the roll/pitch it had when the
//! estimator was aligned. Whatever the matrix says beyond that is drift.
//!
//! The measured error is not applied in one step. Each cycle removes a fixed
//! fraction `K = 1 / (T * C)` of what is left, so the remainder decays with
//! time constant `T`.
//!
//! The spreading is only exact when no rotation about a different axis
//! happens while a correction is still being paid out. Rolling into a turn
//! mid-correction leaves small cross-axis artifacts; a short time constant
//! keeps them small.

use nalgebra::{ComplexField, Vector3};

use crate::dcm::Dcm;
use crate::types::{AhrsSettings, Stance};

/// Stance classifier and spread-out drift correction
#[derive(Debug, Clone, Copy)]
pub struct DriftCorrector {
    /// Yaw rate magnitude at or below which the vehicle may be upright, rad/s
    rate_threshold: f32,
    /// Dispatch cycles the low yaw rate must persist
    dwell_cycles: u32,
    /// Consecutive dispatch cycles with low yaw rate
    timer: u32,
    /// Fraction of the pending error applied per cycle
    gain: f32,
    /// Roll and pitch the vehicle is driven back toward when upright
    reference: (f32, f32),
    /// Drift believed to remain in the matrix, per body axis, in radians
    pending: Vector3<f32>,
    /// Whether corrections are fed to the integrator
    enabled: bool,
    stance: Stance,
    snapshots: u32,
}

impl DriftCorrector {
    /// Create a corrector with the given settings
    ///
    /// # Example
    /// ```
    /// use horizon_dcm::{AhrsSettings, DriftCorrector};
    ///
    /// let settings = AhrsSettings::default();
    /// let corrector = DriftCorrector::new(&settings);
    /// assert_eq!(corrector.dwell_cycles(), 10); // 40 ms at 250 Hz
    /// ```
    ///
    /// Settings are not validated here. A dwell that is not a whole number of
    /// cycles is rounded up. A time constant too short to spread over one cycle
    /// (zero, negative or NaN included) pays out the whole error at once.
    pub fn new(settings: &AhrsSettings) -> Self {
        let rate = settings.dispatch_rate as f32;
        Self {
            rate_threshold: settings.rate_threshold,
            dwell_cycles: dwell_cycles(settings.dwell_time, rate),
            timer: 0,
            gain: payout_gain(settings.time_constant, rate),
            reference: (0.0, 0.0),
            pending: Vector3::zeros(),
            enabled: true,
            stance: Stance::Turning,
            snapshots: 0,
        }
    }

    /// Forget any pending error and drive toward a new home roll/pitch
    pub fn reset(&mut self, roll: f32, pitch: f32) {
        self.reference = (roll, pitch);
        self.pending = Vector3::zeros();
        self.timer = 0;
        self.stance = Stance::Turning;
    }

    /// Run one cycle and return the correction to add to the gyro rotation
    ///
    /// 1. Classify stance from the smoothed yaw rate.
    /// 2. On the cycle the upright stance is confirmed, snapshot the drift error
    ///    with the small-angle approximation (yaw error is always taken as zero).
    /// 3. Pay out `K` of the pending error.
    ///
    /// When disabled the pending error still decays, but the returned
    /// correction is zero.
    pub fn update(&mut self, yaw_rate: f32, dcm: &Dcm) -> Vector3<f32> {
        if self.classify(yaw_rate) {
            let (roll, pitch) = dcm.small_angle_tilt();
            self.pending = Vector3::new(roll - self.reference.0, pitch - self.reference.1, 0.0);
            self.snapshots = self.snapshots.wrapping_add(1);
        }

        let correction = -self.pending * self.gain;
        self.pending += correction;

        if self.enabled {
            correction
        } else {
            Vector3::zeros()
        }
    }

    /// Advance the stance state machine; true on the cycle upright is confirmed
    fn classify(&mut self, yaw_rate: f32) -> bool {
        if yaw_rate.abs() > self.rate_threshold {
            self.timer = 0;
            self.stance = Stance::Turning;
            return false;
        }

        self.timer = self.timer.saturating_add(1);
        if self.timer < self.dwell_cycles {
            self.stance = Stance::UprightCandidate;
            return false;
        }

        let entering = self.stance != Stance::UprightConfirmed;
        self.stance = Stance::UprightConfirmed;
        entering
    }

    /// Enable or disable the correction output
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current stance
    pub fn stance(&self) -> Stance {
        self.stance
    }

    /// Error still waiting to be corrected, in radians
    pub fn pending_error(&self) -> Vector3<f32> {
        self.pending
    }

    /// Home roll and pitch, in radians
    pub fn reference(&self) -> (f32, f32) {
        self.reference
    }

    /// Number of drift snapshots taken since creation
    pub fn snapshots(&self) -> u32 {
        self.snapshots
    }

    /// Fraction of the pending error applied per cycle
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Dispatch cycles of low yaw rate needed before a snapshot
    pub fn dwell_cycles(&self) -> u32 {
        self.dwell_cycles
    }
}

/// Whole dispatch cycles covering at least `dwell_time` seconds
fn dwell_cycles(dwell_time: f32, rate: f32) -> u32 {
    // float error must not push an exact multiple up a cycle
    let cycles = dwell_time * rate - 1e-3;
    if cycles > 0.0 { cycles.ceil() as u32 } else { 0 }
}

/// Fraction of the pending error paid out per cycle, within (0, 1]
fn payout_gain(time_constant: f32, rate: f32) -> f32 {
    let gain = 1.0 / (time_constant * rate);
    if gain > 0.0 && gain <= 1.0 { gain } else { 1.0 }
}
