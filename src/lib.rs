#![no_std]

//! Horizon DCM - A strapdown attitude estimator for horizon-stabilized camera mounts
//!
//! Estimates roll, pitch and yaw of a vehicle (typically a motorcycle) from
//! rate gyros alone. There is no magnetometer and no GPS; drift is corrected
//! by inference. Whenever the yaw rate has stayed near zero for a moment the
//! vehicle is assumed to be upright, and whatever roll and pitch the estimator
//! reports beyond the home attitude is treated as drift and bled off slowly.
//!
//! # Features
//!
//! - Direction cosine matrix integrator with trig-free re-orthonormalization
//! - Stance-based drift correction spread over a configurable time constant
//! - Zero-rate bias calibration and accelerometer level alignment
//! - Interrupt-shared state behind `critical-section`
//! - Tick-rate time base with fusion cycle dispatch and duration budget
//! - CRC-checked persistent configuration blob
//! - `#![no_std]` compatible for embedded systems, optional `defmt` logging
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use horizon_dcm::{Ahrs, AhrsSettings};
//!
//! let settings = AhrsSettings::default();
//! let mut ahrs = Ahrs::with_settings(settings);
//! ahrs.align(0.0, 0.0, 0.0);
//!
//! // one 4 ms fusion cycle: angle turned about each axis, and the smoothed yaw rate
//! let gyro_delta = Vector3::new(0.001, 0.0, 0.0); // rad
//! let yaw_rate = 0.0; // rad/s
//! ahrs.update(gyro_delta, yaw_rate);
//!
//! let attitude = ahrs.attitude();
//! assert!((attitude.roll - 0.001).abs() < 1e-5);
//! ```
//!
//! On a target, wrap the sensor in a [`SharedAhrs`] and call
//! [`SharedAhrs::dispatch`] from the timer interrupt through a [`Ticker`].

#[cfg(test)]
extern crate std;

mod ahrs;
pub mod axes;
pub mod calibration;
mod dcm;
mod drift;
mod error;
mod logging;
mod math;
pub mod sensor;
mod shared;
pub mod storage;
pub mod ticker;
mod types;

// Re-export all public types and functions
pub use ahrs::Ahrs;
pub use axes::{AxisMap, ByteOrder, DeviceProfile, SignedAxis};
pub use calibration::{Accumulator, remove_bias};
pub use dcm::Dcm;
pub use drift::DriftCorrector;
pub use error::Error;
pub use math::{DEG_TO_RAD, Matrix3Ext, RAD_TO_DEG};
pub use sensor::Sensors;
pub use shared::{LEVEL_READINGS, RawImu, SharedAhrs};
pub use storage::StoredConfig;
pub use ticker::{CycleCounter, Ticker};
pub use types::*;
