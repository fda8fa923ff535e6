//! Zero-rate calibration for the horizon-dcm library
//!
//! Biases are plain per-axis means over a window of samples taken while the
//! device is held still. The accelerometer is additionally expected to be
//! upright and level, so its z mean carries one gee of gravity that must not
//! be counted as bias.

use nalgebra::Vector3;

use crate::error::Error;

/// Subtract a bias from a raw body-frame sample
///
/// Saturates instead of wrapping, so a reading near full scale stays near
/// full scale.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use horizon_dcm::calibration::remove_bias;
///
/// let raw = Vector3::new(12, -3, 16390);
/// let bias = Vector3::new(10, -5, 6);
/// assert_eq!(remove_bias(raw, bias), Vector3::new(2, 2, 16384));
/// ```
#[inline]
pub fn remove_bias(raw: Vector3<i16>, bias: Vector3<i16>) -> Vector3<i16> {
    raw.zip_map(&bias, |r, b| r.saturating_sub(b))
}

/// Running per-axis sum of raw samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    sum: Vector3<i32>,
    count: u32,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            sum: Vector3::zeros(),
            count: 0,
        }
    }

    /// Add one raw sample
    ///
    /// An `i32` sum holds at least 65536 full-scale samples, more than four
    /// minutes at 250 Hz; samples past that point are dropped.
    pub fn add(&mut self, sample: Vector3<i16>) {
        let widened = sample.map(i32::from);
        let Some(x) = self.sum.x.checked_add(widened.x) else {
            return;
        };
        let Some(y) = self.sum.y.checked_add(widened.y) else {
            return;
        };
        let Some(z) = self.sum.z.checked_add(widened.z) else {
            return;
        };
        self.sum = Vector3::new(x, y, z);
        self.count += 1;
    }

    /// Number of samples accumulated
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Discard everything accumulated so far
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Mean of the accumulated samples
    pub fn mean(&self) -> Result<Vector3<i16>, Error> {
        if self.count == 0 {
            return Err(Error::NoSamples);
        }
        let count = self.count as i32;
        // the mean of i16 samples always fits back in an i16
        Ok(self.sum.map(|s| (s / count) as i16))
    }

    /// Gyroscope bias: the plain mean
    pub fn gyro_bias(&self) -> Result<Vector3<i16>, Error> {
        self.mean()
    }

    /// Accelerometer bias: the mean, less one gee of gravity on the z axis
    pub fn accel_bias(&self, one_gee: i16) -> Result<Vector3<i16>, Error> {
        let mut bias = self.mean()?;
        bias.z = bias.z.saturating_sub(one_gee);
        Ok(bias)
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_GEE: i16 = 16384;

    #[test]
    fn test_remove_bias() {
        let raw = Vector3::new(100, -100, 0);
        let bias = Vector3::new(10, -10, 5);
        assert_eq!(remove_bias(raw, bias), Vector3::new(90, -90, -5));
    }

    #[test]
    fn test_remove_bias_saturates() {
        let raw = Vector3::new(i16::MIN, i16::MAX, 0);
        let bias = Vector3::new(10, -10, 0);
        assert_eq!(remove_bias(raw, bias), Vector3::new(i16::MIN, i16::MAX, 0));
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = Accumulator::new();
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.gyro_bias(), Err(Error::NoSamples));
        assert_eq!(acc.accel_bias(ONE_GEE), Err(Error::NoSamples));
    }

    #[test]
    fn test_level_accelerometer_has_zero_bias() {
        let mut acc = Accumulator::new();
        for _ in 0..1000 {
            acc.add(Vector3::new(0, 0, ONE_GEE));
        }
        assert_eq!(acc.accel_bias(ONE_GEE), Ok(Vector3::zeros()));
    }

    #[test]
    fn test_offset_samples_recover_offset() {
        let delta = Vector3::new(37, -12, 5);
        let mut acc = Accumulator::new();
        for i in 0..500 {
            // symmetric noise around the offset
            let noise = if i % 2 == 0 { 3 } else { -3 };
            acc.add(delta + Vector3::new(noise, -noise, noise));
        }
        assert_eq!(acc.gyro_bias(), Ok(delta));

        let mut acc = Accumulator::new();
        for _ in 0..500 {
            acc.add(delta + Vector3::new(0, 0, ONE_GEE));
        }
        assert_eq!(acc.accel_bias(ONE_GEE), Ok(delta));
    }

    #[test]
    fn test_clear() {
        let mut acc = Accumulator::new();
        acc.add(Vector3::new(1, 2, 3));
        acc.clear();
        assert_eq!(acc.count(), 0);
        assert_eq!(acc, Accumulator::default());
    }

    #[test]
    fn test_overflow_drops_samples() {
        let mut acc = Accumulator::new();
        let full = Vector3::new(i16::MAX, 0, 0);
        let capacity = (i32::MAX / i16::MAX as i32) as u32;
        for _ in 0..capacity + 10 {
            acc.add(full);
        }
        assert_eq!(acc.count(), capacity);
        assert_eq!(acc.gyro_bias(), Ok(full));
    }
}
