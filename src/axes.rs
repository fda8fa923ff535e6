//! Sensor axes remapping and raw sample decoding
//!
//! Every supported device family is mounted so that its axes line up with the
//! body axes after a signed permutation:
//! - x points ahead (roll axis)
//! - y points right (pitch axis)
//! - z points down (yaw axis)
//!
//! Gyro maps follow the right hand rule. Accelerometer maps report the
//! reaction to gravity, so at rest the body z reading is `+one_gee`; that map
//! is generally not a proper rotation.
//!
//! # Example
//! ```
//! use nalgebra::Vector3;
//! use horizon_dcm::axes::{AxisMap, SignedAxis};
//!
//! // Body X = -sensor Y, body Y = +sensor Z, body Z = -sensor X
//! let map = AxisMap::new(SignedAxis::Ny, SignedAxis::Pz, SignedAxis::Nx);
//! let body = map.remap(Vector3::new(1, 2, 3));
//! assert_eq!(body, Vector3::new(-2, 3, -1));
//! ```

use nalgebra::Vector3;

use crate::math::DEG_TO_RAD;

/// Which sensor axis feeds a body axis, and with which sign
///
/// `P` = same direction, `N` = inverted; `x`, `y`, `z` name the sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignedAxis {
    Px,
    Nx,
    Py,
    Ny,
    Pz,
    Nz,
}

impl SignedAxis {
    #[inline]
    fn pick(self, sensor: &Vector3<i16>) -> i16 {
        // saturate so a full-scale negative reading cannot wrap to positive
        match self {
            SignedAxis::Px => sensor.x,
            SignedAxis::Nx => sensor.x.saturating_neg(),
            SignedAxis::Py => sensor.y,
            SignedAxis::Ny => sensor.y.saturating_neg(),
            SignedAxis::Pz => sensor.z,
            SignedAxis::Nz => sensor.z.saturating_neg(),
        }
    }

    fn index(self) -> usize {
        match self {
            SignedAxis::Px | SignedAxis::Nx => 0,
            SignedAxis::Py | SignedAxis::Ny => 1,
            SignedAxis::Pz | SignedAxis::Nz => 2,
        }
    }

    fn sign(self) -> i8 {
        match self {
            SignedAxis::Px | SignedAxis::Py | SignedAxis::Pz => 1,
            SignedAxis::Nx | SignedAxis::Ny | SignedAxis::Nz => -1,
        }
    }
}

/// Source of each body axis, in body x, y, z order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisMap {
    pub x: SignedAxis,
    pub y: SignedAxis,
    pub z: SignedAxis,
}

impl AxisMap {
    /// Sensor axes already match body axes
    pub const IDENTITY: AxisMap = AxisMap::new(SignedAxis::Px, SignedAxis::Py, SignedAxis::Pz);

    pub const fn new(x: SignedAxis, y: SignedAxis, z: SignedAxis) -> Self {
        Self { x, y, z }
    }

    /// Remap a sensor-frame sample to the body frame
    #[inline]
    pub fn remap(&self, sensor: Vector3<i16>) -> Vector3<i16> {
        Vector3::new(self.x.pick(&sensor), self.y.pick(&sensor), self.z.pick(&sensor))
    }

    /// True when every sensor axis is used exactly once
    pub fn is_permutation(&self) -> bool {
        let (a, b, c) = (self.x.index(), self.y.index(), self.z.index());
        a != b && b != c && a != c
    }

    /// True when the map is a proper rotation (determinant +1)
    pub fn is_rotation(&self) -> bool {
        if !self.is_permutation() {
            return false;
        }
        let indices = [self.x.index(), self.y.index(), self.z.index()];
        // even permutations of (0, 1, 2) are the cyclic shifts
        let even = matches!(indices, [0, 1, 2] | [1, 2, 0] | [2, 0, 1]);
        let sign = self.x.sign() * self.y.sign() * self.z.sign();
        (sign == 1) == even
    }
}

impl Default for AxisMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Register byte order of a device's 16 bit output words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Scale factors, byte layout and axis maps for one sensor family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub name: &'static str,
    /// Radians per second per gyro count
    pub gyro_scale: f32,
    /// Gees per accelerometer count
    pub accel_scale: f32,
    /// Accelerometer reading for 1 g
    pub one_gee: i16,
    pub byte_order: ByteOrder,
    /// Right shift applied to left-justified accelerometer words
    pub accel_shift: u8,
    pub gyro_axes: AxisMap,
    pub accel_axes: AxisMap,
}

impl DeviceProfile {
    /// Invensense MPU-6050 at +/-250 deg/s and +/-2 g
    pub const MPU6050: DeviceProfile = DeviceProfile {
        name: "mpu6050",
        gyro_scale: 2.0 * 250.0 * DEG_TO_RAD / 65536.0,
        accel_scale: 2.0 * 2.0 / 65536.0,
        one_gee: 16384,
        byte_order: ByteOrder::BigEndian,
        accel_shift: 0,
        gyro_axes: AxisMap::new(SignedAxis::Ny, SignedAxis::Pz, SignedAxis::Nx),
        accel_axes: AxisMap::new(SignedAxis::Py, SignedAxis::Nz, SignedAxis::Px),
    };

    /// Pololu MinIMU-9 v2 (L3GD20 gyro, LSM303DLHC accelerometer) at +/-250 deg/s and +/-2 g
    pub const MINIMU9_V2: DeviceProfile = DeviceProfile {
        name: "minimu9-v2",
        gyro_scale: 0.00875 * DEG_TO_RAD,
        accel_scale: 0.001,
        one_gee: 1000,
        byte_order: ByteOrder::LittleEndian,
        accel_shift: 4,
        gyro_axes: AxisMap::new(SignedAxis::Ny, SignedAxis::Pz, SignedAxis::Nx),
        accel_axes: AxisMap::new(SignedAxis::Py, SignedAxis::Nz, SignedAxis::Px),
    };

    /// Decode six gyro output bytes (x, y, z words) into a body-frame sample
    pub fn decode_gyro(&self, bytes: &[u8; 6]) -> Vector3<i16> {
        self.gyro_axes.remap(self.words(bytes))
    }

    /// Decode six accelerometer output bytes into a body-frame sample
    pub fn decode_accel(&self, bytes: &[u8; 6]) -> Vector3<i16> {
        let words = self.words(bytes).map(|w| w >> self.accel_shift);
        self.accel_axes.remap(words)
    }

    fn words(&self, bytes: &[u8; 6]) -> Vector3<i16> {
        let word = |i: usize| {
            let pair = [bytes[i], bytes[i + 1]];
            match self.byte_order {
                ByteOrder::BigEndian => i16::from_be_bytes(pair),
                ByteOrder::LittleEndian => i16::from_le_bytes(pair),
            }
        };
        Vector3::new(word(0), word(2), word(4))
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::MPU6050
    }
}
