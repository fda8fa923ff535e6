//! Persistent configuration blob
//!
//! Calibration biases and the mount attitude survive power cycles as a fixed
//! size little-endian blob. Where it is written (EEPROM, flash page) is up to
//! the caller.
//!
//! Layout:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic `"HDCM"`                          |
//! | 4      | 2    | format version                          |
//! | 6      | 1    | flags (bit 0 = ready)                   |
//! | 7      | 1    | reserved                                |
//! | 8      | 6    | gyro bias x, y, z (`i16`)               |
//! | 14     | 6    | accelerometer bias x, y, z (`i16`)      |
//! | 20     | 12   | mount roll, pitch, yaw (`f32`, radians) |
//! | 32     | 4    | CRC-32 of bytes 0..32                   |

use crc::{CRC_32_ISO_HDLC, Crc};
use nalgebra::Vector3;

use crate::error::Error;
use crate::types::{Attitude, Biases};

/// Blob magic number (ASCII "HDCM")
pub const CONFIG_MAGIC: u32 = 0x4D43_4448;

/// Blob format version
pub const CONFIG_VERSION: u16 = 1;

/// CRC32 algorithm (ISO HDLC / Ethernet / ZIP)
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const FLAG_READY: u8 = 0x01;

/// Settings restored at startup
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StoredConfig {
    /// Calibration completed; normal startup instead of setup mode
    pub ready: bool,
    pub biases: Biases,
    /// Camera attitude with respect to the vehicle, restored as the home attitude
    pub mount: Attitude,
}

impl StoredConfig {
    /// Size of the encoded blob in bytes
    pub const SIZE: usize = 36;

    const PAYLOAD: usize = Self::SIZE - 4;

    /// Serialize to bytes (little-endian)
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&CONFIG_VERSION.to_le_bytes());
        buf[6] = if self.ready { FLAG_READY } else { 0 };
        write_vector(&mut buf[8..14], self.biases.gyroscope);
        write_vector(&mut buf[14..20], self.biases.accelerometer);
        buf[20..24].copy_from_slice(&self.mount.roll.to_le_bytes());
        buf[24..28].copy_from_slice(&self.mount.pitch.to_le_bytes());
        buf[28..32].copy_from_slice(&self.mount.yaw.to_le_bytes());

        let crc = CRC32.checksum(&buf[..Self::PAYLOAD]);
        buf[Self::PAYLOAD..].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize from bytes (little-endian)
    ///
    /// Trailing bytes past [`StoredConfig::SIZE`] are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::Truncated);
        }

        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != CONFIG_MAGIC {
            return Err(Error::BadMagic);
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != CONFIG_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let stored_crc = u32::from_le_bytes([buf[32], buf[33], buf[34], buf[35]]);
        if CRC32.checksum(&buf[..Self::PAYLOAD]) != stored_crc {
            return Err(Error::ChecksumMismatch);
        }

        Ok(Self {
            ready: buf[6] & FLAG_READY != 0,
            biases: Biases {
                gyroscope: read_vector(&buf[8..14]),
                accelerometer: read_vector(&buf[14..20]),
            },
            mount: Attitude::new(read_f32(&buf[20..24]), read_f32(&buf[24..28]), read_f32(&buf[28..32])),
        })
    }
}

fn write_vector(buf: &mut [u8], v: Vector3<i16>) {
    for (chunk, value) in buf.chunks_exact_mut(2).zip(v.iter()) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

fn read_vector(buf: &[u8]) -> Vector3<i16> {
    let word = |i: usize| i16::from_le_bytes([buf[i], buf[i + 1]]);
    Vector3::new(word(0), word(2), word(4))
}

fn read_f32(buf: &[u8]) -> f32 {
    f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
