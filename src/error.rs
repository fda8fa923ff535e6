//! Error types
//!
//! The estimator itself never fails. Errors only come from the operator-side
//! procedures: calibration, scheduler configuration and stored configuration.

/// Errors from calibration, settings validation and configuration decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Calibration finished before a single sample was accumulated
    NoSamples,
    /// Calibration finished while none was in progress
    NotCalibrating,
    /// Tick rate is not a power-of-two multiple of the dispatch rate
    InvalidDivider { tick_rate: u32, dispatch_rate: u32 },
    /// A settings field is out of range (non-positive time constant, etc.)
    InvalidSettings,
    /// Stored configuration does not start with the expected magic number
    BadMagic,
    /// Stored configuration was written by an unknown format version
    UnsupportedVersion(u16),
    /// Stored configuration failed its CRC check
    ChecksumMismatch,
    /// Stored configuration is shorter than the fixed blob size
    Truncated,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NoSamples => write!(f, "calibration accumulated no samples"),
            Error::NotCalibrating => write!(f, "no calibration in progress"),
            Error::InvalidDivider {
                tick_rate,
                dispatch_rate,
            } => write!(
                f,
                "tick rate {tick_rate} Hz is not a power-of-two multiple of dispatch rate {dispatch_rate} Hz"
            ),
            Error::InvalidSettings => write!(f, "invalid estimator settings"),
            Error::BadMagic => write!(f, "stored configuration has bad magic"),
            Error::UnsupportedVersion(v) => {
                write!(f, "stored configuration version {v} is not supported")
            }
            Error::ChecksumMismatch => write!(f, "stored configuration checksum mismatch"),
            Error::Truncated => write!(f, "stored configuration is truncated"),
        }
    }
}

impl core::error::Error for Error {}
