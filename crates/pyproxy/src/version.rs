//! Identification of the inspected interpreter build.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str};

/// The endianness of a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    #[serde(rename = "little")]
    LittleEndian,
    #[serde(rename = "big")]
    BigEndian,
}

impl Endianness {
    /// The endianness of the host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }
}

/// Width of a machine integer, like a pointer or a C `long`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Width {
    #[serde(rename = "32")]
    W32,
    #[serde(rename = "64")]
    W64,
}

impl Width {
    /// Size in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }
}

/// The data model of the platform the interpreter was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Width of pointers, `Py_ssize_t` and `size_t`.
    pub pointer: Width,
    /// Width of a C `long`.
    pub long: Width,
    pub endianness: Endianness,
}

impl Target {
    /// 64-bit unix-like targets.
    pub const fn lp64() -> Self {
        Self {
            pointer: Width::W64,
            long: Width::W64,
            endianness: Endianness::LittleEndian,
        }
    }

    /// 64-bit windows.
    pub const fn llp64() -> Self {
        Self {
            pointer: Width::W64,
            long: Width::W32,
            endianness: Endianness::LittleEndian,
        }
    }

    /// Any 32-bit target.
    pub const fn ilp32() -> Self {
        Self {
            pointer: Width::W32,
            long: Width::W32,
            endianness: Endianness::LittleEndian,
        }
    }

    /// The data model of the host we are compiled for.
    pub fn host() -> Self {
        let pointer = if cfg!(target_pointer_width = "64") {
            Width::W64
        } else {
            Width::W32
        };

        let long = if cfg!(all(target_pointer_width = "64", not(windows))) {
            Width::W64
        } else {
            Width::W32
        };

        Self {
            pointer,
            long,
            endianness: Endianness::native(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pointer {
            Width::W32 => write!(fmt, "32-bit"),
            Width::W64 => write!(fmt, "64-bit"),
        }
    }
}

/// A `major.minor` python language version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl PythonVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl str::FromStr for PythonVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || Error::VersionFromStr(s.to_string());

        let mut it = s.trim().split('.');
        let major = it.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let minor = it.next().ok_or_else(err)?.parse().map_err(|_| err())?;

        // NB: patch level, if present, doesn't affect struct layouts.
        if let Some(patch) = it.next() {
            if patch.is_empty() || !patch.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(err());
            }
        }

        Ok(Self { major, minor })
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}.{}", self.major, self.minor)
    }
}

/// Identifies an interpreter build for the purpose of struct layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildVersion {
    pub python: PythonVersion,
    pub target: Target,
}

impl BuildVersion {
    pub const fn new(python: PythonVersion, target: Target) -> Self {
        Self { python, target }
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "CPython {} ({})", self.python, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::PythonVersion;

    #[test]
    fn test_parse_version() {
        assert_eq!(PythonVersion::new(3, 7), "3.7".parse().unwrap());
        assert_eq!(PythonVersion::new(2, 7), "2.7.18".parse().unwrap());
        assert_eq!(PythonVersion::new(3, 6), "3.6.0rc1".parse().unwrap());
        assert!("3".parse::<PythonVersion>().is_err());
        assert!("3.x".parse::<PythonVersion>().is_err());
        assert!("3.7.".parse::<PythonVersion>().is_err());
    }
}
