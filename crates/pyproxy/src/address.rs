//! Abstraction to help deal with remote virtual addresses.

use crate::{
    error::Error,
    version::{Endianness, Width},
};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use serde::{Deserialize, Serialize};
use std::{fmt, str};

/// An address in the address space of the inspected process.
///
/// Addresses carry no process identity of their own, they only mean something
/// together with the [ProcessHandle][crate::ProcessHandle] they were read
/// through.
#[derive(Clone, Default, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub(crate) u64);

impl Address {
    /// Construct a new address.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Construct a null pointer.
    pub const fn null() -> Self {
        Self(0)
    }

    /// If the address is null.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Access the raw address.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Decode a pointer-sized address stored in `buf`.
    pub fn decode(buf: &[u8], width: Width, endianness: Endianness) -> Self {
        let n = width.size();

        debug_assert!(
            buf.len() == n,
            "{} (buffer length) != {} (pointer width)",
            buf.len(),
            n
        );

        let value = match endianness {
            Endianness::LittleEndian => LittleEndian::read_uint(buf, n),
            Endianness::BigEndian => BigEndian::read_uint(buf, n),
        };

        Address(value)
    }

    /// Performed a checked add with an address and a size.
    pub fn add(self, rhs: Size) -> Result<Address, Error> {
        let sum = self
            .0
            .checked_add(rhs.0)
            .ok_or_else(|| Error::AddressAdd(self, rhs))?;

        Ok(Address(sum))
    }
}

impl str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        Ok(Address(
            u64::from_str_radix(s, 16).map_err(|_| Error::AddressFromStr)?,
        ))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "0x{:X}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, fmt)
    }
}

/// A size or an offset from a base address.
#[derive(Clone, Copy, Default, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Size(pub(crate) u64);

impl Size {
    /// Construct a new size.
    pub const fn new(value: u64) -> Size {
        Size(value)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "0x{:X}", self.0)
    }
}

impl fmt::Debug for Size {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, fmt)
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, Size};
    use crate::version::{Endianness, Width};

    #[test]
    fn test_parse_address() {
        assert_eq!(Address::new(0xdead_beef), "0xDEADBEEF".parse().unwrap());
        assert_eq!(Address::new(0x10), "10".parse().unwrap());
        assert!("0xnope".parse::<Address>().is_err());
    }

    #[test]
    fn test_decode_address() {
        let buf = [0x78, 0x56, 0x34, 0x12];
        assert_eq!(
            Address::new(0x1234_5678),
            Address::decode(&buf, Width::W32, Endianness::LittleEndian)
        );
        assert_eq!(
            Address::new(0x7856_3412),
            Address::decode(&buf, Width::W32, Endianness::BigEndian)
        );
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(
            Address::new(0x1010),
            Address::new(0x1000).add(Size::new(0x10)).unwrap()
        );
        assert!(Address::new(u64::MAX).add(Size::new(1)).is_err());
    }
}
