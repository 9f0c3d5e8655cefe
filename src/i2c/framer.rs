// Licensed under the Apache-2.0 license

//! Register address framing for devices with an internal linear address space.

use crate::i2c::sercom_i2c::Error;
use heapless::Vec;

/// Width of a device's register pointer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressSize {
    One,
    Two,
}

impl AddressSize {
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            AddressSize::One => 1,
            AddressSize::Two => 2,
        }
    }
}

impl TryFrom<u8> for AddressSize {
    type Error = Error;

    fn try_from(size: u8) -> Result<Self, Self::Error> {
        match size {
            1 => Ok(AddressSize::One),
            2 => Ok(AddressSize::Two),
            _ => Err(Error::InvalidAddressSize),
        }
    }
}

/// A register offset together with the number of bytes used to send it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterAddress {
    pub offset: u16,
    pub size: AddressSize,
}

impl RegisterAddress {
    #[must_use]
    pub const fn new(offset: u16, size: AddressSize) -> Self {
        Self { offset, size }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.size.len()
    }

    /// Big-endian pointer bytes. A one-byte address keeps only the low byte
    /// of the offset.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8, 2> {
        let [hi, lo] = self.offset.to_be_bytes();
        let mut framed = Vec::new();
        if self.size == AddressSize::Two {
            // Capacity is 2, neither push can fail.
            let _ = framed.push(hi);
        }
        let _ = framed.push(lo);
        framed
    }
}

impl From<u8> for RegisterAddress {
    fn from(offset: u8) -> Self {
        Self::new(u16::from(offset), AddressSize::One)
    }
}
