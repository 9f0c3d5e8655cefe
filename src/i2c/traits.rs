// Licensed under the Apache-2.0 license

//! # I2C hardware abstraction traits
//!
//! Two layers, each with a single responsibility:
//!
//! ```text
//! I2cHardwareCore (bring-up, timing, recovery)
//!     └── I2cMaster (blocking transfers and register access)
//! ```
//!
//! Device drivers depend on [`I2cMaster`] only. The `embedded-hal` view of a
//! bus is provided separately by [`crate::i2c::i2c_controller::I2cController`].

use crate::i2c::common::{I2cConfig, I2cSpeed, Stop};
use crate::i2c::framer::RegisterAddress;
use crate::i2c::registers::BusStatus;
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};
use fugit::HertzU32;

/// Core I2C hardware interface providing basic operations
///
/// # Examples
///
/// ```rust,ignore
/// use samd21_ddk::i2c::{I2cConfigBuilder, I2cHardwareCore, I2cSpeed};
///
/// fn setup_i2c<T: I2cHardwareCore>(controller: &mut T) -> Result<(), T::Error> {
///     let config = I2cConfigBuilder::new().speed(I2cSpeed::Fast).build();
///     controller.init(&config)
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Program mode, timing and enable the peripheral.
    ///
    /// # Errors
    ///
    /// Fails if the peripheral is already enabled, if the requested speed
    /// cannot be derived from the source clock, or if register
    /// synchronization does not complete.
    fn init(&mut self, config: &I2cConfig) -> Result<(), Self::Error>;

    /// Disable the peripheral and put it back into its reset state.
    ///
    /// # Errors
    ///
    /// Fails if register synchronization does not complete.
    fn deinit(&mut self) -> Result<(), Self::Error>;

    /// Program the baud divisor for `speed` given the peripheral source clock.
    ///
    /// Returns the divisor written to hardware.
    ///
    /// # Errors
    ///
    /// Returns an error if the divisor does not fit the hardware field, or
    /// if the peripheral is enabled (the divisor is only writable while it
    /// is disabled).
    fn configure_timing(&mut self, speed: I2cSpeed, source: HertzU32)
        -> Result<u8, Self::Error>;

    /// Snapshot of the bus as seen by the peripheral.
    fn bus_status(&self) -> BusStatus;

    /// Attempt to recover the bus from a device holding SDA low.
    ///
    /// # Errors
    ///
    /// Returns an error if SDA is still held low after the recovery sequence.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C master mode operations
///
/// All transfers are blocking. Every method returns the number of payload
/// bytes moved; on failure the error reports how far the transfer got.
///
/// # Examples
///
/// ```rust,ignore
/// use samd21_ddk::i2c::{I2cMaster, RegisterAddress};
///
/// fn read_sensor<T: I2cMaster>(i2c: &mut T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.read_registers(0x48, RegisterAddress::from(0x00), &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write `bytes` to the device at `addr`.
    ///
    /// With [`Stop::Hold`] the bus stays owned and the next transaction on
    /// this handle begins with a repeated START.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not acknowledge its address or a
    /// data byte, on a bus error, or when a poll budget runs out.
    fn write(&mut self, addr: A, bytes: &[u8], stop: Stop) -> Result<usize, Self::Error>;

    /// Read `buffer.len()` bytes from the device at `addr`, then STOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not acknowledge its address, on a
    /// bus error, or when a poll budget runs out.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write the register pointer followed by `bytes` as one contiguous
    /// transfer.
    ///
    /// # Errors
    ///
    /// As [`I2cMaster::write`]; the transferred count excludes pointer bytes.
    fn write_registers(
        &mut self,
        addr: A,
        register: RegisterAddress,
        bytes: &[u8],
        stop: Stop,
    ) -> Result<usize, Self::Error>;

    /// Set the register pointer, then read `buffer.len()` bytes after a
    /// repeated START.
    ///
    /// # Errors
    ///
    /// As [`I2cMaster::write`] for the pointer phase and [`I2cMaster::read`]
    /// for the data phase. A failed pointer phase reports no bytes
    /// transferred.
    fn read_registers(
        &mut self,
        addr: A,
        register: RegisterAddress,
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error>;

    /// Combined write-then-read with a repeated START between the phases.
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>
    where
        A: Copy,
    {
        self.write(addr, bytes, Stop::Hold)?;
        self.read(addr, buffer).map(|_| ())
    }

    /// Execute a sequence of operations as one transaction: adjacent
    /// operations of the same direction are merged, a repeated START
    /// separates direction changes and a single STOP ends the sequence.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the bus is released.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

impl<T: I2cHardwareCore + ?Sized> I2cHardwareCore for &mut T {
    type Error = T::Error;

    fn init(&mut self, config: &I2cConfig) -> Result<(), Self::Error> {
        (**self).init(config)
    }

    fn deinit(&mut self) -> Result<(), Self::Error> {
        (**self).deinit()
    }

    fn configure_timing(&mut self, speed: I2cSpeed, source: HertzU32)
        -> Result<u8, Self::Error> {
        (**self).configure_timing(speed, source)
    }

    fn bus_status(&self) -> BusStatus {
        (**self).bus_status()
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        (**self).recover_bus()
    }
}

impl<A: AddressMode, T: I2cMaster<A> + ?Sized> I2cMaster<A> for &mut T {
    fn write(&mut self, addr: A, bytes: &[u8], stop: Stop) -> Result<usize, Self::Error> {
        (**self).write(addr, bytes, stop)
    }

    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(addr, buffer)
    }

    fn write_registers(
        &mut self,
        addr: A,
        register: RegisterAddress,
        bytes: &[u8],
        stop: Stop,
    ) -> Result<usize, Self::Error> {
        (**self).write_registers(addr, register, bytes, stop)
    }

    fn read_registers(
        &mut self,
        addr: A,
        register: RegisterAddress,
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error> {
        (**self).read_registers(addr, register, buffer)
    }

    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        (**self).transaction_slice(addr, ops_slice)
    }
}
