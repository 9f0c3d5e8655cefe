// Licensed under the Apache-2.0 license

//! High-level I2C controller abstraction.
//!
//! This module provides safe APIs for configuring, sending, and receiving I2C transactions.
//! It implements embedded-hal compatible interfaces on top of any [`I2cMaster`] and is
//! designed for use in `no_std` environments.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{I2cConfig, Stop};
use crate::i2c::sercom_i2c::{Error, Fault};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub config: I2cConfig,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, config: I2cConfig, logger: L) -> Self {
        Self {
            hardware,
            config,
            logger,
        }
    }

    /// Bring the hardware up with the stored configuration.
    ///
    /// # Errors
    ///
    /// Propagates the hardware initialization failure.
    pub fn init(&mut self) -> Result<(), H::Error> {
        let config = self.config;
        self.hardware.init(&config).inspect_err(|e| {
            self.logger.error_fmt(format_args!("i2c init failed: {e:?}"));
        })
    }
}

impl<H: I2cMaster<Error = Error>, L: Logger> I2cController<H, L> {
    /// Check whether a device acknowledges `addr`.
    ///
    /// # Errors
    ///
    /// Faults other than an address NACK are returned as errors.
    pub fn probe(&mut self, addr: SevenBitAddress) -> Result<bool, Error> {
        match self.hardware.write(addr, &[], Stop::Release) {
            Ok(_) => Ok(true),
            Err(e) if e.fault() == Some(Fault::AddressNack) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware.read(addr, buffer).map(|_| ())
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware.write(addr, bytes, Stop::Release).map(|_| ())
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware.write_read(addr, bytes, buffer)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware.transaction_slice(addr, operations)
    }
}
