// Licensed under the Apache-2.0 license

//! Register-level boundary between the I2C engine and a SERCOM block.
//!
//! [`HardwareInterface`] is the only surface the engine touches. It is
//! implemented by [`Sercom`] for the real peripheral (through the PAC) and by the
//! simulated bus used in the unit tests. Only the semantic operations matter to
//! the engine; the bit fields live in [`crate::i2c::registers`].

use crate::i2c::common::BusInstance;
use crate::i2c::registers::{Flags, Status};
use crate::i2c::system_setup::port;
use crate::pac;
use crate::pac::sercom0::I2CM;
use core::marker::PhantomData;

/// Read/modify/write access to one SERCOM I2C master block.
pub trait HardwareInterface {
    /// Physical bus this interface is wired to.
    fn instance(&self) -> BusInstance;

    fn read_ctrla(&self) -> u32;
    fn write_ctrla(&mut self, value: u32);
    fn read_ctrlb(&self) -> u32;
    fn write_ctrlb(&mut self, value: u32);
    fn read_baud(&self) -> u32;
    fn write_baud(&mut self, value: u32);
    fn read_status(&self) -> Status;
    /// Write-one-to-clear for the flag bits; BUSSTATE is written as a value.
    fn write_status(&mut self, value: Status);
    fn read_flags(&self) -> Flags;
    fn read_syncbusy(&self) -> u32;
    /// Writing ADDR starts a transaction (or a repeated start).
    fn write_addr(&mut self, value: u32);
    fn read_data(&mut self) -> u8;
    fn write_data(&mut self, value: u8);

    /// Hand SDA/SCL to GPIO, both released (pulled high externally).
    fn detach_lines(&mut self);
    /// Give SDA/SCL back to the SERCOM.
    fn attach_lines(&mut self);
    /// Drive SCL low (`false`) or release it (`true`) while detached.
    fn set_scl(&mut self, high: bool);
    /// Drive SDA low (`false`) or release it (`true`) while detached.
    fn set_sda(&mut self, high: bool);
    fn sda_is_high(&self) -> bool;
    /// Wait roughly half an SCL period at the configured speed.
    fn half_period_delay(&mut self, cycles: u32) {
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}

/// Static description of a SERCOM instance usable as an I2C master.
pub trait Instance {
    const BUS: BusInstance;

    /// I2C master view of the instance's register block.
    fn registers() -> &'static I2CM;
}

/// SERCOM0: SDA on PA08, SCL on PA09.
pub struct Sercom0;

/// SERCOM1: SDA on PA22, SCL on PA23.
pub struct Sercom1;

impl Instance for Sercom0 {
    const BUS: BusInstance = BusInstance::Twi0;

    fn registers() -> &'static I2CM {
        // SAFETY: the PAC pointer is valid for the whole program; exclusive
        // use of the block is guaranteed by the take-once token.
        let sercom: &'static pac::sercom0::RegisterBlock = unsafe { &*pac::SERCOM0::ptr() };
        sercom.i2cm()
    }
}

impl Instance for Sercom1 {
    const BUS: BusInstance = BusInstance::Twi1;

    fn registers() -> &'static I2CM {
        // SAFETY: as for SERCOM0.
        let sercom: &'static pac::sercom0::RegisterBlock = unsafe { &*pac::SERCOM1::ptr() };
        sercom.i2cm()
    }
}

/// SERCOM block in I2C master mode, accessed through the PAC.
///
/// Constructed only through [`crate::i2c::hardware_instantiation`], which
/// hands out at most one `Sercom` per physical instance.
pub struct Sercom<I: Instance> {
    _instance: PhantomData<I>,
}

impl<I: Instance> Sercom<I> {
    pub(crate) fn new() -> Self {
        Self {
            _instance: PhantomData,
        }
    }
}

impl<I: Instance> HardwareInterface for Sercom<I> {
    fn instance(&self) -> BusInstance {
        I::BUS
    }

    fn read_ctrla(&self) -> u32 {
        I::registers().ctrla.read().bits()
    }

    fn write_ctrla(&mut self, value: u32) {
        I::registers().ctrla.write(|w| unsafe { w.bits(value) });
    }

    fn read_ctrlb(&self) -> u32 {
        I::registers().ctrlb.read().bits()
    }

    fn write_ctrlb(&mut self, value: u32) {
        I::registers().ctrlb.write(|w| unsafe { w.bits(value) });
    }

    fn read_baud(&self) -> u32 {
        I::registers().baud.read().bits()
    }

    fn write_baud(&mut self, value: u32) {
        I::registers().baud.write(|w| unsafe { w.bits(value) });
    }

    fn read_status(&self) -> Status {
        Status::from_bits_retain(I::registers().status.read().bits())
    }

    fn write_status(&mut self, value: Status) {
        I::registers().status.write(|w| unsafe { w.bits(value.bits()) });
    }

    fn read_flags(&self) -> Flags {
        Flags::from_bits_truncate(I::registers().intflag.read().bits())
    }

    fn read_syncbusy(&self) -> u32 {
        I::registers().syncbusy.read().bits()
    }

    fn write_addr(&mut self, value: u32) {
        I::registers().addr.write(|w| unsafe { w.bits(value) });
    }

    fn read_data(&mut self) -> u8 {
        I::registers().data.read().bits()
    }

    fn write_data(&mut self, value: u8) {
        I::registers().data.write(|w| unsafe { w.bits(value) });
    }

    fn detach_lines(&mut self) {
        let pins = I::BUS.pins();
        port::release(pins.sda);
        port::release(pins.scl);
        port::set_pmux_enabled(pins.sda, false);
        port::set_pmux_enabled(pins.scl, false);
    }

    fn attach_lines(&mut self) {
        let pins = I::BUS.pins();
        port::release(pins.sda);
        port::release(pins.scl);
        port::set_pmux_enabled(pins.sda, true);
        port::set_pmux_enabled(pins.scl, true);
    }

    fn set_scl(&mut self, high: bool) {
        port::drive_open_drain(I::BUS.pins().scl, high);
    }

    fn set_sda(&mut self, high: bool) {
        port::drive_open_drain(I::BUS.pins().sda, high);
    }

    fn sda_is_high(&self) -> bool {
        port::is_high(I::BUS.pins().sda)
    }
}
