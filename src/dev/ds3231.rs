// Licensed under the Apache-2.0 license

//! DS3231 real-time clock.

use crate::i2c::common::Stop;
use crate::i2c::framer::RegisterAddress;
use crate::i2c::sercom_i2c::Error;
use crate::i2c::traits::I2cMaster;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

pub const ADDRESS: u8 = 0x68;
pub const REG_TIME: u8 = 0x00;
pub const REG_STATUS: u8 = 0x0F;
/// Oscillator stop flag in the status register.
pub const STATUS_OSF: u8 = 1 << 7;

/// Year stored as register value zero.
const BASE_YEAR: u16 = 2000;

/// Calendar time in 24-hour format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Timekeeping registers 0x00..=0x06, all BCD.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct TimeRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    weekday: u8,
    date: u8,
    month: u8,
    year: u8,
}

const fn bcd_to_dec(bcd: u8) -> u8 {
    (bcd & 0x0F) + (bcd >> 4) * 10
}

const fn dec_to_bcd(dec: u8) -> u8 {
    ((dec / 10) << 4) | (dec % 10)
}

impl TimeRegisters {
    fn encode(time: &DateTime) -> Result<Self, Error> {
        let year = time
            .year
            .checked_sub(BASE_YEAR)
            .filter(|y| *y < 100)
            .ok_or(Error::OutOfRange)?;
        let valid = time.second < 60
            && time.minute < 60
            && time.hour < 24
            && (1..=31).contains(&time.day)
            && (1..=12).contains(&time.month);
        if !valid {
            return Err(Error::OutOfRange);
        }
        Ok(Self {
            seconds: dec_to_bcd(time.second),
            minutes: dec_to_bcd(time.minute),
            // Bit 6 clear selects 24-hour mode.
            hours: dec_to_bcd(time.hour) & 0x3F,
            weekday: 0,
            date: dec_to_bcd(time.day),
            month: dec_to_bcd(time.month),
            year: dec_to_bcd(year as u8),
        })
    }

    fn decode(&self) -> DateTime {
        DateTime {
            year: BASE_YEAR + u16::from(bcd_to_dec(self.year)),
            // Bit 7 of the month register is the century flag.
            month: bcd_to_dec(self.month & 0x1F),
            day: bcd_to_dec(self.date & 0x3F),
            hour: bcd_to_dec(self.hours & 0x3F),
            minute: bcd_to_dec(self.minutes & 0x7F),
            second: bcd_to_dec(self.seconds & 0x7F),
        }
    }
}

pub struct Ds3231<B> {
    bus: B,
    address: u8,
}

impl<B: I2cMaster<Error = Error>> Ds3231<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            address: ADDRESS,
        }
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// # Errors
    ///
    /// `Error::OutOfRange` for dates the chip cannot hold (years before 2000
    /// or after 2099 included), otherwise bus failures.
    pub fn set_time(&mut self, time: &DateTime) -> Result<(), Error> {
        let registers = TimeRegisters::encode(time)?;
        self.bus.write_registers(
            self.address,
            RegisterAddress::from(REG_TIME),
            registers.as_bytes(),
            Stop::Release,
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// Bus failures.
    pub fn time(&mut self) -> Result<DateTime, Error> {
        let mut registers = TimeRegisters::new_zeroed();
        self.bus.read_registers(
            self.address,
            RegisterAddress::from(REG_TIME),
            registers.as_mut_bytes(),
        )?;
        Ok(registers.decode())
    }

    /// # Errors
    ///
    /// Bus failures.
    pub fn status(&mut self) -> Result<u8, Error> {
        let mut status = [0u8; 1];
        self.bus
            .read_registers(self.address, RegisterAddress::from(REG_STATUS), &mut status)?;
        let [value] = status;
        Ok(value)
    }

    /// True when the oscillator stopped at some point since the flag was
    /// last cleared, i.e. the time cannot be trusted.
    ///
    /// # Errors
    ///
    /// Bus failures.
    pub fn oscillator_stopped(&mut self) -> Result<bool, Error> {
        Ok(self.status()? & STATUS_OSF != 0)
    }

    /// # Errors
    ///
    /// Bus failures.
    pub fn clear_oscillator_stop(&mut self) -> Result<(), Error> {
        let status = self.status()?;
        self.bus.write_registers(
            self.address,
            RegisterAddress::from(REG_STATUS),
            &[status & !STATUS_OSF],
            Stop::Release,
        )?;
        Ok(())
    }
}
