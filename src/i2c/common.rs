// Licensed under the Apache-2.0 license

//! Common types and constants for the SERCOM I2C driver modules.
//!
//! This module provides bus identification, speed presets and the
//! configuration builder shared by the engine and the instantiation helpers.

use fugit::HertzU32;

/// Default retry budget for every bounded poll loop.
pub const DEFAULT_RETRIES: u32 = 100_000;

/// Clock pulses issued by bus recovery before giving up on a stuck SDA.
pub const DEFAULT_RECOVERY_PULSES: u8 = 9;

/// Physical two-wire bus instances exposed by the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BusInstance {
    /// SERCOM0, SDA on PA08, SCL on PA09.
    Twi0 = 0,
    /// SERCOM1, SDA on PA22, SCL on PA23.
    Twi1 = 1,
}

/// Port A pin numbers of one bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusPins {
    pub sda: u8,
    pub scl: u8,
}

impl BusInstance {
    pub const ALL: [BusInstance; 2] = [BusInstance::Twi0, BusInstance::Twi1];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn pins(self) -> BusPins {
        match self {
            BusInstance::Twi0 => BusPins { sda: 8, scl: 9 },
            BusInstance::Twi1 => BusPins { sda: 22, scl: 23 },
        }
    }
}

/// Standard SCL presets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }
}

/// SDA hold time after the SCL falling edge (CTRLA.SDAHOLD).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SdaHold {
    Disabled = 0,
    Ns75 = 1,
    Ns450 = 2,
    Ns600 = 3,
}

/// Whether a write releases the bus when it completes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Stop {
    /// Issue STOP after the last byte.
    #[default]
    Release,
    /// Keep ownership; the next transaction on the handle starts with a
    /// repeated START.
    Hold,
}

#[derive(Copy, Clone, Debug)]
pub struct I2cConfig {
    pub speed: I2cSpeed,
    pub source_clock: HertzU32,
    pub sda_hold: SdaHold,
    /// Poll budget for each data byte.
    pub data_retries: u32,
    /// Poll budget for the address phase.
    pub address_retries: u32,
    /// Poll budget for forcing the bus idle and for register synchronization.
    pub idle_retries: u32,
    pub recovery_pulses: u8,
}

impl I2cConfig {
    /// BAUD register value, `source / (2 * scl) - 1`.
    ///
    /// Returns `None` when the divisor does not fit the 8-bit BAUD field.
    #[must_use]
    pub fn baud_divisor(&self) -> Option<u8> {
        let scl = self.speed.frequency().raw();
        let divisor = (self.source_clock.raw() / (2 * scl)).checked_sub(1)?;
        u8::try_from(divisor).ok()
    }

    /// Spin iterations approximating half an SCL period, for bit-level
    /// recovery pulses.
    #[must_use]
    pub fn half_period_cycles(&self) -> u32 {
        self.source_clock.raw() / (2 * self.speed.frequency().raw())
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    source_clock: HertzU32,
    sda_hold: SdaHold,
    data_retries: u32,
    address_retries: u32,
    idle_retries: u32,
    recovery_pulses: u8,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            source_clock: HertzU32::MHz(48),
            sda_hold: SdaHold::Ns600,
            data_retries: DEFAULT_RETRIES,
            address_retries: DEFAULT_RETRIES,
            idle_retries: DEFAULT_RETRIES,
            recovery_pulses: DEFAULT_RECOVERY_PULSES,
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn source_clock(mut self, clock: HertzU32) -> Self {
        self.source_clock = clock;
        self
    }
    #[must_use]
    pub fn sda_hold(mut self, hold: SdaHold) -> Self {
        self.sda_hold = hold;
        self
    }
    #[must_use]
    pub fn data_retries(mut self, retries: u32) -> Self {
        self.data_retries = retries;
        self
    }
    #[must_use]
    pub fn address_retries(mut self, retries: u32) -> Self {
        self.address_retries = retries;
        self
    }
    #[must_use]
    pub fn idle_retries(mut self, retries: u32) -> Self {
        self.idle_retries = retries;
        self
    }
    #[must_use]
    pub fn recovery_pulses(mut self, pulses: u8) -> Self {
        self.recovery_pulses = pulses;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            source_clock: self.source_clock,
            sda_hold: self.sda_hold,
            data_retries: self.data_retries,
            address_retries: self.address_retries,
            idle_retries: self.idle_retries,
            recovery_pulses: self.recovery_pulses,
        }
    }
}

impl From<I2cConfigBuilder> for I2cConfig {
    fn from(builder: I2cConfigBuilder) -> Self {
        builder.build()
    }
}
