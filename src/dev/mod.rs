// Licensed under the Apache-2.0 license

//! Drivers for I2C peripherals commonly attached to the SERCOM buses.
//!
//! Drivers are generic over [`crate::i2c::I2cMaster`] so they run on any bus
//! handle, including the simulated one used in tests.

pub mod at24xx;
pub mod ds3231;

pub use at24xx::At24xx;
pub use ds3231::{DateTime, Ds3231};
