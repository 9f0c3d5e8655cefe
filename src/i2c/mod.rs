// Licensed under the Apache-2.0 license

//! SAMD21 SERCOM I2C master driver module.
//!
//! This module provides a blocking I2C master engine for the SERCOM blocks,
//! designed for bare-metal and `no_std` environments. The engine works on any
//! [`HardwareInterface`], integrates with `embedded-hal` through
//! [`I2cController`], and exposes register-oriented access for device drivers
//! through [`I2cMaster`].

pub mod common;
pub mod framer;
pub mod hardware_instantiation;
pub mod hardware_interface;
pub mod i2c_controller;
pub mod registers;
pub mod sercom_i2c;
#[cfg(test)]
pub(crate) mod sim;
pub mod system_setup;
pub mod traits;

pub use common::{BusInstance, I2cConfig, I2cConfigBuilder, I2cSpeed, SdaHold, Stop};
pub use framer::{AddressSize, RegisterAddress};
pub use hardware_interface::{HardwareInterface, Sercom, Sercom0, Sercom1};
pub use i2c_controller::I2cController;
pub use sercom_i2c::{Error, Fault, SercomI2c};
pub use traits::{I2cHardwareCore, I2cMaster};
