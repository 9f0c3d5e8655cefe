// Licensed under the Apache-2.0 license

//! # I2C hardware instantiation
//!
//! Each SERCOM instance is a distinct type (`Sercom<Sercom0>`,
//! `Sercom<Sercom1>`), so controllers for different buses cannot share an
//! array or a return type. [`I2cControllerWrapper`] is the enum that erases the
//! instance while keeping the concrete controller inside, giving uniform
//! access through `embedded_hal::i2c::I2c` without allocation.
//!
//! The module is also the only place that creates `Sercom<I>` values. A
//! critical-section guarded flag per instance makes sure at most one handle
//! exists for each physical bus:
//!
//! ```rust,ignore
//! use samd21_ddk::i2c::{hardware_instantiation, BusInstance, I2cConfigBuilder};
//!
//! let config = I2cConfigBuilder::new().build();
//! let mut bus = hardware_instantiation::initialize(BusInstance::Twi0, config)?;
//! bus.as_i2c_mut().write(0x50, &[0x00, 0x00, 0x42])?;
//!
//! // A second handle for the same bus is refused.
//! assert!(hardware_instantiation::initialize(BusInstance::Twi0, config).is_err());
//! ```

use crate::common::NoOpLogger;
use crate::i2c::common::{BusInstance, I2cConfig};
use crate::i2c::hardware_interface::{HardwareInterface, Instance, Sercom, Sercom0, Sercom1};
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::sercom_i2c::{Error, SercomI2c};
use crate::i2c::system_setup::{I2cSystemSetup, Samd21SysCon, SystemControl};
use crate::i2c::traits::I2cHardwareCore;
use core::cell::Cell;
use critical_section::Mutex;

static TAKEN: Mutex<Cell<[bool; 2]>> = Mutex::new(Cell::new([false; 2]));

fn claim(bus: BusInstance) -> bool {
    critical_section::with(|cs| {
        let cell = TAKEN.borrow(cs);
        let mut taken = cell.get();
        match taken.get_mut(bus.index()) {
            Some(slot) if !*slot => {
                *slot = true;
                cell.set(taken);
                true
            }
            _ => false,
        }
    })
}

fn release(bus: BusInstance) {
    critical_section::with(|cs| {
        let cell = TAKEN.borrow(cs);
        let mut taken = cell.get();
        if let Some(slot) = taken.get_mut(bus.index()) {
            *slot = false;
        }
        cell.set(taken);
    });
}

/// Hand out the register block of instance `I`, once.
///
/// Returns `None` if the instance has already been taken.
#[must_use]
pub fn take<I: Instance>() -> Option<Sercom<I>> {
    claim(I::BUS).then(Sercom::new)
}

/// Controller over a SERCOM instance without logging.
pub type I2cControllerNoLog<I> = I2cController<SercomI2c<Sercom<I>, NoOpLogger>, NoOpLogger>;

/// One initialized bus, whichever SERCOM it runs on.
pub enum I2cControllerWrapper {
    /// SERCOM0 on PA08/PA09
    Twi0(I2cControllerNoLog<Sercom0>),
    /// SERCOM1 on PA22/PA23
    Twi1(I2cControllerNoLog<Sercom1>),
}

impl I2cControllerWrapper {
    /// Get mutable access to the controller via embedded-hal traits.
    pub fn as_i2c_mut(&mut self) -> &mut dyn embedded_hal::i2c::I2c<Error = Error> {
        match self {
            I2cControllerWrapper::Twi0(controller) => controller,
            I2cControllerWrapper::Twi1(controller) => controller,
        }
    }

    #[must_use]
    pub fn bus_instance(&self) -> BusInstance {
        match self {
            I2cControllerWrapper::Twi0(_) => BusInstance::Twi0,
            I2cControllerWrapper::Twi1(_) => BusInstance::Twi1,
        }
    }

    /// Disable the peripheral, release its pins and clock, and give the
    /// instance back so it can be initialized again.
    ///
    /// # Errors
    ///
    /// Propagates reset and system controller failures; the instance is
    /// released either way.
    pub fn shutdown(self) -> Result<(), Error> {
        let bus = self.bus_instance();
        let result = match self {
            I2cControllerWrapper::Twi0(mut controller) => controller.hardware.deinit(),
            I2cControllerWrapper::Twi1(mut controller) => controller.hardware.deinit(),
        }
        .and_then(|()| I2cSystemSetup::shutdown_i2c_system(&mut Samd21SysCon::default(), bus));
        release(bus);
        result
    }
}

macro_rules! controller_constructors {
    ($($bus:ident => $instance:ty),* $(,)?) => {
        paste::paste! {
            $(
                fn [<create_ $bus:lower _controller>](config: I2cConfig) -> I2cControllerNoLog<$instance> {
                    I2cController::new(
                        SercomI2c::new(Sercom::<$instance>::new(), NoOpLogger),
                        config,
                        NoOpLogger,
                    )
                }
            )*
        }
    };
}

controller_constructors!(Twi0 => Sercom0, Twi1 => Sercom1);

/// Clock, pins and reset through `system_controller`, then program and
/// enable the engine.
fn bring_up<H, S>(
    controller: &mut I2cController<SercomI2c<H, NoOpLogger>, NoOpLogger>,
    system_controller: &mut S,
) -> Result<(), Error>
where
    H: HardwareInterface,
    S: SystemControl,
    Error: From<S::Error>,
{
    let retries = controller.config.idle_retries;
    I2cSystemSetup::initialize_i2c_system(
        system_controller,
        controller.hardware.hardware_mut(),
        retries,
    )?;
    controller.init()
}

/// Initialize bus `bus` for master operation with `config`.
///
/// # Errors
///
/// `Error::InstanceTaken` if the bus already has a handle, otherwise any
/// bring-up failure (the instance is then released again).
pub fn initialize(bus: BusInstance, config: I2cConfig) -> Result<I2cControllerWrapper, Error> {
    if !claim(bus) {
        return Err(Error::InstanceTaken);
    }
    let mut syscon = Samd21SysCon::new(config.idle_retries);
    let mut wrapper = match bus {
        BusInstance::Twi0 => I2cControllerWrapper::Twi0(create_twi0_controller(config)),
        BusInstance::Twi1 => I2cControllerWrapper::Twi1(create_twi1_controller(config)),
    };
    let result = match &mut wrapper {
        I2cControllerWrapper::Twi0(controller) => bring_up(controller, &mut syscon),
        I2cControllerWrapper::Twi1(controller) => bring_up(controller, &mut syscon),
    };
    match result {
        Ok(()) => Ok(wrapper),
        Err(e) => {
            release(bus);
            Err(e)
        }
    }
}
