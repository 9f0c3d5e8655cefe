// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! This module provides helper functions for I2C system control operations,
//! enabling clean separation between I2C hardware control and system-level
//! configuration (bus clock, generic clock routing and pin multiplexing)
//! through the [`SystemControl`] trait. The SAMD21 implementation drives the
//! PM, GCLK and PORT blocks through the PAC.

use crate::i2c::common::{BusInstance, DEFAULT_RETRIES};
use crate::i2c::hardware_interface::HardwareInterface;
use crate::i2c::registers::{ctrla, syncbusy};
use crate::i2c::sercom_i2c::Error;
use crate::pac;

/// System-level resources a SERCOM needs before it can run as an I2C master.
pub trait SystemControl {
    type Error;

    /// Ungate the APB clock and route a generic clock to the SERCOM core.
    fn enable_clock(&mut self, bus: BusInstance) -> Result<(), Self::Error>;
    fn disable_clock(&mut self, bus: BusInstance) -> Result<(), Self::Error>;
    /// Hand SDA/SCL to the SERCOM (peripheral function C).
    fn route_pins(&mut self, bus: BusInstance) -> Result<(), Self::Error>;
    /// Return SDA/SCL to plain GPIO inputs.
    fn release_pins(&mut self, bus: BusInstance) -> Result<(), Self::Error>;
}

const GCLK_CLKCTRL_GEN_SHIFT: u16 = 8;
const GCLK_CLKCTRL_CLKEN: u16 = 1 << 14;
/// Generator 0, the CPU clock.
const GCLK_GEN0: u16 = 0;

fn apbc_bit(bus: BusInstance) -> u32 {
    match bus {
        BusInstance::Twi0 => 1 << 2,
        BusInstance::Twi1 => 1 << 3,
    }
}

fn gclk_id(bus: BusInstance) -> u16 {
    match bus {
        BusInstance::Twi0 => 0x14,
        BusInstance::Twi1 => 0x15,
    }
}

/// PM/GCLK/PORT implementation for SAMD21 silicon.
pub struct Samd21SysCon {
    sync_retries: u32,
}

impl Default for Samd21SysCon {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES)
    }
}

impl Samd21SysCon {
    #[must_use]
    pub fn new(sync_retries: u32) -> Self {
        Self { sync_retries }
    }

    fn gclk() -> &'static pac::gclk::RegisterBlock {
        // SAFETY: GCLK is only touched here, with the bus instance claimed.
        unsafe { &*pac::GCLK::ptr() }
    }

    fn wait_gclk_sync(&self) -> Result<(), Error> {
        for _ in 0..self.sync_retries {
            if Self::gclk().status.read().syncbusy().bit_is_clear() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(Error::SyncTimeout)
    }

    fn write_clkctrl(&mut self, value: u16) -> Result<(), Error> {
        Self::gclk().clkctrl.write(|w| unsafe { w.bits(value) });
        self.wait_gclk_sync()
    }

    fn modify_apbcmask(f: impl FnOnce(u32) -> u32) {
        // SAFETY: APBCMASK only gates peripheral bus clocks.
        let pm = unsafe { &*pac::PM::ptr() };
        pm.apbcmask.modify(|r, w| unsafe { w.bits(f(r.bits())) });
    }
}

impl SystemControl for Samd21SysCon {
    type Error = Error;

    fn enable_clock(&mut self, bus: BusInstance) -> Result<(), Error> {
        Self::modify_apbcmask(|mask| mask | apbc_bit(bus));
        self.write_clkctrl(
            gclk_id(bus) | (GCLK_GEN0 << GCLK_CLKCTRL_GEN_SHIFT) | GCLK_CLKCTRL_CLKEN,
        )
    }

    fn disable_clock(&mut self, bus: BusInstance) -> Result<(), Error> {
        self.write_clkctrl(gclk_id(bus))?;
        Self::modify_apbcmask(|mask| mask & !apbc_bit(bus));
        Ok(())
    }

    fn route_pins(&mut self, bus: BusInstance) -> Result<(), Error> {
        let pins = bus.pins();
        for pin in [pins.sda, pins.scl] {
            port::select_function_c(pin);
            port::set_pmux_enabled(pin, true);
        }
        Ok(())
    }

    fn release_pins(&mut self, bus: BusInstance) -> Result<(), Error> {
        let pins = bus.pins();
        for pin in [pins.sda, pins.scl] {
            port::set_pmux_enabled(pin, false);
            port::release(pin);
        }
        Ok(())
    }
}

/// Port A pin access used for routing and for bit-level bus recovery.
pub(crate) mod port {
    use crate::pac;

    const PINCFG_PMUXEN: u8 = 1 << 0;
    const PINCFG_INEN: u8 = 1 << 1;
    const FUNCTION_C: u8 = 0x2;

    fn port() -> &'static pac::port::RegisterBlock {
        // SAFETY: only the bus pins of a claimed instance are touched.
        unsafe { &*pac::PORT::ptr() }
    }

    fn mask(pin: u8) -> u32 {
        1 << (pin & 0x1F)
    }

    fn modify_pincfg(pin: u8, f: impl FnOnce(u8) -> u8) {
        if let Some(cfg) = port().pincfg0_.get(usize::from(pin)) {
            cfg.modify(|r, w| unsafe { w.bits(f(r.bits())) });
        }
    }

    /// Stop driving `pin`; the external pull-up takes the line high.
    pub fn release(pin: u8) {
        port().dirclr0.write(|w| unsafe { w.bits(mask(pin)) });
        modify_pincfg(pin, |cfg| cfg | PINCFG_INEN);
    }

    pub fn set_pmux_enabled(pin: u8, enabled: bool) {
        modify_pincfg(pin, |cfg| {
            if enabled {
                cfg | PINCFG_PMUXEN
            } else {
                cfg & !PINCFG_PMUXEN
            }
        });
    }

    /// Even pins use the low nibble of their PMUX byte, odd pins the high one.
    pub fn select_function_c(pin: u8) {
        let shift = if pin % 2 == 0 { 0 } else { 4 };
        if let Some(pmux) = port().pmux0_.get(usize::from(pin / 2)) {
            pmux.modify(|r, w| unsafe { w.bits((r.bits() & !(0xF << shift)) | (FUNCTION_C << shift)) });
        }
    }

    /// Open-drain emulation: low drives 0, high releases the line.
    pub fn drive_open_drain(pin: u8, high: bool) {
        if high {
            release(pin);
        } else {
            let port = port();
            port.outclr0.write(|w| unsafe { w.bits(mask(pin)) });
            port.dirset0.write(|w| unsafe { w.bits(mask(pin)) });
        }
    }

    pub fn is_high(pin: u8) -> bool {
        port().in0.read().bits() & mask(pin) != 0
    }
}

/// Software reset of the SERCOM, waiting (bounded) for it to complete.
///
/// # Errors
///
/// Returns `Error::SyncTimeout` if SWRST does not self-clear within `retries`
/// polls.
pub fn software_reset<H: HardwareInterface>(hw: &mut H, retries: u32) -> Result<(), Error> {
    hw.write_ctrla(ctrla::SWRST);
    for _ in 0..retries {
        if hw.read_ctrla() & ctrla::SWRST == 0 && hw.read_syncbusy() & syncbusy::SWRST == 0 {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(Error::SyncTimeout)
}

/// Helper for I2C system control operations
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// One-time bring-up of a bus: clock, pin routing, module reset.
    ///
    /// # Errors
    ///
    /// Propagates system controller failures and a reset that never completes.
    pub fn initialize_i2c_system<S, H>(
        system_controller: &mut S,
        hw: &mut H,
        retries: u32,
    ) -> Result<(), Error>
    where
        S: SystemControl,
        H: HardwareInterface,
        Error: From<S::Error>,
    {
        let bus = hw.instance();
        system_controller.enable_clock(bus).map_err(Error::from)?;
        system_controller.route_pins(bus).map_err(Error::from)?;
        software_reset(hw, retries)
    }

    /// Undo [`I2cSystemSetup::initialize_i2c_system`] for `bus`.
    ///
    /// # Errors
    ///
    /// Propagates system controller failures.
    pub fn shutdown_i2c_system<S>(system_controller: &mut S, bus: BusInstance) -> Result<(), Error>
    where
        S: SystemControl,
        Error: From<S::Error>,
    {
        system_controller.release_pins(bus).map_err(Error::from)?;
        system_controller.disable_clock(bus).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::sim::SimBus;
    use std::collections::{HashMap, HashSet};

    struct MockSystemController {
        enabled_clocks: HashSet<BusInstance>,
        routed_pins: HashMap<BusInstance, bool>,
        calls: Vec<&'static str>,
        fail_clock: bool,
    }

    impl MockSystemController {
        fn new() -> Self {
            Self {
                enabled_clocks: HashSet::new(),
                routed_pins: HashMap::new(),
                calls: Vec::new(),
                fail_clock: false,
            }
        }
    }

    impl SystemControl for MockSystemController {
        type Error = Error;

        fn enable_clock(&mut self, bus: BusInstance) -> Result<(), Self::Error> {
            self.calls.push("enable_clock");
            if self.fail_clock {
                return Err(Error::SyncTimeout);
            }
            self.enabled_clocks.insert(bus);
            Ok(())
        }

        fn disable_clock(&mut self, bus: BusInstance) -> Result<(), Self::Error> {
            self.calls.push("disable_clock");
            self.enabled_clocks.remove(&bus);
            Ok(())
        }

        fn route_pins(&mut self, bus: BusInstance) -> Result<(), Self::Error> {
            self.calls.push("route_pins");
            self.routed_pins.insert(bus, true);
            Ok(())
        }

        fn release_pins(&mut self, bus: BusInstance) -> Result<(), Self::Error> {
            self.calls.push("release_pins");
            self.routed_pins.insert(bus, false);
            Ok(())
        }
    }

    #[test]
    fn test_initialize_i2c_system() {
        let mut mock = MockSystemController::new();
        let mut hw = SimBus::new();
        hw.write_ctrla(ctrla::ENABLE);

        let result = I2cSystemSetup::initialize_i2c_system(&mut mock, &mut hw, 8);

        assert!(result.is_ok());
        assert!(mock.enabled_clocks.contains(&BusInstance::Twi0));
        assert_eq!(mock.routed_pins.get(&BusInstance::Twi0), Some(&true));
        assert_eq!(mock.calls, ["enable_clock", "route_pins"]);
        assert_eq!(hw.resets, 1);
        assert_eq!(hw.read_ctrla(), 0);
    }

    #[test]
    fn test_clock_failure_stops_bring_up() {
        let mut mock = MockSystemController::new();
        mock.fail_clock = true;
        let mut hw = SimBus::new();

        let result = I2cSystemSetup::initialize_i2c_system(&mut mock, &mut hw, 8);

        assert_eq!(result, Err(Error::SyncTimeout));
        assert!(mock.routed_pins.is_empty());
        assert_eq!(hw.resets, 0);
    }

    #[test]
    fn test_shutdown_i2c_system() {
        let mut mock = MockSystemController::new();
        let mut hw = SimBus::new();
        I2cSystemSetup::initialize_i2c_system(&mut mock, &mut hw, 8).unwrap();

        let result = I2cSystemSetup::shutdown_i2c_system(&mut mock, BusInstance::Twi0);

        assert!(result.is_ok());
        assert!(mock.enabled_clocks.is_empty());
        assert_eq!(mock.routed_pins.get(&BusInstance::Twi0), Some(&false));
        assert_eq!(mock.calls.last(), Some(&"disable_clock"));
    }

    #[test]
    fn test_generic_clock_routing_values() {
        assert_eq!(gclk_id(BusInstance::Twi0), 0x14);
        assert_eq!(gclk_id(BusInstance::Twi1), 0x15);
        assert_eq!(apbc_bit(BusInstance::Twi0), 0x4);
        assert_eq!(apbc_bit(BusInstance::Twi1), 0x8);
        let clkctrl = gclk_id(BusInstance::Twi1) | (GCLK_GEN0 << GCLK_CLKCTRL_GEN_SHIFT) | GCLK_CLKCTRL_CLKEN;
        assert_eq!(clkctrl, 0x4015);
    }
}
