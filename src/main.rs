// Licensed under the Apache-2.0 license

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use cortex_m_rt::entry;
    use embedded_hal::delay::DelayNs;
    use fugit::HertzU32;
    use panic_halt as _;
    use samd21_ddk::dev::{at24xx, At24xx, DateTime, Ds3231};
    use samd21_ddk::i2c::hardware_instantiation::{self, I2cControllerWrapper};
    use samd21_ddk::i2c::{BusInstance, Error, I2cConfigBuilder, I2cMaster, I2cSpeed};

    /// Busy-wait delay for the reset clock tree (1 MHz CPU clock).
    #[derive(Clone, Default)]
    struct SpinDelay;

    impl DelayNs for SpinDelay {
        fn delay_ns(&mut self, ns: u32) {
            for _ in 0..ns.div_ceil(1_000) {
                cortex_m::asm::nop();
            }
        }
    }

    const START_OF_TIME: DateTime = DateTime {
        year: 2023,
        month: 8,
        day: 18,
        hour: 4,
        minute: 20,
        second: 0,
    };

    /// Seed the RTC if it lost power, then log the current time into the
    /// EEPROM and read it back.
    fn clock_to_eeprom<B, D>(bus: &mut B, delay: &mut D) -> Result<bool, Error>
    where
        B: I2cMaster<Error = Error>,
        D: DelayNs,
    {
        let mut rtc = Ds3231::new(&mut *bus);
        if rtc.oscillator_stopped()? {
            rtc.set_time(&START_OF_TIME)?;
            rtc.clear_oscillator_stop()?;
        }
        let now = rtc.time()?;

        let mut eeprom = At24xx::at24c32(&mut *bus, &mut *delay, at24xx::DEFAULT_ADDRESS);
        let stamp = [now.hour, now.minute, now.second];
        eeprom.write(0, &stamp)?;
        let mut check = [0u8; 3];
        eeprom.read(0, &mut check)?;
        Ok(check == stamp)
    }

    #[entry]
    fn main() -> ! {
        // GCLK0 runs from OSC8M / 8 out of reset.
        let config = I2cConfigBuilder::new()
            .speed(I2cSpeed::Standard)
            .source_clock(HertzU32::MHz(1))
            .build();
        let mut delay = SpinDelay;

        if let Ok(mut bus) = hardware_instantiation::initialize(BusInstance::Twi0, config) {
            let _ = match &mut bus {
                I2cControllerWrapper::Twi0(controller) => {
                    clock_to_eeprom(&mut controller.hardware, &mut delay)
                }
                I2cControllerWrapper::Twi1(controller) => {
                    clock_to_eeprom(&mut controller.hardware, &mut delay)
                }
            };
        }

        loop {
            cortex_m::asm::wfi();
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
