// Licensed under the Apache-2.0 license

//! AT24-series serial EEPROMs.

use crate::i2c::common::Stop;
use crate::i2c::framer::{AddressSize, RegisterAddress};
use crate::i2c::sercom_i2c::Error;
use crate::i2c::traits::I2cMaster;
use embedded_hal::delay::DelayNs;

pub const DEFAULT_ADDRESS: u8 = 0x50;

/// Internal write cycle after each page.
const WRITE_CYCLE_MS: u32 = 10;

pub struct At24xx<B, D> {
    bus: B,
    delay: D,
    address: u8,
    memory_size: u32,
    page_size: u32,
    address_size: AddressSize,
}

impl<B: I2cMaster<Error = Error>, D: DelayNs> At24xx<B, D> {
    pub fn new(
        bus: B,
        delay: D,
        address: u8,
        memory_size: u32,
        page_size: u32,
        address_size: AddressSize,
    ) -> Self {
        Self {
            bus,
            delay,
            address,
            memory_size,
            page_size: page_size.max(1),
            address_size,
        }
    }

    /// 4 KiB, 32-byte pages.
    pub fn at24c32(bus: B, delay: D, address: u8) -> Self {
        Self::new(bus, delay, address, 4096, 32, AddressSize::Two)
    }

    /// 32 KiB, 64-byte pages.
    pub fn at24c256(bus: B, delay: D, address: u8) -> Self {
        Self::new(bus, delay, address, 32_768, 64, AddressSize::Two)
    }

    /// 64 KiB, 128-byte pages.
    pub fn at24c512(bus: B, delay: D, address: u8) -> Self {
        Self::new(bus, delay, address, 65_536, 128, AddressSize::Two)
    }

    #[must_use]
    pub fn memory_size(&self) -> u32 {
        self.memory_size
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), Error> {
        let len = u32::try_from(len).map_err(|_| Error::OutOfRange)?;
        match offset.checked_add(len) {
            Some(end) if end <= self.memory_size => Ok(()),
            _ => Err(Error::OutOfRange),
        }
    }

    fn register(&self, offset: u32) -> Result<RegisterAddress, Error> {
        let offset = u16::try_from(offset).map_err(|_| Error::OutOfRange)?;
        Ok(RegisterAddress::new(offset, self.address_size))
    }

    /// Write `data` starting at `offset`, one page-aligned chunk at a time,
    /// waiting out the write cycle after each chunk.
    ///
    /// # Errors
    ///
    /// `Error::OutOfRange` if the data does not fit behind `offset`; bus
    /// failures are returned as they occur, earlier pages stay written.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        self.check_range(offset, data.len())?;
        let mut offset = offset;
        let mut remaining = data;
        while !remaining.is_empty() {
            let room = (self.page_size - offset % self.page_size) as usize;
            let (page, rest) = remaining.split_at(room.min(remaining.len()));
            let register = self.register(offset)?;
            self.bus
                .write_registers(self.address, register, page, Stop::Release)?;
            self.delay.delay_ms(WRITE_CYCLE_MS);
            offset += page.len() as u32;
            remaining = rest;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// As [`At24xx::write`].
    pub fn write_byte(&mut self, offset: u32, value: u8) -> Result<(), Error> {
        self.write(offset, &[value])
    }

    /// Sequential read of `buffer.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// `Error::OutOfRange` if the range leaves the device, otherwise bus
    /// failures.
    pub fn read(&mut self, offset: u32, buffer: &mut [u8]) -> Result<(), Error> {
        self.check_range(offset, buffer.len())?;
        let register = self.register(offset)?;
        self.bus.read_registers(self.address, register, buffer)?;
        Ok(())
    }

    /// # Errors
    ///
    /// As [`At24xx::read`].
    pub fn read_byte(&mut self, offset: u32) -> Result<u8, Error> {
        let mut value = [0u8; 1];
        self.read(offset, &mut value)?;
        let [byte] = value;
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoOpLogger;
    use crate::i2c::common::I2cConfigBuilder;
    use crate::i2c::sercom_i2c::SercomI2c;
    use crate::i2c::sim::{MemoryDevice, SimBus};
    use crate::i2c::traits::I2cHardwareCore;

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    fn eeprom() -> At24xx<SercomI2c<SimBus>, RecordingDelay> {
        let bus = SimBus::new().with_device(MemoryDevice::new(DEFAULT_ADDRESS, 2, 4096));
        let mut i2c = SercomI2c::new(bus, NoOpLogger);
        i2c.init(&I2cConfigBuilder::new().build()).unwrap();
        At24xx::at24c32(i2c, RecordingDelay::default(), DEFAULT_ADDRESS)
    }

    #[test]
    fn write_is_split_at_page_boundaries() {
        let mut eeprom = eeprom();
        let data: Vec<u8> = (0..40).collect();
        eeprom.write(20, &data).unwrap();

        let (i2c, delay) = eeprom.release();
        let device = i2c.hardware().device(DEFAULT_ADDRESS);
        assert_eq!(device.pointer_writes, [20, 32]);
        assert_eq!(&device.memory[20..60], data.as_slice());
        assert_eq!(delay.total_ns, 2 * 10_000_000);
    }

    #[test]
    fn aligned_full_page_is_one_write() {
        let mut eeprom = eeprom();
        eeprom.write(64, &[0xA5; 32]).unwrap();
        let (i2c, _) = eeprom.release();
        assert_eq!(i2c.hardware().device(DEFAULT_ADDRESS).pointer_writes, [64]);
    }

    #[test]
    fn bytes_round_trip() {
        let mut eeprom = eeprom();
        eeprom.write_byte(0x0FFF, 0x3C).unwrap();
        assert_eq!(eeprom.read_byte(0x0FFF), Ok(0x3C));

        eeprom.write(100, b"hello").unwrap();
        let mut buf = [0u8; 5];
        eeprom.read(100, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn accesses_past_the_end_are_rejected_without_bus_traffic() {
        let mut eeprom = eeprom();
        assert_eq!(eeprom.write(4090, &[0; 10]), Err(Error::OutOfRange));
        let mut buf = [0u8; 2];
        assert_eq!(eeprom.read(4095, &mut buf), Err(Error::OutOfRange));
        assert_eq!(eeprom.read_byte(4096), Err(Error::OutOfRange));
        let (mut i2c, _) = eeprom.release();
        assert!(i2c.hardware_mut().take_events().is_empty());
    }

    #[test]
    fn presets() {
        let bus = SercomI2c::new(SimBus::new(), NoOpLogger);
        let e = At24xx::at24c512(bus, RecordingDelay::default(), DEFAULT_ADDRESS);
        assert_eq!((e.memory_size(), e.page_size()), (65_536, 128));
        let (bus, delay) = e.release();
        let e = At24xx::at24c256(bus, delay, 0x57);
        assert_eq!((e.memory_size(), e.page_size()), (32_768, 64));
    }
}
