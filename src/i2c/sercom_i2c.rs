// Licensed under the Apache-2.0 license

//! Blocking I2C master engine for a SERCOM block.
//!
//! Every wait is a bounded poll: address phase, data bytes, bus-idle forcing
//! and register synchronization each have an iteration budget taken from
//! [`I2cConfig`]. A transfer either completes or reports which [`Fault`]
//! stopped it together with the number of payload bytes that made it across.
//! On every fault path the engine issues STOP and drops bus ownership.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{I2cConfig, I2cConfigBuilder, I2cSpeed, Stop};
use crate::i2c::framer::RegisterAddress;
use crate::i2c::hardware_interface::HardwareInterface;
use crate::i2c::registers::{ctrla, ctrlb, syncbusy, BusState, BusStatus, Command, Flags, Status};
use crate::i2c::system_setup::software_reset;
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};
use fugit::HertzU32;

/// Why a transfer stopped early.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// No device acknowledged the address byte.
    AddressNack,
    /// The device refused a data byte.
    DataNack,
    /// Bus error or lost arbitration reported by the peripheral.
    BusError,
    /// A poll budget ran out while waiting for the peripheral.
    Timeout,
    /// The bus could not be brought to idle, even after recovery.
    BusStuck,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A transfer failed after moving `transferred` payload bytes.
    Transfer { fault: Fault, transferred: usize },
    /// The requested SCL rate cannot be derived from the source clock.
    UnsupportedBaud,
    /// The peripheral is already enabled.
    AlreadyInitialized,
    /// SYNCBUSY did not clear within the idle budget.
    SyncTimeout,
    /// Register pointers are one or two bytes wide.
    InvalidAddressSize,
    /// A device access falls outside the device's address space.
    OutOfRange,
    /// The bus instance has already been handed out.
    InstanceTaken,
}

impl Error {
    #[must_use]
    pub fn fault(&self) -> Option<Fault> {
        match self {
            Error::Transfer { fault, .. } => Some(*fault),
            _ => None,
        }
    }

    /// Payload bytes moved before the failure; zero for non-transfer errors.
    #[must_use]
    pub fn transferred(&self) -> usize {
        match self {
            Error::Transfer { transferred, .. } => *transferred,
            _ => 0,
        }
    }

    fn shifted(self, skipped: usize) -> Self {
        match self {
            Error::Transfer { fault, transferred } => Error::Transfer {
                fault,
                transferred: transferred.saturating_sub(skipped),
            },
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transfer { fault, transferred } => {
                write!(f, "{fault:?} after {transferred} bytes")
            }
            Error::UnsupportedBaud => f.write_str("baud rate not reachable from source clock"),
            Error::AlreadyInitialized => f.write_str("peripheral already enabled"),
            Error::SyncTimeout => f.write_str("register synchronization timed out"),
            Error::InvalidAddressSize => f.write_str("register address size must be 1 or 2"),
            Error::OutOfRange => f.write_str("access outside device address space"),
            Error::InstanceTaken => f.write_str("bus instance already taken"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self.fault() {
            Some(Fault::AddressNack) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Some(Fault::DataNack) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Some(Fault::BusError) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

pub struct SercomI2c<H: HardwareInterface, L: Logger = NoOpLogger> {
    hw: H,
    config: I2cConfig,
    logger: L,
    /// The last transfer ended without STOP; the bus is still ours.
    held: bool,
}

impl<H: HardwareInterface, L: Logger> SercomI2c<H, L> {
    pub fn new(hw: H, logger: L) -> Self {
        Self {
            hw,
            config: I2cConfigBuilder::new().build(),
            logger,
            held: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn free(self) -> (H, L) {
        (self.hw, self.logger)
    }

    /// Run `poll` until it stops blocking or `budget` attempts are used up.
    fn bounded<T>(
        &mut self,
        budget: u32,
        mut poll: impl FnMut(&mut Self) -> nb::Result<T, Fault>,
    ) -> Result<T, Fault> {
        for _ in 0..budget {
            match poll(self) {
                Ok(value) => return Ok(value),
                Err(nb::Error::Other(fault)) => return Err(fault),
                Err(nb::Error::WouldBlock) => core::hint::spin_loop(),
            }
        }
        Err(Fault::Timeout)
    }

    fn wait_sync(&mut self, mask: u32) -> Result<(), Error> {
        let budget = self.config.idle_retries;
        self.bounded(budget, |s| {
            if s.hw.read_syncbusy() & mask == 0 {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        })
        .map_err(|_| Error::SyncTimeout)
    }

    /// One look at the peripheral: done when any `wanted` flag is up.
    fn poll_transfer(&mut self, wanted: Flags) -> nb::Result<Status, Fault> {
        let status = self.hw.read_status();
        if status.intersects(Status::BUSERR | Status::ARBLOST) {
            return Err(nb::Error::Other(Fault::BusError));
        }
        if self.hw.read_flags().intersects(wanted) {
            Ok(status)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn wait_flags(&mut self, wanted: Flags, budget: u32) -> Result<Status, Fault> {
        self.bounded(budget, |s| s.poll_transfer(wanted))
    }

    fn set_ack_action(&mut self, nack: bool) {
        let value = self.hw.read_ctrlb() & !ctrlb::CMD_MASK;
        let value = if nack {
            value | ctrlb::ACKACT
        } else {
            value & !ctrlb::ACKACT
        };
        self.hw.write_ctrlb(value);
    }

    fn command(&mut self, command: Command) -> Result<(), Error> {
        let value = self.hw.read_ctrlb() & !ctrlb::CMD_MASK;
        self.hw.write_ctrlb(value | command.bits());
        self.wait_sync(syncbusy::SYSOP)
    }

    fn force_idle(&mut self) -> Result<(), Fault> {
        self.hw.write_status(BusState::Idle.as_status());
        let budget = self.config.idle_retries;
        self.bounded(budget, |s| {
            if s.hw.read_status().bus_state() == BusState::Idle {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        })
        .map_err(|_| Fault::BusStuck)
    }

    /// Get the bus to idle before a fresh START.
    fn prepare_bus(&mut self) -> Result<(), Fault> {
        if self.held {
            return Ok(());
        }
        let status = self.hw.read_status();
        if status.intersects(Status::BUSERR | Status::ARBLOST) {
            self.hw.write_status(Status::BUSERR | Status::ARBLOST);
        }
        if status.bus_state() == BusState::Idle || self.force_idle().is_ok() {
            return Ok(());
        }
        if cfg!(feature = "bus-recovery") {
            self.recover_bus().map_err(|_| Fault::BusStuck)?;
            return self.force_idle();
        }
        Err(Fault::BusStuck)
    }

    /// Log, release the bus and build the error for a failed transfer.
    fn abort(&mut self, address: u8, fault: Fault, transferred: usize) -> Error {
        self.logger.error_fmt(format_args!(
            "i2c{}: {:?} at 0x{:02x} after {} bytes",
            self.hw.instance().index(),
            fault,
            address,
            transferred
        ));
        self.set_ack_action(true);
        // STOP is best effort here, the fault is what gets reported.
        let _ = self.command(Command::Stop);
        self.held = false;
        Error::Transfer { fault, transferred }
    }

    fn finish(&mut self, stop: Stop) -> Result<(), Error> {
        match stop {
            Stop::Release => {
                self.held = false;
                self.command(Command::Stop)
            }
            Stop::Hold => {
                self.held = true;
                Ok(())
            }
        }
    }

    /// Address `address` for writing and stream `bytes` in one data phase.
    fn write_from<'b>(
        &mut self,
        address: u8,
        bytes: impl IntoIterator<Item = &'b u8>,
        stop: Stop,
    ) -> Result<usize, Error> {
        if let Err(fault) = self.prepare_bus() {
            return Err(self.abort(address, fault, 0));
        }
        self.held = false;
        self.hw.write_addr(u32::from(address) << 1);

        let budget = self.config.address_retries;
        match self.wait_flags(Flags::MB, budget) {
            Ok(status) if status.contains(Status::RXNACK) => {
                return Err(self.abort(address, Fault::AddressNack, 0));
            }
            Ok(_) => {}
            Err(fault) => return Err(self.abort(address, fault, 0)),
        }

        let budget = self.config.data_retries;
        let mut transferred = 0;
        for &byte in bytes {
            self.hw.write_data(byte);
            match self.wait_flags(Flags::MB, budget) {
                Ok(status) if status.contains(Status::RXNACK) => {
                    return Err(self.abort(address, Fault::DataNack, transferred));
                }
                Ok(_) => transferred += 1,
                Err(fault) => return Err(self.abort(address, fault, transferred)),
            }
        }

        if self.finish(stop).is_err() {
            return Err(self.abort(address, Fault::Timeout, transferred));
        }
        Ok(transferred)
    }

    /// Address `address` for reading and fill `slots` in order. The last slot
    /// is answered with NACK.
    fn read_into<'b>(
        &mut self,
        address: u8,
        slots: impl IntoIterator<Item = &'b mut u8>,
        stop: Stop,
    ) -> Result<usize, Error> {
        if let Err(fault) = self.prepare_bus() {
            return Err(self.abort(address, fault, 0));
        }
        self.held = false;
        self.set_ack_action(false);
        self.hw.write_addr((u32::from(address) << 1) | 1);

        let budget = self.config.address_retries;
        match self.wait_flags(Flags::SB | Flags::MB, budget) {
            Ok(status) if status.contains(Status::RXNACK) => {
                return Err(self.abort(address, Fault::AddressNack, 0));
            }
            Ok(_) => {}
            Err(fault) => return Err(self.abort(address, fault, 0)),
        }

        let budget = self.config.data_retries;
        let mut slots = slots.into_iter().peekable();
        let mut transferred = 0;
        if slots.peek().is_none() {
            // The peripheral already clocked in one byte; refuse it.
            self.set_ack_action(true);
        }
        while let Some(slot) = slots.next() {
            if let Err(fault) = self.wait_flags(Flags::SB, budget) {
                return Err(self.abort(address, fault, transferred));
            }
            *slot = self.hw.read_data();
            transferred += 1;
            if slots.peek().is_some() {
                self.set_ack_action(false);
                if self.command(Command::Read).is_err() {
                    return Err(self.abort(address, Fault::Timeout, transferred));
                }
            } else {
                self.set_ack_action(true);
            }
        }

        if self.finish(stop).is_err() {
            return Err(self.abort(address, Fault::Timeout, transferred));
        }
        Ok(transferred)
    }
}

impl<H: HardwareInterface, L: Logger> I2cHardwareCore for SercomI2c<H, L> {
    type Error = Error;

    fn init(&mut self, config: &I2cConfig) -> Result<(), Error> {
        if self.hw.read_ctrla() & ctrla::ENABLE != 0 {
            return Err(Error::AlreadyInitialized);
        }
        self.config = *config;
        let mode = ctrla::MODE_I2C_MASTER | ctrla::sdahold(config.sda_hold as u32) | ctrla::speed(0);
        self.hw.write_ctrla(mode);
        let divisor = self.configure_timing(config.speed, config.source_clock)?;

        self.hw.write_ctrla(mode | ctrla::ENABLE);
        self.wait_sync(syncbusy::ENABLE)?;
        self.hw.write_status(BusState::Idle.as_status());
        self.wait_sync(syncbusy::SYSOP)?;
        self.held = false;

        self.logger.debug_fmt(format_args!(
            "i2c{}: enabled, {} Hz, baud {}",
            self.hw.instance().index(),
            config.speed.frequency().raw(),
            divisor
        ));
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), Error> {
        let current = self.hw.read_ctrla();
        self.hw.write_ctrla(current & !ctrla::ENABLE);
        self.wait_sync(syncbusy::ENABLE)?;
        software_reset(&mut self.hw, self.config.idle_retries)?;
        self.held = false;
        Ok(())
    }

    fn configure_timing(&mut self, speed: I2cSpeed, source: HertzU32) -> Result<u8, Error> {
        // BAUD is enable-protected.
        if self.hw.read_ctrla() & ctrla::ENABLE != 0 {
            return Err(Error::AlreadyInitialized);
        }
        let candidate = I2cConfig {
            speed,
            source_clock: source,
            ..self.config
        };
        let divisor = candidate.baud_divisor().ok_or(Error::UnsupportedBaud)?;
        self.hw.write_baud(u32::from(divisor));
        self.config = candidate;
        Ok(divisor)
    }

    fn bus_status(&self) -> BusStatus {
        BusStatus::from(self.hw.read_status())
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        let instance = self.hw.instance().index();
        self.logger
            .debug_fmt(format_args!("i2c{instance}: bus not idle, recovering"));

        let saved = self.hw.read_ctrla();
        self.hw.write_ctrla(saved & !ctrla::ENABLE);
        self.wait_sync(syncbusy::ENABLE)?;
        self.hw.detach_lines();

        let half = self.config.half_period_cycles();
        let mut pulses = 0;
        while !self.hw.sda_is_high() && pulses < self.config.recovery_pulses {
            self.hw.set_scl(false);
            self.hw.half_period_delay(half);
            self.hw.set_scl(true);
            self.hw.half_period_delay(half);
            pulses += 1;
        }
        let released = self.hw.sda_is_high();

        // STOP: SDA rises while SCL is high.
        self.hw.set_scl(false);
        self.hw.set_sda(false);
        self.hw.half_period_delay(half);
        self.hw.set_scl(true);
        self.hw.half_period_delay(half);
        self.hw.set_sda(true);
        self.hw.half_period_delay(half);

        self.hw.attach_lines();
        self.hw.write_ctrla(saved | ctrla::ENABLE);
        self.wait_sync(syncbusy::ENABLE)?;
        self.hw.write_status(BusState::Idle.as_status());
        self.wait_sync(syncbusy::SYSOP)?;
        self.held = false;

        if released {
            self.logger
                .debug_fmt(format_args!("i2c{instance}: SDA released after {pulses} pulses"));
            Ok(())
        } else {
            self.logger
                .error_fmt(format_args!("i2c{instance}: SDA stuck low after {pulses} pulses"));
            Err(Error::Transfer {
                fault: Fault::BusStuck,
                transferred: 0,
            })
        }
    }
}

impl<H: HardwareInterface, L: Logger> I2cMaster<SevenBitAddress> for SercomI2c<H, L> {
    fn write(&mut self, addr: u8, bytes: &[u8], stop: Stop) -> Result<usize, Error> {
        self.write_from(addr, bytes, stop)
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<usize, Error> {
        self.read_into(addr, buffer.iter_mut(), Stop::Release)
    }

    fn write_registers(
        &mut self,
        addr: u8,
        register: RegisterAddress,
        bytes: &[u8],
        stop: Stop,
    ) -> Result<usize, Error> {
        let pointer = register.bytes();
        let skipped = pointer.len();
        self.write_from(addr, pointer.iter().chain(bytes), stop)
            .map(|n| n.saturating_sub(skipped))
            .map_err(|e| e.shifted(skipped))
    }

    fn read_registers(
        &mut self,
        addr: u8,
        register: RegisterAddress,
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        let pointer = register.bytes();
        // A failed pointer phase moved no payload.
        self.write(addr, &pointer, Stop::Hold)
            .map_err(|e| e.shifted(pointer.len()))?;
        self.read(addr, buffer)
    }

    fn transaction_slice(
        &mut self,
        addr: u8,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut start = 0;
        while start < ops_slice.len() {
            let is_read = matches!(ops_slice.get(start), Some(Operation::Read(_)));
            let end = ops_slice
                .iter()
                .skip(start)
                .position(|op| matches!(op, Operation::Read(_)) != is_read)
                .map_or(ops_slice.len(), |run| start + run);
            let stop = if end == ops_slice.len() {
                Stop::Release
            } else {
                Stop::Hold
            };
            let group = ops_slice.get_mut(start..end).unwrap_or_default();
            if is_read {
                let slots = group.iter_mut().flat_map(|op| match op {
                    Operation::Read(buffer) => buffer.iter_mut(),
                    Operation::Write(_) => <&mut [u8]>::default().iter_mut(),
                });
                self.read_into(addr, slots, stop)?;
            } else {
                let bytes = group.iter().flat_map(|op| match op {
                    Operation::Write(bytes) => bytes.iter(),
                    Operation::Read(_) => <&[u8]>::default().iter(),
                });
                self.write_from(addr, bytes, stop)?;
            }
            start = end;
        }
        Ok(())
    }
}
