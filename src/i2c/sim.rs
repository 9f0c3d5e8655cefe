// Licensed under the Apache-2.0 license

//! Simulated SERCOM I2C master for host tests.
//!
//! `SimBus` implements [`HardwareInterface`] with the register semantics the
//! engine relies on and records what would have appeared on the wire.

use crate::i2c::common::BusInstance;
use crate::i2c::hardware_interface::HardwareInterface;
use crate::i2c::registers::{ctrla, ctrlb, syncbusy, BusState, Command, Flags, Status};

/// Wire-level event. `Ack`/`Nack` is the acknowledge bit following the
/// previous address or byte, whichever side drove it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Start,
    RepeatedStart,
    Address(u8),
    Byte(u8),
    Ack,
    Nack,
    Stop,
    /// One SCL pulse issued while the lines were under GPIO control.
    ClockPulse,
    /// STOP condition generated by hand on the GPIO lines.
    LineStop,
}

/// Device with a register pointer over a linear memory, the way EEPROMs and
/// RTCs behave.
#[derive(Clone, Debug)]
pub struct MemoryDevice {
    pub address: u8,
    pub address_size: usize,
    pub memory: Vec<u8>,
    pub pointer: usize,
    pending_pointer: usize,
    pointer_bytes: usize,
    /// Pointer values received, one entry per completed pointer phase.
    pub pointer_writes: Vec<usize>,
}

impl MemoryDevice {
    pub fn new(address: u8, address_size: usize, size: usize) -> Self {
        Self {
            address,
            address_size,
            memory: vec![0; size],
            pointer: 0,
            pending_pointer: 0,
            pointer_bytes: 0,
            pointer_writes: Vec::new(),
        }
    }

    pub fn with_contents(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn begin_write(&mut self) {
        self.pending_pointer = 0;
        self.pointer_bytes = 0;
    }

    fn receive(&mut self, byte: u8) {
        if self.pointer_bytes < self.address_size {
            self.pending_pointer = (self.pending_pointer << 8) | usize::from(byte);
            self.pointer_bytes += 1;
            if self.pointer_bytes == self.address_size {
                self.pointer = self.pending_pointer % self.memory.len();
                self.pointer_writes.push(self.pointer);
            }
        } else {
            self.memory[self.pointer] = byte;
            self.pointer = (self.pointer + 1) % self.memory.len();
        }
    }

    fn transmit(&mut self) -> u8 {
        let byte = self.memory[self.pointer];
        self.pointer = (self.pointer + 1) % self.memory.len();
        byte
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Direction {
    Write,
    Read,
}

pub struct SimBus {
    instance: BusInstance,
    ctrla: u32,
    ctrlb: u32,
    baud: u32,
    status: Status,
    flags: Flags,
    data: u8,

    direction: Option<Direction>,
    active: Option<usize>,
    bytes_in_transfer: usize,

    pub devices: Vec<MemoryDevice>,
    pub events: Vec<Event>,

    /// The addressed device NACKs write byte `k` (zero based) and later.
    pub nack_from_byte: Option<usize>,
    /// BUSERR is raised instead of completing write byte `k`.
    pub bus_error_on_byte: Option<usize>,
    /// Data bytes never complete, flags are never raised.
    pub stall_data: bool,
    /// Ignore writes forcing BUSSTATE to idle.
    pub ignore_force_idle: bool,
    /// SDA is held low by a device until this many SCL pulses have been seen.
    /// `Some(u8::MAX)` never releases.
    pub stuck_for_pulses: Option<u8>,
    /// SYNCBUSY.SYSOP stays set from the first time this command is issued
    /// until the next software reset.
    pub stall_sync_on: Option<Command>,

    sysop_busy: bool,
    detached: bool,
    scl_high: bool,
    sda_driven_high: bool,
    pub resets: usize,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            instance: BusInstance::Twi0,
            ctrla: 0,
            ctrlb: 0,
            baud: 0,
            status: BusState::Unknown.as_status(),
            flags: Flags::empty(),
            data: 0,
            direction: None,
            active: None,
            bytes_in_transfer: 0,
            devices: Vec::new(),
            events: Vec::new(),
            nack_from_byte: None,
            bus_error_on_byte: None,
            stall_data: false,
            ignore_force_idle: false,
            stuck_for_pulses: None,
            stall_sync_on: None,
            sysop_busy: false,
            detached: false,
            scl_high: true,
            sda_driven_high: true,
            resets: 0,
        }
    }

    pub fn with_device(mut self, device: MemoryDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn with_bus_state(mut self, state: BusState) -> Self {
        self.status = self.status.with_bus_state(state);
        self
    }

    pub fn device(&self, address: u8) -> &MemoryDevice {
        self.devices
            .iter()
            .find(|d| d.address == address)
            .expect("no such simulated device")
    }

    pub fn bus_state(&self) -> BusState {
        self.status.bus_state()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        core::mem::take(&mut self.events)
    }

    fn stuck(&self) -> bool {
        self.stuck_for_pulses.is_some_and(|remaining| remaining > 0)
    }

    fn set_state(&mut self, state: BusState) {
        self.status = self.status.with_bus_state(state);
    }

    fn ack_action_event(&self) -> Event {
        if self.ctrlb & ctrlb::ACKACT == 0 {
            Event::Ack
        } else {
            Event::Nack
        }
    }

    fn load_read_byte(&mut self) {
        if self.stall_data {
            return;
        }
        if let Some(device) = self.active.and_then(|i| self.devices.get_mut(i)) {
            self.data = device.transmit();
        } else {
            self.data = 0xFF;
        }
        self.events.push(Event::Byte(self.data));
        self.flags = Flags::SB;
    }

    fn release_bus(&mut self) {
        self.direction = None;
        self.active = None;
        self.flags = Flags::empty();
        self.set_state(BusState::Idle);
    }
}

impl HardwareInterface for SimBus {
    fn instance(&self) -> BusInstance {
        self.instance
    }

    fn read_ctrla(&self) -> u32 {
        self.ctrla
    }

    fn write_ctrla(&mut self, value: u32) {
        if value & ctrla::SWRST != 0 {
            self.resets += 1;
            self.ctrla = 0;
            self.ctrlb = 0;
            self.baud = 0;
            self.flags = Flags::empty();
            let state = if self.stuck() {
                BusState::Busy
            } else {
                BusState::Unknown
            };
            self.status = state.as_status();
            self.direction = None;
            self.active = None;
            self.sysop_busy = false;
        } else {
            self.ctrla = value;
        }
    }

    fn read_ctrlb(&self) -> u32 {
        self.ctrlb
    }

    fn write_ctrlb(&mut self, value: u32) {
        let command = Command::from_ctrlb(value);
        self.ctrlb = value & !ctrlb::CMD_MASK;
        if command != Command::None && self.stall_sync_on == Some(command) {
            self.sysop_busy = true;
        }
        match command {
            Command::None | Command::Start => {}
            Command::Read => {
                if self.direction == Some(Direction::Read) {
                    self.events.push(self.ack_action_event());
                    self.flags = Flags::empty();
                    self.load_read_byte();
                }
            }
            Command::Stop => {
                if self.direction == Some(Direction::Read) {
                    self.events.push(self.ack_action_event());
                }
                self.events.push(Event::Stop);
                self.release_bus();
            }
        }
    }

    fn read_baud(&self) -> u32 {
        self.baud
    }

    fn write_baud(&mut self, value: u32) {
        self.baud = value;
    }

    fn read_status(&self) -> Status {
        self.status
    }

    fn write_status(&mut self, value: Status) {
        let clearable = Status::BUSERR | Status::ARBLOST | Status::LOWTOUT;
        self.status -= value & clearable;
        if value.bus_state() == BusState::Idle && !self.ignore_force_idle && !self.stuck() {
            self.release_bus();
        }
    }

    fn read_flags(&self) -> Flags {
        self.flags
    }

    fn read_syncbusy(&self) -> u32 {
        if self.sysop_busy {
            syncbusy::SYSOP
        } else {
            0
        }
    }

    fn write_addr(&mut self, value: u32) {
        let owner = self.status.bus_state() == BusState::Owner;
        if owner {
            if self.direction == Some(Direction::Read) {
                self.events.push(self.ack_action_event());
            }
            self.events.push(Event::RepeatedStart);
        } else {
            self.events.push(Event::Start);
        }
        let address_byte = (value & 0xFF) as u8;
        self.events.push(Event::Address(address_byte));
        self.set_state(BusState::Owner);
        self.flags = Flags::empty();
        self.status -= Status::RXNACK;
        self.bytes_in_transfer = 0;

        let target = address_byte >> 1;
        let read = address_byte & 1 == 1;
        self.active = self.devices.iter().position(|d| d.address == target);
        let Some(index) = self.active else {
            self.events.push(Event::Nack);
            self.status |= Status::RXNACK;
            self.direction = Some(Direction::Write);
            self.flags = Flags::MB;
            return;
        };
        self.events.push(Event::Ack);
        if read {
            self.direction = Some(Direction::Read);
            self.load_read_byte();
        } else {
            self.direction = Some(Direction::Write);
            self.devices[index].begin_write();
            self.flags = Flags::MB;
        }
    }

    fn read_data(&mut self) -> u8 {
        self.data
    }

    fn write_data(&mut self, value: u8) {
        self.flags = Flags::empty();
        self.events.push(Event::Byte(value));
        let index = self.bytes_in_transfer;
        self.bytes_in_transfer += 1;
        if self.stall_data {
            return;
        }
        if self.bus_error_on_byte == Some(index) {
            self.status |= Status::BUSERR;
            self.set_state(BusState::Unknown);
            self.flags = Flags::MB | Flags::ERROR;
            return;
        }
        let acked = self.active.is_some() && self.nack_from_byte.map_or(true, |k| index < k);
        if acked {
            if let Some(device) = self.active.and_then(|i| self.devices.get_mut(i)) {
                device.receive(value);
            }
            self.events.push(Event::Ack);
            self.status -= Status::RXNACK;
        } else {
            self.events.push(Event::Nack);
            self.status |= Status::RXNACK;
        }
        self.flags = Flags::MB;
    }

    fn detach_lines(&mut self) {
        self.detached = true;
        self.scl_high = true;
        self.sda_driven_high = true;
    }

    fn attach_lines(&mut self) {
        self.detached = false;
    }

    fn set_scl(&mut self, high: bool) {
        if !self.detached {
            return;
        }
        // A rising edge with SDA driven low belongs to a STOP, not a pulse.
        if high && !self.scl_high && self.sda_driven_high {
            self.events.push(Event::ClockPulse);
            if let Some(remaining) = self.stuck_for_pulses.as_mut() {
                if *remaining != u8::MAX && *remaining > 0 {
                    *remaining -= 1;
                }
            }
        }
        self.scl_high = high;
    }

    fn set_sda(&mut self, high: bool) {
        if !self.detached {
            return;
        }
        if high && !self.sda_driven_high && self.scl_high && !self.stuck() {
            self.events.push(Event::LineStop);
        }
        self.sda_driven_high = high;
    }

    fn sda_is_high(&self) -> bool {
        self.sda_driven_high && !self.stuck()
    }

    fn half_period_delay(&mut self, _cycles: u32) {}
}
