// Licensed under the Apache-2.0 license

//! SERCOM I2C master bit fields (SAMD21 family). Register access goes
//! through the PAC, see [`crate::i2c::hardware_interface`].

use bitflags::bitflags;

pub mod ctrla {
    pub const SWRST: u32 = 1 << 0;
    pub const ENABLE: u32 = 1 << 1;
    /// MODE field value 0x5 selects I2C master.
    pub const MODE_I2C_MASTER: u32 = 0x5 << 2;
    pub const SDAHOLD_SHIFT: u32 = 20;
    pub const SDAHOLD_MASK: u32 = 0x3 << SDAHOLD_SHIFT;
    pub const SPEED_SHIFT: u32 = 24;
    pub const SPEED_MASK: u32 = 0x3 << SPEED_SHIFT;

    #[must_use]
    pub const fn sdahold(value: u32) -> u32 {
        (value << SDAHOLD_SHIFT) & SDAHOLD_MASK
    }

    #[must_use]
    pub const fn speed(value: u32) -> u32 {
        (value << SPEED_SHIFT) & SPEED_MASK
    }
}

pub mod ctrlb {
    pub const CMD_SHIFT: u32 = 16;
    pub const CMD_MASK: u32 = 0x3 << CMD_SHIFT;
    /// Not-acknowledge on the next receive command when set.
    pub const ACKACT: u32 = 1 << 18;
}

/// Master command field of CTRLB.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    None = 0x0,
    /// Repeated START when the master owns the bus.
    Start = 0x1,
    /// Acknowledge action, then receive the next byte.
    Read = 0x2,
    /// Acknowledge action, then STOP.
    Stop = 0x3,
}

impl Command {
    #[must_use]
    pub const fn bits(self) -> u32 {
        (self as u32) << ctrlb::CMD_SHIFT
    }

    #[must_use]
    pub const fn from_ctrlb(ctrlb: u32) -> Self {
        match (ctrlb & ctrlb::CMD_MASK) >> ctrlb::CMD_SHIFT {
            0x1 => Command::Start,
            0x2 => Command::Read,
            0x3 => Command::Stop,
            _ => Command::None,
        }
    }
}

pub mod syncbusy {
    pub const SWRST: u32 = 1 << 0;
    pub const ENABLE: u32 = 1 << 1;
    pub const SYSOP: u32 = 1 << 2;
}

bitflags! {
    /// INTFLAG register bits.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// Master on bus: a write-direction byte (or address) completed.
        const MB = 1 << 0;
        /// Slave on bus: a read-direction byte is available in DATA.
        const SB = 1 << 1;
        const ERROR = 1 << 7;
    }
}

bitflags! {
    /// STATUS register bits. BUSSTATE is a two-bit field, see [`BusState`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Status: u16 {
        const BUSERR = 1 << 0;
        const ARBLOST = 1 << 1;
        const RXNACK = 1 << 2;
        const BUSSTATE = 0x3 << 4;
        const LOWTOUT = 1 << 6;
        const CLKHOLD = 1 << 7;
    }
}

const BUSSTATE_SHIFT: u16 = 4;

/// Bus state as tracked by the SERCOM.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum BusState {
    Unknown = 0,
    Idle = 1,
    Owner = 2,
    Busy = 3,
}

impl BusState {
    /// STATUS value that forces the bus into this state when written.
    #[must_use]
    pub fn as_status(self) -> Status {
        Status::from_bits_retain((self as u16) << BUSSTATE_SHIFT)
    }
}

impl Status {
    #[must_use]
    pub fn bus_state(self) -> BusState {
        match (self.bits() & Status::BUSSTATE.bits()) >> BUSSTATE_SHIFT {
            1 => BusState::Idle,
            2 => BusState::Owner,
            3 => BusState::Busy,
            _ => BusState::Unknown,
        }
    }

    #[must_use]
    pub fn with_bus_state(self, state: BusState) -> Status {
        (self - Status::BUSSTATE) | state.as_status()
    }
}

/// Transient snapshot of the bus, recomputed on every poll.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusStatus {
    pub state: BusState,
    pub error: bool,
    pub rx_nack: bool,
}

impl From<Status> for BusStatus {
    fn from(status: Status) -> Self {
        Self {
            state: status.bus_state(),
            error: status.contains(Status::BUSERR),
            rx_nack: status.contains(Status::RXNACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_state_round_trips_through_status() {
        for state in [
            BusState::Unknown,
            BusState::Idle,
            BusState::Owner,
            BusState::Busy,
        ] {
            let status = (Status::RXNACK | Status::BUSSTATE).with_bus_state(state);
            assert_eq!(status.bus_state(), state);
            assert!(status.contains(Status::RXNACK));
        }
    }

    #[test]
    fn command_field_is_decoded_from_ctrlb() {
        let ctrlb = ctrlb::ACKACT | Command::Stop.bits();
        assert_eq!(Command::from_ctrlb(ctrlb), Command::Stop);
        assert_eq!(Command::from_ctrlb(ctrlb::ACKACT), Command::None);
    }

    #[test]
    fn master_mode_ctrla_matches_datasheet_encoding() {
        let value = ctrla::MODE_I2C_MASTER | ctrla::sdahold(3) | ctrla::speed(0);
        assert_eq!(value, 0x0030_0014);
        assert_eq!(ctrla::speed(2), 0x0200_0000);
    }

    #[test]
    fn bus_status_snapshot() {
        let status = Status::BUSERR | BusState::Busy.as_status();
        let snapshot = BusStatus::from(status);
        assert_eq!(snapshot.state, BusState::Busy);
        assert!(snapshot.error);
        assert!(!snapshot.rx_nack);
    }
}
