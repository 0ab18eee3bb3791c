//! JBD variable-frame protocol.
//!
//! Request: `0xDD | action | register | length | data | crc16 | 0x77`
//! Reply:   `0xDD | register | status | length | data | crc16 | 0x77`
//!
//! The CRC is the 16-bit two's complement of the byte sum from offset 2 up to the
//! end of the data, i.e. `register, length, data` in a request and
//! `status, length, data` in a reply.

use super::{Action, Command, Payload};
use crate::error::{DecodeError, Error, FrameError};
use crate::snapshot::{MAX_CELLS, MAX_TEMP_SENSORS};
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

const START_BYTE: u8 = 0xdd;
const END_BYTE: u8 = 0x77;
const READ: u8 = 0xa5;
const WRITE: u8 = 0x5a;

/// Start, two header bytes, length, two CRC bytes, end.
pub const FRAME_OVERHEAD: usize = 7;
/// Bytes up to and including the length field.
pub const HEADER_LENGTH: usize = 4;
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;

/// Offset of the first NTC reading in the HWINFO payload.
const HWINFO_FIXED_LENGTH: usize = 23;
/// Kelvin offset of the NTC readings, in tenths of a degree.
const KELVIN_OFFSET: i32 = 2731;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    HwInfo = 0x03,
    CellInfo = 0x04,
    HwVersion = 0x05,
    Mos = 0xe1,
}

impl Register {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::HwInfo => "HWINFO",
            Register::CellInfo => "CELLINFO",
            Register::HwVersion => "HWVER",
            Register::Mos => "MOS",
        }
    }

    fn payload(self, data: &[u8]) -> Payload<'_> {
        Payload::new(self.name(), data)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({:#04X})", self.name(), self.code())
    }
}

/// Negated 16-bit sum over `bytes`.
pub fn crc(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |crc, b| crc.wrapping_sub(u16::from(*b)))
}

fn frame(first: u8, second: u8, data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() > MAX_PAYLOAD_LENGTH {
        return Err(Error::PayloadTooLong {
            len: data.len(),
            capacity: MAX_PAYLOAD_LENGTH,
        });
    }
    Ok(build(first, second, data))
}

fn build(first: u8, second: u8, data: &[u8]) -> Vec<u8> {
    let mut tx_buffer = Vec::with_capacity(data.len() + FRAME_OVERHEAD);
    tx_buffer.push(START_BYTE);
    tx_buffer.push(first);
    tx_buffer.push(second);
    tx_buffer.push(data.len() as u8);
    tx_buffer.extend_from_slice(data);
    let checksum = crc(&tx_buffer[2..]);
    tx_buffer.extend_from_slice(&checksum.to_be_bytes());
    tx_buffer.push(END_BYTE);
    tx_buffer
}

/// Request frame for a plain read of `register`.
pub fn request(register: Register) -> Vec<u8> {
    build(READ, register.code(), &[])
}

/// Builds the request frame for `command`. Read requests never carry data.
pub fn encode(command: &Command) -> Result<Vec<u8>, Error> {
    match command.action {
        Action::Read => frame(READ, command.register, &[]),
        Action::Write => frame(WRITE, command.register, &command.payload),
    }
}

/// Builds a reply frame, the way the BMS answers a request.
pub fn encode_reply(register: u8, status: u8, data: &[u8]) -> Result<Vec<u8>, Error> {
    frame(register, status, data)
}

/// Validates framing, length and CRC and returns the two header bytes and the
/// data.
fn split(rx_buffer: &[u8]) -> Result<(u8, u8, &[u8]), FrameError> {
    if rx_buffer.len() < FRAME_OVERHEAD {
        return Err(FrameError::TooShort {
            required: FRAME_OVERHEAD,
            received: rx_buffer.len(),
        });
    }
    if rx_buffer[0] != START_BYTE {
        return Err(FrameError::BadStart(rx_buffer[0]));
    }
    let declared = usize::from(rx_buffer[3]);
    let actual = rx_buffer.len() - FRAME_OVERHEAD;
    if declared != actual {
        log::warn!(
            "Invalid length - declared={} actual={} buffer={:02X?}",
            declared,
            actual,
            rx_buffer
        );
        return Err(FrameError::LengthMismatch { declared, actual });
    }
    let data_end = HEADER_LENGTH + declared;
    let calculated = crc(&rx_buffer[2..data_end]);
    let received = u16::from_be_bytes([rx_buffer[data_end], rx_buffer[data_end + 1]]);
    if calculated != received {
        log::warn!(
            "Invalid CRC - calculated={:04X?} received={:04X?} buffer={:02X?}",
            calculated,
            received,
            rx_buffer
        );
        return Err(FrameError::CrcMismatch {
            calculated,
            received,
        });
    }
    let end = rx_buffer[data_end + 2];
    if end != END_BYTE {
        return Err(FrameError::BadEnd(end));
    }
    Ok((rx_buffer[1], rx_buffer[2], &rx_buffer[HEADER_LENGTH..data_end]))
}

/// A validated reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub register: u8,
    pub status: u8,
    pub payload: Vec<u8>,
}

impl Reply {
    /// Checks that this answers `register` and that the BMS reported success.
    pub fn expect(self, register: Register) -> Result<Self, FrameError> {
        if self.register != register.code() {
            return Err(FrameError::UnexpectedRegister {
                expected: register.code(),
                received: self.register,
            });
        }
        if self.status != 0 {
            return Err(FrameError::ErrorStatus(self.status));
        }
        Ok(self)
    }
}

pub fn decode(rx_buffer: &[u8]) -> Result<Reply, FrameError> {
    let (register, status, payload) = split(rx_buffer)?;
    Ok(Reply {
        register,
        status,
        payload: payload.to_vec(),
    })
}

/// Parses a request frame back into its command.
pub fn decode_request(tx_buffer: &[u8]) -> Result<Command, FrameError> {
    let (action, register, payload) = split(tx_buffer)?;
    match action {
        READ => Ok(Command::read(register)),
        WRITE => Ok(Command::write(register, payload)),
        other => Err(FrameError::BadAction(other)),
    }
}

/// Number of bytes still to read once the 4-byte header is in.
pub fn remaining_length(header: &[u8]) -> Option<usize> {
    (header.len() >= HEADER_LENGTH && header[0] == START_BYTE)
        .then(|| usize::from(header[3]) + FRAME_OVERHEAD - HEADER_LENGTH)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Protection {
    pub cell_overvoltage: bool,
    pub cell_undervoltage: bool,
    pub pack_overvoltage: bool,
    pub pack_undervoltage: bool,
    pub charge_overtemperature: bool,
    pub charge_undertemperature: bool,
    pub discharge_overtemperature: bool,
    pub discharge_undertemperature: bool,
    pub charge_overcurrent: bool,
    pub discharge_overcurrent: bool,
    pub short_circuit: bool,
    pub front_end_ic_error: bool,
    pub mos_software_lock: bool,
}

impl From<u16> for Protection {
    fn from(word: u16) -> Self {
        Self {
            cell_overvoltage: read_bit!(word, 0),
            cell_undervoltage: read_bit!(word, 1),
            pack_overvoltage: read_bit!(word, 2),
            pack_undervoltage: read_bit!(word, 3),
            charge_overtemperature: read_bit!(word, 4),
            charge_undertemperature: read_bit!(word, 5),
            discharge_overtemperature: read_bit!(word, 6),
            discharge_undertemperature: read_bit!(word, 7),
            charge_overcurrent: read_bit!(word, 8),
            discharge_overcurrent: read_bit!(word, 9),
            short_circuit: read_bit!(word, 10),
            front_end_ic_error: read_bit!(word, 11),
            mos_software_lock: read_bit!(word, 12),
        }
    }
}

impl Protection {
    pub fn any(&self) -> bool {
        self.active().next().is_some()
    }

    /// Names of the raised protection flags.
    pub fn active(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.cell_overvoltage, "cell overvoltage"),
            (self.cell_undervoltage, "cell undervoltage"),
            (self.pack_overvoltage, "pack overvoltage"),
            (self.pack_undervoltage, "pack undervoltage"),
            (self.charge_overtemperature, "charge overtemperature"),
            (self.charge_undertemperature, "charge undertemperature"),
            (self.discharge_overtemperature, "discharge overtemperature"),
            (self.discharge_undertemperature, "discharge undertemperature"),
            (self.charge_overcurrent, "charge overcurrent"),
            (self.discharge_overcurrent, "discharge overcurrent"),
            (self.short_circuit, "short circuit"),
            (self.front_end_ic_error, "front end IC error"),
            (self.mos_software_lock, "MOS software lock"),
        ]
        .into_iter()
        .filter_map(|(raised, name)| raised.then_some(name))
    }
}

/// Basic information block (register 0x03).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HwInfo {
    pub total_voltage: f32,
    pub current: f32, // positive=charging
    pub residual_capacity_ah: f32,
    pub full_capacity_ah: f32,
    pub cycles: u16,
    pub balance_bits: u32,
    pub protection: Protection,
    pub software_version: u8,
    pub soc_percent: u8,
    pub charging_mosfet: bool,
    pub discharging_mosfet: bool,
    /// Cell count as reported, clipped to [`MAX_CELLS`].
    pub cells: u8,
    pub temperatures: Vec<f32>,
}

impl HwInfo {
    pub const REGISTER: Register = Register::HwInfo;

    pub fn command() -> Command {
        Command::read(Self::REGISTER.code())
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        payload.require(HWINFO_FIXED_LENGTH)?;

        let reported_cells = payload.u8(21)?;
        let cells = clip(reported_cells, MAX_CELLS, "cell");
        let sensors = clip(payload.u8(22)?, MAX_TEMP_SENSORS, "temperature sensor");

        payload.require(HWINFO_FIXED_LENGTH + 2 * usize::from(sensors))?;
        let mut temperatures = Vec::with_capacity(usize::from(sensors));
        for i in 0..usize::from(sensors) {
            let raw = payload.i16(HWINFO_FIXED_LENGTH + 2 * i)?;
            temperatures.push((i32::from(raw) - KELVIN_OFFSET) as f32 / 10.0);
        }

        let balance_low = payload.u16(12)?;
        let balance_high = payload.u16(14)?;
        let fet_bits = payload.u8(20)?;

        let info = Self {
            total_voltage: payload.u16(0)? as f32 / 100.0,
            current: payload.i16(2)? as f32 / 100.0,
            residual_capacity_ah: payload.u16(4)? as f32 / 100.0,
            full_capacity_ah: payload.u16(6)? as f32 / 100.0,
            cycles: payload.u16(8)?,
            balance_bits: u32::from(balance_low) | (u32::from(balance_high) << 16),
            protection: Protection::from(payload.u16(16)?),
            software_version: payload.u8(18)?,
            soc_percent: payload.u8(19)?,
            charging_mosfet: read_bit!(fet_bits, 0),
            discharging_mosfet: read_bit!(fet_bits, 1),
            cells,
            temperatures,
        };
        log::debug!("Decoded {}: {:?}", Self::REGISTER, info);
        Ok(info)
    }

    /// Balancing state per cell, bit `i` is cell `i + 1`.
    pub fn balancing(&self) -> Vec<bool> {
        (0..usize::from(self.cells).min(32))
            .map(|cell| read_bit!(self.balance_bits, cell))
            .collect()
    }
}

fn clip(reported: u8, capacity: usize, what: &str) -> u8 {
    if usize::from(reported) > capacity {
        log::warn!(
            "BMS reports {} {}s, only {} are supported",
            reported,
            what,
            capacity
        );
        capacity as u8
    } else {
        reported
    }
}

/// Cell voltage block (register 0x04) with the extremes found in the same pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CellInfo {
    pub voltages: Vec<f32>,
    pub min_voltage: f32,
    /// 1-based
    pub min_cell: u8,
    pub max_voltage: f32,
    /// 1-based
    pub max_cell: u8,
}

impl CellInfo {
    pub const REGISTER: Register = Register::CellInfo;

    pub fn command() -> Command {
        Command::read(Self::REGISTER.code())
    }

    /// Decodes `n_cells` big endian millivolt values. Ties resolve to the lowest
    /// cell number.
    pub fn decode(data: &[u8], n_cells: u8) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        let n_cells = usize::from(n_cells).min(MAX_CELLS);
        payload.require(n_cells * 2)?;

        let mut info = Self {
            voltages: Vec::with_capacity(n_cells),
            min_voltage: 0.0,
            min_cell: 0,
            max_voltage: 0.0,
            max_cell: 0,
        };
        for i in 0..n_cells {
            let volts = payload.u16(2 * i)? as f32 / 1000.0;
            let cell = (i + 1) as u8;
            if i == 0 || volts < info.min_voltage {
                info.min_voltage = volts;
                info.min_cell = cell;
            }
            if i == 0 || volts > info.max_voltage {
                info.max_voltage = volts;
                info.max_cell = cell;
            }
            info.voltages.push(volts);
        }
        if payload.len() > n_cells * 2 {
            log::trace!(
                "Ignoring {} trailing bytes of {}",
                payload.len() - n_cells * 2,
                Self::REGISTER
            );
        }
        Ok(info)
    }
}

/// Hardware version string (register 0x05).
pub struct HwVersion;

impl HwVersion {
    pub const REGISTER: Register = Register::HwVersion;

    pub fn command() -> Command {
        Command::read(Self::REGISTER.code())
    }

    pub fn decode(data: &[u8]) -> String {
        String::from_utf8_lossy(data)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// MOSFET control (register 0xE1). A set bit switches the FET off.
pub struct SetMosfets;

impl SetMosfets {
    pub fn command(charge: bool, discharge: bool) -> Command {
        let mut mask = 0u8;
        if !charge {
            mask |= 0x01;
        }
        if !discharge {
            mask |= 0x02;
        }
        Command::write(Register::Mos.code(), [0x00, mask])
    }
}
