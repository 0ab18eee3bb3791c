//! Daly fixed-frame protocol.
//!
//! Every request and every reply is exactly 13 bytes:
//! `0xA5 | address | register | 0x08 | data[8] | checksum`, where the checksum is
//! the truncated 8-bit sum of the first 12 bytes.

use super::{Command, Payload};
use crate::error::{DecodeError, Error, FrameError};
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

pub const FRAME_LENGTH: usize = 13;
pub const PAYLOAD_LENGTH: usize = 8;
const PAYLOAD_OFFSET: usize = 4;
const START_BYTE: u8 = 0xa5;
const DATA_LENGTH: u8 = 0x08;

/// Upper bound of cells reported by one CELL_VOLTAGES reply frame.
pub const CELLS_PER_FRAME: usize = 3;
/// Upper bound of sensors reported by one CELL_TEMPERATURE reply frame.
pub const SENSORS_PER_FRAME: usize = 7;
/// Width of the balancing bitmask.
pub const BALANCE_BITS: usize = 32;

/// Source address placed in byte 1 of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(pub u8);

impl Address {
    /// The UART upper computer.
    pub const HOST: Address = Address(0x40);
}

impl Default for Address {
    fn default() -> Self {
        Self::HOST
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    BmsReset = 0x00,
    SetSoc = 0x21,
    VoutIoutSoc = 0x90,
    MinMaxCellVoltage = 0x91,
    MinMaxTemperature = 0x92,
    DischargeChargeMosStatus = 0x93,
    StatusInfo = 0x94,
    CellVoltages = 0x95,
    CellTemperature = 0x96,
    CellBalanceState = 0x97,
    FailureCodes = 0x98,
    DischargeFet = 0xd9,
    ChargeFet = 0xda,
}

impl Register {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::BmsReset => "BMS_RESET",
            Register::SetSoc => "SET_SOC",
            Register::VoutIoutSoc => "VOUT_IOUT_SOC",
            Register::MinMaxCellVoltage => "MIN_MAX_CELL_VOLTAGE",
            Register::MinMaxTemperature => "MIN_MAX_TEMPERATURE",
            Register::DischargeChargeMosStatus => "DISCHARGE_CHARGE_MOS_STATUS",
            Register::StatusInfo => "STATUS_INFO",
            Register::CellVoltages => "CELL_VOLTAGES",
            Register::CellTemperature => "CELL_TEMPERATURE",
            Register::CellBalanceState => "CELL_BALANCE_STATE",
            Register::FailureCodes => "FAILURE_CODES",
            Register::DischargeFet => "DISCHRG_FET",
            Register::ChargeFet => "CHRG_FET",
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

/// 8-bit truncated sum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Builds the 13-byte request frame for `command`.
///
/// The command payload is copied into the data bytes, the rest stays zero.
pub fn encode(address: Address, command: &Command) -> Result<[u8; FRAME_LENGTH], Error> {
    if command.payload.len() > PAYLOAD_LENGTH {
        return Err(Error::PayloadTooLong {
            len: command.payload.len(),
            capacity: PAYLOAD_LENGTH,
        });
    }
    let mut tx_buffer = [0u8; FRAME_LENGTH];
    tx_buffer[0] = START_BYTE;
    tx_buffer[1] = address.0;
    tx_buffer[2] = command.register;
    tx_buffer[3] = DATA_LENGTH;
    tx_buffer[PAYLOAD_OFFSET..PAYLOAD_OFFSET + command.payload.len()]
        .copy_from_slice(&command.payload);
    tx_buffer[FRAME_LENGTH - 1] = checksum(&tx_buffer[..FRAME_LENGTH - 1]);
    Ok(tx_buffer)
}

/// Request frame for a plain read of `register`.
pub fn request(address: Address, register: Register) -> [u8; FRAME_LENGTH] {
    let mut tx_buffer = [0u8; FRAME_LENGTH];
    tx_buffer[0] = START_BYTE;
    tx_buffer[1] = address.0;
    tx_buffer[2] = register.code();
    tx_buffer[3] = DATA_LENGTH;
    tx_buffer[FRAME_LENGTH - 1] = checksum(&tx_buffer[..FRAME_LENGTH - 1]);
    tx_buffer
}

/// A checksum-validated reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub register: u8,
    pub payload: [u8; PAYLOAD_LENGTH],
}

/// Validates a reply frame.
///
/// The checksum is verified before anything else, so a corrupted byte anywhere in
/// the frame is reported as [`FrameError::ChecksumMismatch`].
pub fn decode(rx_buffer: &[u8]) -> Result<Frame, FrameError> {
    if rx_buffer.len() != FRAME_LENGTH {
        log::warn!(
            "Invalid buffer size - required={} received={}",
            FRAME_LENGTH,
            rx_buffer.len()
        );
        return Err(FrameError::WrongSize {
            expected: FRAME_LENGTH,
            received: rx_buffer.len(),
        });
    }
    let calculated = checksum(&rx_buffer[..FRAME_LENGTH - 1]);
    let received = rx_buffer[FRAME_LENGTH - 1];
    if calculated != received {
        log::warn!(
            "Invalid checksum - calculated={:02X?} received={:02X?} buffer={:02X?}",
            calculated,
            received,
            rx_buffer
        );
        return Err(FrameError::ChecksumMismatch {
            calculated,
            received,
        });
    }
    if rx_buffer[0] != START_BYTE {
        return Err(FrameError::BadStart(rx_buffer[0]));
    }
    let mut payload = [0u8; PAYLOAD_LENGTH];
    payload.copy_from_slice(&rx_buffer[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LENGTH]);
    Ok(Frame {
        address: rx_buffer[1],
        register: rx_buffer[2],
        payload,
    })
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PackMeasurements {
    pub total_voltage: f32,
    pub current: f32, // positive=charging
    pub soc_percent: f32,
}

impl PackMeasurements {
    pub const REGISTER: Register = Register::VoutIoutSoc;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        payload.require(PAYLOAD_LENGTH)?;
        Ok(Self {
            total_voltage: payload.u16(0)? as f32 / 10.0,
            current: payload.i16(4)? as f32 / 10.0,
            soc_percent: payload.u16(6)? as f32 / 10.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CellVoltageRange {
    pub highest_mv: u16,
    pub highest_cell: u8,
    pub lowest_mv: u16,
    pub lowest_cell: u8,
}

impl CellVoltageRange {
    pub const REGISTER: Register = Register::MinMaxCellVoltage;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        Ok(Self {
            highest_mv: payload.u16(0)?,
            highest_cell: payload.u8(2)?,
            lowest_mv: payload.u16(3)?,
            lowest_cell: payload.u8(5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TemperatureRange {
    pub highest_temperature: i8,
    pub highest_sensor: u8,
    pub lowest_temperature: i8,
    pub lowest_sensor: u8,
}

impl TemperatureRange {
    pub const REGISTER: Register = Register::MinMaxTemperature;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    /// Temperatures are plain signed bytes in °C, no offset is applied.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        Ok(Self {
            highest_temperature: payload.i8(0)?,
            highest_sensor: payload.u8(1)?,
            lowest_temperature: payload.i8(2)?,
            lowest_sensor: payload.u8(3)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IOState {
    pub di1: bool,
    pub di2: bool,
    pub di3: bool,
    pub di4: bool,
    pub do1: bool,
    pub do2: bool,
    pub do3: bool,
    pub do4: bool,
}

impl From<u8> for IOState {
    fn from(byte: u8) -> Self {
        Self {
            di1: read_bit!(byte, 0),
            di2: read_bit!(byte, 1),
            di3: read_bit!(byte, 2),
            di4: read_bit!(byte, 3),
            do1: read_bit!(byte, 4),
            do2: read_bit!(byte, 5),
            do3: read_bit!(byte, 6),
            do4: read_bit!(byte, 7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusInfo {
    pub cells: u8,
    pub temperature_sensors: u8,
    pub charger_running: bool,
    pub load_running: bool,
    pub states: IOState,
    pub cycles: u16,
}

impl StatusInfo {
    pub const REGISTER: Register = Register::StatusInfo;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        Ok(Self {
            cells: payload.u8(0)?,
            temperature_sensors: payload.u8(1)?,
            charger_running: payload.u8(2)? == 1,
            load_running: payload.u8(3)? == 1,
            states: IOState::from(payload.u8(4)?),
            cycles: payload.u16(6)?,
        })
    }
}

/// First reply frame of CELL_VOLTAGES.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellVoltageFrame {
    /// 1-based frame number reported by the BMS.
    pub frame: u8,
    pub millivolts: Vec<u16>,
}

impl CellVoltageFrame {
    pub const REGISTER: Register = Register::CellVoltages;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    /// Decodes the cells carried by a single reply frame, at most
    /// [`CELLS_PER_FRAME`] and never more than `n_cells`.
    // TODO: packs above three cells reply with ceil(n_cells / 3) frames; read and
    // stitch the continuation frames by their frame number.
    pub fn decode(data: &[u8], n_cells: u8) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        let frame = payload.u8(0)?;
        let count = usize::from(n_cells).min(CELLS_PER_FRAME);
        let mut millivolts = Vec::with_capacity(count);
        for i in 0..count {
            let mv = payload.u16(1 + 2 * i)?;
            log::trace!("Frame #{} cell #{} mV={}", frame, i + 1, mv);
            millivolts.push(mv);
        }
        Ok(Self { frame, millivolts })
    }
}

/// First reply frame of CELL_TEMPERATURE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTemperatureFrame {
    pub frame: u8,
    pub celsius: Vec<i8>,
}

impl CellTemperatureFrame {
    pub const REGISTER: Register = Register::CellTemperature;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    /// Same single-frame limitation as [`CellVoltageFrame::decode`], at most
    /// [`SENSORS_PER_FRAME`] sensors.
    pub fn decode(data: &[u8], n_sensors: u8) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        let frame = payload.u8(0)?;
        let count = usize::from(n_sensors).min(SENSORS_PER_FRAME);
        let mut celsius = Vec::with_capacity(count);
        for i in 0..count {
            let temperature = payload.i8(1 + i)?;
            log::trace!("Frame #{} sensor #{} °C={}", frame, i + 1, temperature);
            celsius.push(temperature);
        }
        Ok(Self { frame, celsius })
    }
}

pub struct CellBalanceState;

impl CellBalanceState {
    pub const REGISTER: Register = Register::CellBalanceState;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    /// Bit `i` of the 32-bit mask is the balancing state of cell `i + 1`.
    pub fn decode(data: &[u8], n_cells: u8) -> Result<Vec<bool>, DecodeError> {
        let mask = Self::REGISTER.payload(data).u32(0)?;
        let count = usize::from(n_cells).min(BALANCE_BITS);
        Ok((0..count).map(|cell| read_bit!(mask, cell)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Alarm {
    CellVoltHighLevel1,
    CellVoltHighLevel2,
    CellVoltLowLevel1,
    CellVoltLowLevel2,
    SumVoltHighLevel1,
    SumVoltHighLevel2,
    SumVoltLowLevel1,
    SumVoltLowLevel2,
    ChargeTempHighLevel1,
    ChargeTempHighLevel2,
    ChargeTempLowLevel1,
    ChargeTempLowLevel2,
    DischargeTempHighLevel1,
    DischargeTempHighLevel2,
    DischargeTempLowLevel1,
    DischargeTempLowLevel2,
    ChargeOvercurrentLevel1,
    ChargeOvercurrentLevel2,
    DischargeOvercurrentLevel1,
    DischargeOvercurrentLevel2,
    SocHighLevel1,
    SocHighLevel2,
    SocLowLevel1,
    SocLowLevel2,
    DiffVoltLevel1,
    DiffVoltLevel2,
    DiffTempLevel1,
    DiffTempLevel2,
    ChargeMosTempHighAlarm,
    DischargeMosTempHighAlarm,
    ChargeMosTempSensorErr,
    DischargeMosTempSensorErr,
    ChargeMosAdhesionErr,
    DischargeMosAdhesionErr,
    ChargeMosOpenCircuitErr,
    DischargeMosOpenCircuitErr,
    AfeCollectChipErr,
    VoltageCollectDropped,
    CellTempSensorErr,
    EepromErr,
    RtcErr,
    PrechargeFailure,
    CommunicationFailure,
    InternalCommunicationFailure,
    CurrentModuleFault,
    SumVoltageDetectFault,
    ShortCircuitProtectFault,
    LowVoltForbiddenChargeFault,
}

/// `(payload byte, bit, alarm)` for every documented failure bit.
const ALARM_BITS: [(usize, u8, Alarm); 48] = [
    (0, 0, Alarm::CellVoltHighLevel1),
    (0, 1, Alarm::CellVoltHighLevel2),
    (0, 2, Alarm::CellVoltLowLevel1),
    (0, 3, Alarm::CellVoltLowLevel2),
    (0, 4, Alarm::SumVoltHighLevel1),
    (0, 5, Alarm::SumVoltHighLevel2),
    (0, 6, Alarm::SumVoltLowLevel1),
    (0, 7, Alarm::SumVoltLowLevel2),
    (1, 0, Alarm::ChargeTempHighLevel1),
    (1, 1, Alarm::ChargeTempHighLevel2),
    (1, 2, Alarm::ChargeTempLowLevel1),
    (1, 3, Alarm::ChargeTempLowLevel2),
    (1, 4, Alarm::DischargeTempHighLevel1),
    (1, 5, Alarm::DischargeTempHighLevel2),
    (1, 6, Alarm::DischargeTempLowLevel1),
    (1, 7, Alarm::DischargeTempLowLevel2),
    (2, 0, Alarm::ChargeOvercurrentLevel1),
    (2, 1, Alarm::ChargeOvercurrentLevel2),
    (2, 2, Alarm::DischargeOvercurrentLevel1),
    (2, 3, Alarm::DischargeOvercurrentLevel2),
    (2, 4, Alarm::SocHighLevel1),
    (2, 5, Alarm::SocHighLevel2),
    (2, 6, Alarm::SocLowLevel1),
    (2, 7, Alarm::SocLowLevel2),
    (3, 0, Alarm::DiffVoltLevel1),
    (3, 1, Alarm::DiffVoltLevel2),
    (3, 2, Alarm::DiffTempLevel1),
    (3, 3, Alarm::DiffTempLevel2),
    (4, 0, Alarm::ChargeMosTempHighAlarm),
    (4, 1, Alarm::DischargeMosTempHighAlarm),
    (4, 2, Alarm::ChargeMosTempSensorErr),
    (4, 3, Alarm::DischargeMosTempSensorErr),
    (4, 4, Alarm::ChargeMosAdhesionErr),
    (4, 5, Alarm::DischargeMosAdhesionErr),
    (4, 6, Alarm::ChargeMosOpenCircuitErr),
    (4, 7, Alarm::DischargeMosOpenCircuitErr),
    (5, 0, Alarm::AfeCollectChipErr),
    (5, 1, Alarm::VoltageCollectDropped),
    (5, 2, Alarm::CellTempSensorErr),
    (5, 3, Alarm::EepromErr),
    (5, 4, Alarm::RtcErr),
    (5, 5, Alarm::PrechargeFailure),
    (5, 6, Alarm::CommunicationFailure),
    (5, 7, Alarm::InternalCommunicationFailure),
    (6, 0, Alarm::CurrentModuleFault),
    (6, 1, Alarm::SumVoltageDetectFault),
    (6, 2, Alarm::ShortCircuitProtectFault),
    (6, 3, Alarm::LowVoltForbiddenChargeFault),
];

impl Alarm {
    pub const REGISTER: Register = Register::FailureCodes;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    /// Decodes the seven alarm bytes into the list of raised alarms.
    pub fn decode(data: &[u8]) -> Result<Vec<Self>, DecodeError> {
        let alarm_bytes = Self::REGISTER.payload(data).bytes(0, 7)?;
        Ok(ALARM_BITS
            .iter()
            .filter(|(byte, bit, _)| read_bit!(alarm_bytes[*byte], *bit))
            .map(|(_, _, alarm)| *alarm)
            .collect())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Alarm::CellVoltHighLevel1 => "Cell voltage is too high level one alarm",
            Alarm::CellVoltHighLevel2 => "Cell voltage is too high level two alarm",
            Alarm::CellVoltLowLevel1 => "Cell voltage is too low level one alarm",
            Alarm::CellVoltLowLevel2 => "Cell voltage is too low level two alarm",
            Alarm::SumVoltHighLevel1 => "Total voltage is too high level one alarm",
            Alarm::SumVoltHighLevel2 => "Total voltage is too high level two alarm",
            Alarm::SumVoltLowLevel1 => "Total voltage is too low level one alarm",
            Alarm::SumVoltLowLevel2 => "Total voltage is too low level two alarm",
            Alarm::ChargeTempHighLevel1 => "Charging temperature too high level one alarm",
            Alarm::ChargeTempHighLevel2 => "Charging temperature too high level two alarm",
            Alarm::ChargeTempLowLevel1 => "Charging temperature too low level one alarm",
            Alarm::ChargeTempLowLevel2 => "Charging temperature too low level two alarm",
            Alarm::DischargeTempHighLevel1 => "Discharging temperature too high level one alarm",
            Alarm::DischargeTempHighLevel2 => "Discharging temperature too high level two alarm",
            Alarm::DischargeTempLowLevel1 => "Discharging temperature too low level one alarm",
            Alarm::DischargeTempLowLevel2 => "Discharging temperature too low level two alarm",
            Alarm::ChargeOvercurrentLevel1 => "Charge over current level one alarm",
            Alarm::ChargeOvercurrentLevel2 => "Charge over current level two alarm",
            Alarm::DischargeOvercurrentLevel1 => "Discharge over current level one alarm",
            Alarm::DischargeOvercurrentLevel2 => "Discharge over current level two alarm",
            Alarm::SocHighLevel1 => "SOC is too high level one alarm",
            Alarm::SocHighLevel2 => "SOC is too high level two alarm",
            Alarm::SocLowLevel1 => "SOC is too low level one alarm",
            Alarm::SocLowLevel2 => "SOC is too low level two alarm",
            Alarm::DiffVoltLevel1 => "Excessive cell voltage difference level one alarm",
            Alarm::DiffVoltLevel2 => "Excessive cell voltage difference level two alarm",
            Alarm::DiffTempLevel1 => "Excessive temperature difference level one alarm",
            Alarm::DiffTempLevel2 => "Excessive temperature difference level two alarm",
            Alarm::ChargeMosTempHighAlarm => "Charging MOS overtemperature alarm",
            Alarm::DischargeMosTempHighAlarm => "Discharging MOS overtemperature alarm",
            Alarm::ChargeMosTempSensorErr => "Charging MOS temperature sensor failure",
            Alarm::DischargeMosTempSensorErr => "Discharging MOS temperature sensor failure",
            Alarm::ChargeMosAdhesionErr => "Charging MOS adhesion failure",
            Alarm::DischargeMosAdhesionErr => "Discharging MOS adhesion failure",
            Alarm::ChargeMosOpenCircuitErr => "Charging MOS breaker failure",
            Alarm::DischargeMosOpenCircuitErr => "Discharging MOS breaker failure",
            Alarm::AfeCollectChipErr => "AFE acquisition chip malfunction",
            Alarm::VoltageCollectDropped => "Cell voltage collection dropped",
            Alarm::CellTempSensorErr => "Cell temperature sensor failure",
            Alarm::EepromErr => "EEPROM storage failure",
            Alarm::RtcErr => "RTC clock malfunction",
            Alarm::PrechargeFailure => "Precharge failure",
            Alarm::CommunicationFailure => "Vehicle communication malfunction",
            Alarm::InternalCommunicationFailure => "Internal communication module malfunction",
            Alarm::CurrentModuleFault => "Current module failure",
            Alarm::SumVoltageDetectFault => "Total voltage detection failure",
            Alarm::ShortCircuitProtectFault => "Short circuit protection failure",
            Alarm::LowVoltForbiddenChargeFault => "Low voltage, charging forbidden",
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MosStatus {
    pub charging_mosfet: bool,
    pub discharging_mosfet: bool,
    pub heartbeat: u8,
    pub residual_capacity_mah: u16,
}

impl MosStatus {
    pub const REGISTER: Register = Register::DischargeChargeMosStatus;

    pub fn request(address: Address) -> [u8; FRAME_LENGTH] {
        request(address, Self::REGISTER)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let payload = Self::REGISTER.payload(data);
        Ok(Self {
            charging_mosfet: payload.u8(0)? == 1,
            discharging_mosfet: payload.u8(1)? == 1,
            heartbeat: payload.u8(2)?,
            residual_capacity_mah: payload.u16(4)?,
        })
    }
}

pub struct SetDischargeMosfet;

impl SetDischargeMosfet {
    pub fn command(enable: bool) -> Command {
        Command::write(Register::DischargeFet.code(), [u8::from(enable)])
    }
}

pub struct SetChargeMosfet;

impl SetChargeMosfet {
    pub fn command(enable: bool) -> Command {
        Command::write(Register::ChargeFet.code(), [u8::from(enable)])
    }
}

pub struct SetSoc;

impl SetSoc {
    /// SOC is written in 0.1 % steps into data bytes 6-7, clamped to 0..=100 %.
    pub fn command(soc_percent: f32) -> Result<Command, Error> {
        if !soc_percent.is_finite() {
            return Err(Error::RangeError);
        }
        let value = (soc_percent * 10.0).round().clamp(0.0, 1000.0) as u16;
        let mut payload = [0u8; PAYLOAD_LENGTH];
        payload[6..8].copy_from_slice(&value.to_be_bytes());
        Ok(Command::write(Register::SetSoc.code(), payload))
    }
}

pub struct BmsReset;

impl BmsReset {
    pub fn command() -> Command {
        Command::write(Register::BmsReset.code(), Vec::new())
    }
}
