use super::{with_retry, DriverConfig, ProtocolDriver};
use crate::error::{Cause, DecodeError, Error, FrameError, PollError, Step};
use crate::protocol::daly::{self, *};
use crate::protocol::Command;
use crate::session::Vendor;
use crate::snapshot::{
    BoundedVec, CellStats, TelemetrySnapshot, VendorFlags, MAX_CELLS, MAX_TEMP_SENSORS,
};
use crate::transport::{receive_exact, Transport};

/// Polls a Daly BMS register by register.
///
/// STATUS_INFO is the source of the cell and sensor counts that the per-cell
/// registers need, so the last good status is kept between polls.
#[derive(Debug)]
pub struct DalyDriver<T> {
    transport: T,
    config: DriverConfig,
    status: Option<StatusInfo>,
}

impl<T: Transport> DalyDriver<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self {
            transport,
            config,
            status: None,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn exchange(&mut self, register: Register) -> Result<[u8; PAYLOAD_LENGTH], Cause> {
        let tx_buffer = daly::request(self.config.address, register);
        log::trace!("send_bytes {}: {:02X?}", register, tx_buffer);
        self.transport.send(&tx_buffer)?;
        let rx_buffer = receive_exact(&mut self.transport, FRAME_LENGTH, self.config.timeout)?;
        let frame = daly::decode(&rx_buffer)?;
        if frame.register != register.code() {
            log::warn!(
                "Reply to {} carries register {:#04X}",
                register,
                frame.register
            );
            return Err(FrameError::UnexpectedRegister {
                expected: register.code(),
                received: frame.register,
            }
            .into());
        }
        Ok(frame.payload)
    }

    fn step<R>(
        &mut self,
        register: Register,
        decode: impl Fn(&[u8]) -> Result<R, DecodeError>,
    ) -> Result<R, PollError> {
        let retry = self.config.retry;
        with_retry(Step::Daly(register), retry, || {
            let payload = self.exchange(register)?;
            Ok(decode(&payload)?)
        })
    }

    fn write(&mut self, command: &Command, settle: std::time::Duration) -> Result<(), Error> {
        let tx_buffer = daly::encode(self.config.address, command)?;
        log::trace!("send_bytes: {:02X?}", tx_buffer);
        self.transport.send(&tx_buffer)?;
        std::thread::sleep(settle);
        Ok(())
    }

    fn counts(&self) -> (u8, u8) {
        self.status
            .as_ref()
            .map(|status| (status.cells, status.temperature_sensors))
            .unwrap_or_default()
    }
}

impl<T: Transport> ProtocolDriver for DalyDriver<T> {
    fn vendor(&self) -> Vendor {
        Vendor::Daly
    }

    /// Every register is requested even after a failure so the line stays in
    /// step with the BMS; the first failure is reported.
    fn read(&mut self) -> Result<TelemetrySnapshot, PollError> {
        let pack = self.step(PackMeasurements::REGISTER, PackMeasurements::decode);
        let cell_range = self.step(CellVoltageRange::REGISTER, CellVoltageRange::decode);
        let temperature_range = self.step(TemperatureRange::REGISTER, TemperatureRange::decode);
        let status = self.step(StatusInfo::REGISTER, StatusInfo::decode);
        if let Ok(status) = &status {
            self.status = Some(status.clone());
        }
        let (n_cells, n_sensors) = self.counts();
        let cells = self.step(CellVoltageFrame::REGISTER, |data| {
            CellVoltageFrame::decode(data, n_cells)
        });
        let temperatures = self.step(CellTemperatureFrame::REGISTER, |data| {
            CellTemperatureFrame::decode(data, n_sensors)
        });
        let balancing = self.step(CellBalanceState::REGISTER, |data| {
            CellBalanceState::decode(data, n_cells)
        });
        let alarms = self.step(Alarm::REGISTER, Alarm::decode);
        let mos = self.step(MosStatus::REGISTER, MosStatus::decode);

        let pack = pack?;
        let cell_range = cell_range?;
        let temperature_range = temperature_range?;
        let status = status?;
        let cells = cells?;
        let temperatures = temperatures?;
        let balancing = balancing?;
        let alarms = alarms?;
        let mos = mos?;

        let voltages: Vec<f32> = cells
            .millivolts
            .iter()
            .map(|mv| f32::from(*mv) / 1000.0)
            .collect();
        let celsius: Vec<f32> = temperatures.celsius.iter().map(|t| f32::from(*t)).collect();

        Ok(TelemetrySnapshot {
            vendor: Vendor::Daly,
            pack_voltage: pack.total_voltage,
            pack_current: pack.current,
            soc_percent: pack.soc_percent,
            power: pack.total_voltage * pack.current,
            full_capacity_ah: None,
            residual_capacity_ah: Some(f32::from(mos.residual_capacity_mah) / 1000.0),
            cycle_count: Some(status.cycles),
            cell_count: clip(status.cells, MAX_CELLS),
            cell_voltages: BoundedVec::from_slice_clipped(&voltages),
            cell_balancing: BoundedVec::from_slice_clipped(&balancing),
            cell_stats: CellStats::new(
                f32::from(cell_range.lowest_mv) / 1000.0,
                cell_range.lowest_cell,
                f32::from(cell_range.highest_mv) / 1000.0,
                cell_range.highest_cell,
            ),
            temp_sensor_count: clip(status.temperature_sensors, MAX_TEMP_SENSORS),
            temperatures: BoundedVec::from_slice_clipped(&celsius),
            min_temperature: f32::from(temperature_range.lowest_temperature),
            max_temperature: f32::from(temperature_range.highest_temperature),
            charge_fet_enabled: mos.charging_mosfet,
            discharge_fet_enabled: mos.discharging_mosfet,
            peak_current: 0.0,
            peak_power: 0.0,
            flags: VendorFlags::Daly { alarms },
        })
    }

    fn set_charge_mosfet(&mut self, enable: bool) -> Result<(), Error> {
        log::info!("Setting charge MOSFET {}", if enable { "on" } else { "off" });
        self.write(&SetChargeMosfet::command(enable), self.config.settle)
    }

    fn set_discharge_mosfet(&mut self, enable: bool) -> Result<(), Error> {
        log::info!(
            "Setting discharge MOSFET {}",
            if enable { "on" } else { "off" }
        );
        self.write(&SetDischargeMosfet::command(enable), self.config.settle)
    }

    fn set_soc(&mut self, soc_percent: f32) -> Result<(), Error> {
        log::info!("Setting SOC to {soc_percent}%");
        self.write(&SetSoc::command(soc_percent)?, self.config.settle)
    }

    fn reset(&mut self) -> Result<(), Error> {
        log::info!("Resetting BMS");
        self.write(&BmsReset::command(), self.config.reset_settle)?;
        self.status = None;
        Ok(())
    }
}

fn clip(reported: u8, capacity: usize) -> u8 {
    if usize::from(reported) > capacity {
        log::warn!("BMS reports {reported}, clipping to {capacity}");
        capacity as u8
    } else {
        reported
    }
}
