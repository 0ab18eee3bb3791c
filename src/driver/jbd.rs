use super::{with_retry, DriverConfig, ProtocolDriver};
use crate::error::{Cause, DecodeError, Error, FrameError, PollError, Step};
use crate::protocol::jbd::{self, CellInfo, HwInfo, HwVersion, Register, SetMosfets};
use crate::session::Vendor;
use crate::snapshot::{self, BoundedVec, CellStats, TelemetrySnapshot, VendorFlags};
use crate::transport::{receive_exact, Transport};

/// Polls a JBD BMS with one HWINFO and one CELLINFO exchange.
#[derive(Debug)]
pub struct JbdDriver<T> {
    transport: T,
    config: DriverConfig,
    /// Last reported `(charge, discharge)` FET state, the MOS register always
    /// writes both.
    fets: Option<(bool, bool)>,
}

impl<T: Transport> JbdDriver<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self {
            transport,
            config,
            fets: None,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// One request/reply round trip. The reply length is taken from its header.
    fn exchange(&mut self, register: Register) -> Result<Vec<u8>, Cause> {
        let tx_buffer = jbd::request(register);
        log::trace!("send_bytes {}: {:02X?}", register, tx_buffer);
        self.transport.send(&tx_buffer)?;

        let mut rx_buffer =
            receive_exact(&mut self.transport, jbd::HEADER_LENGTH, self.config.timeout)?;
        let remaining = jbd::remaining_length(&rx_buffer)
            .ok_or(FrameError::BadStart(rx_buffer[0]))?;
        rx_buffer.extend(receive_exact(
            &mut self.transport,
            remaining,
            self.config.timeout,
        )?);

        let reply = jbd::decode(&rx_buffer)?.expect(register)?;
        Ok(reply.payload)
    }

    fn step<R>(
        &mut self,
        register: Register,
        decode: impl Fn(&[u8]) -> Result<R, DecodeError>,
    ) -> Result<R, PollError> {
        let retry = self.config.retry;
        with_retry(Step::Jbd(register), retry, || {
            let payload = self.exchange(register)?;
            Ok(decode(&payload)?)
        })
    }

    fn set_mosfets(&mut self, charge: Option<bool>, discharge: Option<bool>) -> Result<(), Error> {
        let (last_charge, last_discharge) = self.fets.unwrap_or_else(|| {
            log::debug!("FET state unknown, assuming both enabled");
            (true, true)
        });
        let charge = charge.unwrap_or(last_charge);
        let discharge = discharge.unwrap_or(last_discharge);
        log::info!("Setting MOSFETs charge={charge} discharge={discharge}");

        let tx_buffer = jbd::encode(&SetMosfets::command(charge, discharge))?;
        log::trace!("send_bytes: {:02X?}", tx_buffer);
        self.transport.send(&tx_buffer)?;
        std::thread::sleep(self.config.settle);
        self.fets = Some((charge, discharge));
        Ok(())
    }
}

impl<T: Transport> ProtocolDriver for JbdDriver<T> {
    fn vendor(&self) -> Vendor {
        Vendor::Jbd
    }

    fn read(&mut self) -> Result<TelemetrySnapshot, PollError> {
        let info = self.step(Register::HwInfo, HwInfo::decode)?;
        let n_cells = info.cells;
        let cells = self.step(Register::CellInfo, |data| CellInfo::decode(data, n_cells))?;
        self.fets = Some((info.charging_mosfet, info.discharging_mosfet));

        let (min_temperature, max_temperature) = snapshot::extremes(&info.temperatures);
        Ok(TelemetrySnapshot {
            vendor: Vendor::Jbd,
            pack_voltage: info.total_voltage,
            pack_current: info.current,
            soc_percent: f32::from(info.soc_percent),
            power: info.total_voltage * info.current,
            full_capacity_ah: Some(info.full_capacity_ah),
            residual_capacity_ah: Some(info.residual_capacity_ah),
            cycle_count: Some(info.cycles),
            cell_count: cells.voltages.len() as u8,
            cell_voltages: BoundedVec::from_slice_clipped(&cells.voltages),
            cell_balancing: BoundedVec::from_slice_clipped(&info.balancing()),
            cell_stats: CellStats::new(
                cells.min_voltage,
                cells.min_cell,
                cells.max_voltage,
                cells.max_cell,
            ),
            temp_sensor_count: info.temperatures.len() as u8,
            temperatures: BoundedVec::from_slice_clipped(&info.temperatures),
            min_temperature,
            max_temperature,
            charge_fet_enabled: info.charging_mosfet,
            discharge_fet_enabled: info.discharging_mosfet,
            peak_current: 0.0,
            peak_power: 0.0,
            flags: VendorFlags::Jbd {
                protection: info.protection,
            },
        })
    }

    fn set_charge_mosfet(&mut self, enable: bool) -> Result<(), Error> {
        self.set_mosfets(Some(enable), None)
    }

    fn set_discharge_mosfet(&mut self, enable: bool) -> Result<(), Error> {
        self.set_mosfets(None, Some(enable))
    }

    fn hardware_version(&mut self) -> Result<String, Error> {
        let retry = self.config.retry;
        let payload = with_retry(Step::Jbd(HwVersion::REGISTER), retry, || {
            self.exchange(HwVersion::REGISTER)
        })?;
        Ok(HwVersion::decode(&payload))
    }
}
