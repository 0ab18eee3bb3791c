use anyhow::Result;
use bmsmon_lib::energy::format_elapsed;
use bmsmon_lib::TelemetrySnapshot;
use std::fmt::Write;
use std::time::Duration;

/// Widest CSV layout, cells and temperature sensors.
pub const CSV_MAX_CELLS: usize = 16;
pub const CSV_MAX_TEMPS: usize = 8;

/// A snapshot together with the session context the daemon adds to it.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub snapshot: &'a TelemetrySnapshot,
    pub elapsed: Duration,
    pub energy_wh: f64,
}

pub fn human_line(snapshot: &TelemetrySnapshot) -> String {
    format!(
        "V: {:.2}V, I: {:.2}A, SOC: {:.1}%, P: {:.2}W",
        snapshot.pack_voltage, snapshot.pack_current, snapshot.soc_percent, snapshot.power
    )
}

pub fn human_sample(sample: &Sample) -> String {
    format!(
        "[{}] {}, E: {:.3}Wh, Peak I: {:.2}A, Peak P: {:.2}W",
        format_elapsed(sample.elapsed),
        human_line(sample.snapshot),
        sample.energy_wh,
        sample.snapshot.peak_current,
        sample.snapshot.peak_power
    )
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Multi-line report of everything a snapshot carries.
pub fn human_report(snapshot: &TelemetrySnapshot) -> String {
    let mut report = String::new();
    let stats = &snapshot.cell_stats;
    let _ = writeln!(report, "Vendor: {}", snapshot.vendor);
    let _ = writeln!(report, "{}", human_line(snapshot));
    if let Some(full) = snapshot.full_capacity_ah {
        let _ = writeln!(report, "Full capacity: {full:.2}Ah");
    }
    if let Some(residual) = snapshot.residual_capacity_ah {
        let _ = writeln!(report, "Residual capacity: {residual:.2}Ah");
    }
    if let Some(cycles) = snapshot.cycle_count {
        let _ = writeln!(report, "Cycles: {cycles}");
    }
    let _ = writeln!(
        report,
        "Cells: {} min {:.3}V (#{}) max {:.3}V (#{}) delta {:.3}V",
        snapshot.cell_count,
        stats.min_voltage,
        stats.min_cell,
        stats.max_voltage,
        stats.max_cell,
        stats.delta
    );
    for (i, volts) in snapshot.cell_voltages.iter().enumerate() {
        let balancing = snapshot.cell_balancing.get(i).copied().unwrap_or(false);
        let _ = writeln!(
            report,
            "  Cell {:2}: {:.3}V{}",
            i + 1,
            volts,
            if balancing { " (balancing)" } else { "" }
        );
    }
    let _ = writeln!(
        report,
        "Temperatures: {} min {:.1}°C max {:.1}°C {:?}",
        snapshot.temp_sensor_count,
        snapshot.min_temperature,
        snapshot.max_temperature,
        snapshot.temperatures
    );
    let _ = writeln!(
        report,
        "Charge FET: {}, Discharge FET: {}",
        on_off(snapshot.charge_fet_enabled),
        on_off(snapshot.discharge_fet_enabled)
    );
    let flags = snapshot.flags.descriptions();
    if flags.is_empty() {
        let _ = write!(report, "Alarms: none");
    } else {
        let _ = write!(report, "Alarms: {}", flags.join(", "));
    }
    report
}

/// CSV layout, fixed once by the first snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLayout {
    cells: usize,
    temps: usize,
}

impl CsvLayout {
    pub fn for_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        Self {
            cells: snapshot.cell_voltages.len().min(CSV_MAX_CELLS),
            temps: snapshot.temperatures.len().min(CSV_MAX_TEMPS),
        }
    }

    pub fn header(&self) -> String {
        let mut header = String::from(
            "elapsed_s,elapsed,energy_wh,voltage_v,current_a,soc_pct,power_w,full_capacity_ah,\
             peak_current_a,peak_power_w,cell_count,min_cell_v,min_cell,max_cell_v,max_cell,\
             cell_delta_v,temp_count,min_temp_c,max_temp_c,charge_fet,discharge_fet",
        );
        for i in 1..=self.cells {
            let _ = write!(header, ",cell{i}_v");
        }
        for i in 1..=self.temps {
            let _ = write!(header, ",temp{i}_c");
        }
        header
    }

    /// Columns beyond what the snapshot reports are left empty.
    pub fn row(&self, sample: &Sample) -> String {
        let s = sample.snapshot;
        let stats = &s.cell_stats;
        let mut row = format!(
            "{},{},{:.3},{:.2},{:.2},{:.1},{:.2},{:.2},{:.2},{:.2},{},{:.3},{},{:.3},{},{:.3},{},{:.1},{:.1},{},{}",
            sample.elapsed.as_secs(),
            format_elapsed(sample.elapsed),
            sample.energy_wh,
            s.pack_voltage,
            s.pack_current,
            s.soc_percent,
            s.power,
            s.full_capacity_ah.unwrap_or(0.0),
            s.peak_current,
            s.peak_power,
            s.cell_count,
            stats.min_voltage,
            stats.min_cell,
            stats.max_voltage,
            stats.max_cell,
            stats.delta,
            s.temp_sensor_count,
            s.min_temperature,
            s.max_temperature,
            u8::from(s.charge_fet_enabled),
            u8::from(s.discharge_fet_enabled),
        );
        for i in 0..self.cells {
            match s.cell_voltages.get(i) {
                Some(volts) => {
                    let _ = write!(row, ",{volts:.3}");
                }
                None => row.push(','),
            }
        }
        for i in 0..self.temps {
            match s.temperatures.get(i) {
                Some(celsius) => {
                    let _ = write!(row, ",{celsius:.1}");
                }
                None => row.push(','),
            }
        }
        row
    }
}

pub fn json_value(sample: &Sample) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(sample.snapshot)?;
    if let serde_json::Value::Object(map) = &mut value {
        map.insert(
            "elapsed_s".to_string(),
            serde_json::json!(sample.elapsed.as_secs()),
        );
        map.insert(
            "energy_wh".to_string(),
            serde_json::json!(sample.energy_wh),
        );
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmsmon_lib::protocol::jbd::Protection;
    use bmsmon_lib::snapshot::{BoundedVec, CellStats, VendorFlags};
    use bmsmon_lib::Vendor;

    fn snapshot(cells: &[f32], temps: &[f32]) -> TelemetrySnapshot {
        TelemetrySnapshot {
            vendor: Vendor::Jbd,
            pack_voltage: 52.1,
            pack_current: -3.2,
            soc_percent: 87.0,
            power: 52.1 * -3.2,
            full_capacity_ah: Some(100.0),
            residual_capacity_ah: Some(87.0),
            cycle_count: Some(12),
            cell_count: cells.len() as u8,
            cell_voltages: BoundedVec::from_slice_clipped(cells),
            cell_balancing: BoundedVec::new(),
            cell_stats: CellStats::new(3.25, 1, 3.26, 2),
            temp_sensor_count: temps.len() as u8,
            temperatures: BoundedVec::from_slice_clipped(temps),
            min_temperature: 20.0,
            max_temperature: 21.5,
            charge_fet_enabled: true,
            discharge_fet_enabled: false,
            peak_current: 4.0,
            peak_power: 210.0,
            flags: VendorFlags::Jbd {
                protection: Protection::default(),
            },
        }
    }

    #[test]
    fn human_line_format() {
        assert_eq!(
            human_line(&snapshot(&[], &[])),
            "V: 52.10V, I: -3.20A, SOC: 87.0%, P: -166.72W"
        );
    }

    #[test]
    fn report_lists_cells() {
        let report = human_report(&snapshot(&[3.25, 3.26], &[20.0]));
        assert!(report.contains("Cell  2: 3.260V"));
        assert!(report.contains("Charge FET: on, Discharge FET: off"));
        assert!(report.ends_with("Alarms: none"));
    }

    #[test]
    fn csv_header_is_capped() {
        let cells = [3.3f32; 20];
        let temps = [25.0f32; 10];
        let layout = CsvLayout::for_snapshot(&snapshot(&cells, &temps));
        let header = layout.header();
        assert!(header.ends_with(
            ",cell16_v,temp1_c,temp2_c,temp3_c,temp4_c,temp5_c,temp6_c,temp7_c,temp8_c"
        ));
        assert!(!header.contains("cell17_v"));
    }

    #[test]
    fn csv_row_matches_header() {
        let first = snapshot(&[3.25, 3.26, 3.27], &[20.0, 21.5]);
        let layout = CsvLayout::for_snapshot(&first);
        let columns = layout.header().split(',').count();

        let sample = Sample {
            snapshot: &first,
            elapsed: Duration::from_secs(3_725),
            energy_wh: -1.5,
        };
        let row = layout.row(&sample);
        assert_eq!(row.split(',').count(), columns);
        assert!(row.starts_with("3725,01:02:05,-1.500,52.10,-3.20,87.0,-166.72,100.00,"));
        assert!(row.ends_with(",1,0,3.250,3.260,3.270,20.0,21.5"));

        let fewer = snapshot(&[3.25], &[]);
        let row = layout.row(&Sample {
            snapshot: &fewer,
            ..sample
        });
        assert_eq!(row.split(',').count(), columns);
        assert!(row.ends_with(",3.250,,,,"));
    }

    #[test]
    fn json_carries_session_fields() {
        let first = snapshot(&[3.25], &[20.0]);
        let value = json_value(&Sample {
            snapshot: &first,
            elapsed: Duration::from_secs(10),
            energy_wh: 0.25,
        })
        .unwrap();
        assert_eq!(value["vendor"], "jbd");
        assert_eq!(value["elapsed_s"], 10);
        assert_eq!(value["energy_wh"], 0.25);
        assert_eq!(value["cycle_count"], 12);
        assert_eq!(value["cell_voltages"].as_array().map(Vec::len), Some(1));
    }
}
