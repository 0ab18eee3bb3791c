//! The vendor independent telemetry model.

use crate::peak::Peaks;
use crate::protocol::{daly::Alarm, jbd::Protection};
use crate::session::Vendor;
use std::fmt;
use std::ops::Deref;

#[cfg(feature = "serde")]
use serde::Serialize;

pub const MAX_CELLS: usize = 48;
pub const MAX_TEMP_SENSORS: usize = 16;

/// Fixed-capacity sequence backed by an inline array and an explicit length.
///
/// Nothing is ever written past the capacity: [`BoundedVec::push`] hands the
/// item back when full and [`BoundedVec::from_slice_clipped`] drops the excess.
#[derive(Clone, Copy)]
pub struct BoundedVec<T, const N: usize> {
    items: [T; N],
    len: usize,
}

impl<T: Copy + Default, const N: usize> BoundedVec<T, N> {
    pub fn new() -> Self {
        Self {
            items: [T::default(); N],
            len: 0,
        }
    }

    pub fn from_slice_clipped(items: &[T]) -> Self {
        if items.len() > N {
            log::warn!(
                "Clipping {} values to a capacity of {}",
                items.len(),
                N
            );
        }
        let mut result = Self::new();
        for item in items.iter().take(N) {
            result.items[result.len] = *item;
            result.len += 1;
        }
        result
    }

    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.len == N {
            return Err(item);
        }
        self.items[self.len] = item;
        self.len += 1;
        Ok(())
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }
}

impl<T: Copy + Default, const N: usize> Default for BoundedVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Deref for BoundedVec<T, N> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items[..self.len]
    }
}

impl<T: PartialEq, const N: usize> PartialEq for BoundedVec<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.deref() == other.deref()
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for BoundedVec<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<T: Serialize, const N: usize> Serialize for BoundedVec<T, N> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Lowest and highest cell voltage with their 1-based cell numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CellStats {
    pub min_voltage: f32,
    pub min_cell: u8,
    pub max_voltage: f32,
    pub max_cell: u8,
    /// Always exactly `max_voltage - min_voltage`.
    pub delta: f32,
}

impl CellStats {
    /// Orders the two extremes if the BMS reported them the wrong way round.
    pub fn new(a_voltage: f32, a_cell: u8, b_voltage: f32, b_cell: u8) -> Self {
        let ((min_voltage, min_cell), (max_voltage, max_cell)) = if a_voltage <= b_voltage {
            ((a_voltage, a_cell), (b_voltage, b_cell))
        } else {
            ((b_voltage, b_cell), (a_voltage, a_cell))
        };
        Self {
            min_voltage,
            min_cell,
            max_voltage,
            max_cell,
            delta: max_voltage - min_voltage,
        }
    }
}

/// Protection or alarm state as the vendor reports it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum VendorFlags {
    Daly { alarms: Vec<Alarm> },
    Jbd { protection: Protection },
}

impl VendorFlags {
    pub fn any(&self) -> bool {
        match self {
            VendorFlags::Daly { alarms } => !alarms.is_empty(),
            VendorFlags::Jbd { protection } => protection.any(),
        }
    }

    pub fn descriptions(&self) -> Vec<&'static str> {
        match self {
            VendorFlags::Daly { alarms } => alarms.iter().map(Alarm::description).collect(),
            VendorFlags::Jbd { protection } => protection.active().collect(),
        }
    }
}

/// One fully populated reading of the pack.
///
/// Current is positive while charging; power is `pack_voltage * pack_current`.
/// The peaks never decrease over the lifetime of the session that produced the
/// snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TelemetrySnapshot {
    pub vendor: Vendor,
    pub pack_voltage: f32,
    pub pack_current: f32,
    pub soc_percent: f32,
    pub power: f32,
    pub full_capacity_ah: Option<f32>,
    pub residual_capacity_ah: Option<f32>,
    pub cycle_count: Option<u16>,
    pub cell_count: u8,
    pub cell_voltages: BoundedVec<f32, MAX_CELLS>,
    pub cell_balancing: BoundedVec<bool, MAX_CELLS>,
    pub cell_stats: CellStats,
    pub temp_sensor_count: u8,
    pub temperatures: BoundedVec<f32, MAX_TEMP_SENSORS>,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub charge_fet_enabled: bool,
    pub discharge_fet_enabled: bool,
    pub peak_current: f32,
    pub peak_power: f32,
    pub flags: VendorFlags,
}

impl TelemetrySnapshot {
    pub(crate) fn with_peaks(mut self, peaks: Peaks) -> Self {
        self.peak_current = peaks.current;
        self.peak_power = peaks.power;
        self
    }
}

/// Lowest and highest value of `values`, `(0.0, 0.0)` when empty.
pub(crate) fn extremes(values: &[f32]) -> (f32, f32) {
    let mut iter = values.iter().copied();
    match iter.next() {
        Some(first) => iter.fold((first, first), |(min, max), v| (min.min(v), max.max(v))),
        None => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_vec_rejects_overflow() {
        let mut cells: BoundedVec<u16, 3> = BoundedVec::new();
        assert!(cells.is_empty());
        assert_eq!(cells.push(1), Ok(()));
        assert_eq!(cells.push(2), Ok(()));
        assert_eq!(cells.push(3), Ok(()));
        assert_eq!(cells.push(4), Err(4));
        assert_eq!(cells.as_slice(), &[1, 2, 3]);
        assert_eq!(cells.capacity(), 3);
    }

    #[test]
    fn bounded_vec_clips() {
        let values: Vec<f32> = (0..60).map(|v| v as f32).collect();
        let cells: BoundedVec<f32, MAX_CELLS> = BoundedVec::from_slice_clipped(&values);
        assert_eq!(cells.len(), MAX_CELLS);
        assert_eq!(cells[MAX_CELLS - 1], 47.0);

        let few = BoundedVec::<f32, MAX_CELLS>::from_slice_clipped(&values[..4]);
        assert_eq!(few.len(), 4);
        assert_eq!(format!("{few:?}"), "[0.0, 1.0, 2.0, 3.0]");
    }

    #[test]
    fn bounded_vec_equality_ignores_spare_capacity() {
        let a = BoundedVec::<u8, 4>::from_slice_clipped(&[1, 2]);
        let mut b = BoundedVec::<u8, 4>::new();
        b.push(1).unwrap();
        b.push(2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cell_stats_are_ordered() {
        let stats = CellStats::new(3.30, 2, 3.35, 7);
        assert_eq!(stats.min_cell, 2);
        assert_eq!(stats.max_cell, 7);
        assert_eq!(stats.delta, stats.max_voltage - stats.min_voltage);

        let swapped = CellStats::new(3.35, 7, 3.30, 2);
        assert_eq!(swapped, stats);
    }

    #[test]
    fn extremes_of_values() {
        assert_eq!(extremes(&[]), (0.0, 0.0));
        assert_eq!(extremes(&[21.5, -4.0, 30.0]), (-4.0, 30.0));
    }

    #[test]
    fn vendor_flag_descriptions() {
        let flags = VendorFlags::Daly {
            alarms: vec![Alarm::RtcErr],
        };
        assert!(flags.any());
        assert_eq!(flags.descriptions(), vec!["RTC clock malfunction"]);

        let flags = VendorFlags::Jbd {
            protection: Protection::default(),
        };
        assert!(!flags.any());
        assert!(flags.descriptions().is_empty());
    }
}
