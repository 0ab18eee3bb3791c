//! The vendor-agnostic polling entry point.

use crate::driver::{DalyDriver, DriverConfig, JbdDriver, ProtocolDriver};
use crate::error::{Error, PollError};
use crate::peak::{PeakTracker, Peaks};
use crate::snapshot::TelemetrySnapshot;
use crate::transport::Transport;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Vendor {
    Daly,
    Jbd,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Vendor::Daly => write!(f, "daly"),
            Vendor::Jbd => write!(f, "jbd"),
        }
    }
}

impl FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daly" => Ok(Vendor::Daly),
            "jbd" => Ok(Vendor::Jbd),
            other => Err(format!("unknown BMS vendor '{other}', expected daly or jbd")),
        }
    }
}

/// Owns one protocol driver and the peaks of the polling session.
///
/// The driver is chosen once at construction. Peaks only move on a successful
/// poll and start from zero again only with a new session.
pub struct BmsSession {
    driver: Box<dyn ProtocolDriver + Send>,
    peaks: PeakTracker,
}

impl BmsSession {
    pub fn new(driver: Box<dyn ProtocolDriver + Send>) -> Self {
        Self {
            driver,
            peaks: PeakTracker::new(),
        }
    }

    pub fn daly<T: Transport + Send + 'static>(transport: T, config: DriverConfig) -> Self {
        Self::new(Box::new(DalyDriver::new(transport, config)))
    }

    pub fn jbd<T: Transport + Send + 'static>(transport: T, config: DriverConfig) -> Self {
        Self::new(Box::new(JbdDriver::new(transport, config)))
    }

    pub fn for_vendor<T: Transport + Send + 'static>(
        vendor: Vendor,
        transport: T,
        config: DriverConfig,
    ) -> Self {
        match vendor {
            Vendor::Daly => Self::daly(transport, config),
            Vendor::Jbd => Self::jbd(transport, config),
        }
    }

    pub fn vendor(&self) -> Vendor {
        self.driver.vendor()
    }

    /// Reads one complete snapshot with the session peaks applied.
    pub fn poll(&mut self) -> Result<TelemetrySnapshot, PollError> {
        let snapshot = self.driver.read()?;
        let peaks = self.peaks.update(snapshot.pack_current, snapshot.power);
        log::debug!(
            "{} snapshot: {:.2}V {:.2}A {:.1}% peaks {:.2}A {:.2}W",
            snapshot.vendor,
            snapshot.pack_voltage,
            snapshot.pack_current,
            snapshot.soc_percent,
            peaks.current,
            peaks.power
        );
        Ok(snapshot.with_peaks(peaks))
    }

    pub fn peaks(&self) -> Peaks {
        self.peaks.peaks()
    }

    pub fn set_charge_mosfet(&mut self, enable: bool) -> Result<(), Error> {
        self.driver.set_charge_mosfet(enable)
    }

    pub fn set_discharge_mosfet(&mut self, enable: bool) -> Result<(), Error> {
        self.driver.set_discharge_mosfet(enable)
    }

    pub fn set_soc(&mut self, soc_percent: f32) -> Result<(), Error> {
        self.driver.set_soc(soc_percent)
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.driver.reset()
    }

    pub fn hardware_version(&mut self) -> Result<String, Error> {
        self.driver.hardware_version()
    }
}

impl fmt::Debug for BmsSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BmsSession")
            .field("vendor", &self.vendor())
            .field("peaks", &self.peaks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_parsing() {
        assert_eq!("daly".parse::<Vendor>(), Ok(Vendor::Daly));
        assert_eq!("JBD".parse::<Vendor>(), Ok(Vendor::Jbd));
        assert!("victron".parse::<Vendor>().is_err());
        assert_eq!(Vendor::Jbd.to_string(), "jbd");
    }
}
