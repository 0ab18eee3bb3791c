#![cfg_attr(docsrs, feature(doc_cfg))]
//! # bmsmon_lib
//!
//! Polling engine for Daly and JBD battery management systems.
//!
//! The crate turns two incompatible serial protocols into one
//! [`TelemetrySnapshot`](snapshot::TelemetrySnapshot): the fixed 13-byte Daly
//! frames with an 8-bit checksum and the variable length JBD frames with a 16-bit
//! CRC. A [`BmsSession`](session::BmsSession) owns the vendor driver, applies the
//! retry policy of each command step and tracks the session peaks of current and
//! power.
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `bmsmon` command-line tool.
//! - `serialport`: Enables [`serialport::SerialTransport`], a blocking transport using the `serialport` crate.
//! - `serde`: Enables `serde` serialization of the telemetry types.
//! - `bin-dependencies`: Enables all features required by the `bmsmon` binary executable.

/// Error types for the library.
pub mod error;
/// Frame codecs and register decoders of both BMS families.
pub mod protocol;
/// The abstract byte channel.
pub mod transport;

pub mod driver;
pub mod energy;
pub mod peak;
pub mod session;
pub mod snapshot;

pub use error::{Error, PollError};
pub use session::{BmsSession, Vendor};
pub use snapshot::TelemetrySnapshot;

/// Serial port transport.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;
