use crate::mqtt;
use bmsmon_lib::driver::{DriverConfig, RetryPolicy};
use bmsmon_lib::protocol::daly::Address;
use bmsmon_lib::Vendor;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per snapshot: voltage, current, SOC and power
    Human,
    /// Comma separated values with a header line
    Csv,
    /// The complete snapshot as JSON
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Read one complete snapshot and print it
    Poll {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },
    /// Run in daemon mode, periodically polling the BMS and outputting snapshots
    Daemon {
        /// Output destination for snapshots
        #[command(subcommand)]
        output: DaemonOutput,
        /// Polling interval (e.g., "1s", "10s")
        #[clap(long, short, value_parser = humantime::parse_duration, default_value = "10s")]
        interval: Duration,
        /// Upper bound of the interval while the BMS does not answer
        #[clap(long, value_parser = humantime::parse_duration, default_value = "5m")]
        max_interval: Duration,
    },
    /// Enable or disable the charge MOSFET
    SetChargeMosfet {
        /// Enable the charge MOSFET. If this flag is not present, it will be disabled.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Enable or disable the discharge MOSFET
    SetDischargeMosfet {
        /// Enable the discharge MOSFET. If this flag is not present, it will be disabled.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Set State of Charge (SOC) in percent (Daly only)
    SetSoc {
        /// The desired SOC value as a percentage (e.g., 75.5 for 75.5%)
        soc_percent: f32,
    },
    /// Reset the BMS (Daly only, use with caution!)
    Reset,
    /// Show the hardware version string (JBD only)
    HardwareVersion,
}

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum MqttFormat {
    Simple,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DaemonOutput {
    /// Continuously poll the BMS and print snapshots to the standard output (console).
    Console {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },
    /// Continuously poll the BMS and publish snapshots to an MQTT broker.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = mqtt::MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
        /// Output format for MQTT messages
        #[arg(long, value_enum, default_value_t = MqttFormat::Simple)]
        format: MqttFormat,
    },
}

const fn about_text() -> &'static str {
    "Daly and JBD BMS command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    /// BMS protocol family (daly, jbd)
    #[arg(long, default_value = "daly")]
    pub vendor: Vendor,

    /// Serial baud rate
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Timeout for a single reply (e.g., "100ms", "1s"), defaults to the vendor setting
    #[arg(value_parser = humantime::parse_duration, long)]
    pub timeout: Option<Duration>,

    // Some USB - RS485 dongles requires at least 10ms to switch between TX and RX, so use a save delay between frames
    /// Delay between sending multiple commands to the BMS (e.g., "15ms", "50ms")
    /// (useful for some serial adapters that need time to switch between TX/RX)
    #[arg(value_parser = humantime::parse_duration, long, default_value = "15ms")]
    pub delay: Duration,

    /// Attempts per command step, defaults to 1 for Daly and 3 for JBD
    #[arg(long)]
    pub retries: Option<u8>,

    /// Pause between two attempts of a step (e.g., "50ms")
    #[arg(value_parser = humantime::parse_duration, long)]
    pub backoff: Option<Duration>,

    /// Daly host address placed in every request (e.g., 0x40)
    #[arg(long, value_parser = clap_num::maybe_hex::<u8>)]
    pub address: Option<u8>,
}

impl CliArgs {
    /// Vendor defaults with the command line overrides applied.
    pub fn driver_config(&self) -> DriverConfig {
        let mut config = DriverConfig::for_vendor(self.vendor);
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        config.retry = RetryPolicy {
            attempts: self.retries.unwrap_or(config.retry.attempts),
            backoff: self.backoff.unwrap_or(config.retry.backoff),
        };
        if let Some(address) = self.address {
            config.address = Address(address);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_defaults_without_overrides() {
        let args = CliArgs::parse_from(["bmsmon", "--vendor", "jbd", "poll"]);
        assert_eq!(args.driver_config(), DriverConfig::jbd());
        assert_eq!(
            args.command,
            CliCommands::Poll {
                format: OutputFormat::Human
            }
        );
    }

    #[test]
    fn overrides_apply() {
        let args = CliArgs::parse_from([
            "bmsmon",
            "--retries",
            "2",
            "--backoff",
            "20ms",
            "--timeout",
            "250ms",
            "--address",
            "0x80",
            "reset",
        ]);
        let config = args.driver_config();
        assert_eq!(args.vendor, Vendor::Daly);
        assert_eq!(config.retry.attempts, 2);
        assert_eq!(config.retry.backoff, Duration::from_millis(20));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.address, Address(0x80));
    }

    #[test]
    fn daemon_arguments() {
        let args = CliArgs::parse_from([
            "bmsmon", "daemon", "--interval", "1s", "console", "--format", "csv",
        ]);
        assert_eq!(
            args.command,
            CliCommands::Daemon {
                output: DaemonOutput::Console {
                    format: OutputFormat::Csv
                },
                interval: Duration::from_secs(1),
                max_interval: Duration::from_secs(300),
            }
        );
    }
}
