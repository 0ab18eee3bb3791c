use anyhow::{Context, Result};
use bmsmon_lib::serialport::SerialTransport;
use bmsmon_lib::BmsSession;
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::{ops::Deref, panic};

mod commandline;
mod daemon;
mod mqtt;
mod output;

use commandline::{CliArgs, CliCommands, OutputFormat};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn print_snapshot(session: &mut BmsSession, format: OutputFormat) -> Result<()> {
    let snapshot = session.poll().with_context(|| "Cannot poll BMS")?;
    let sample = output::Sample {
        snapshot: &snapshot,
        elapsed: std::time::Duration::ZERO,
        energy_wh: 0.0,
    };
    match format {
        OutputFormat::Human => println!("{}", output::human_report(&snapshot)),
        OutputFormat::Csv => {
            let layout = output::CsvLayout::for_snapshot(&snapshot);
            println!("{}", layout.header());
            println!("{}", layout.row(&sample));
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&output::json_value(&sample)?)?
        ),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let config = args.driver_config();
    debug!("Driver config for {}: {config:?}", args.vendor);

    let mut transport = SerialTransport::open(&args.device, args.baud)
        .with_context(|| format!("Cannot open serial port '{}'", args.device))?;
    transport.set_delay(args.delay);
    let mut session = BmsSession::for_vendor(args.vendor, transport, config);

    match args.command {
        CliCommands::Poll { format } => print_snapshot(&mut session, format)?,
        CliCommands::Daemon {
            output,
            interval,
            max_interval,
        } => daemon::run(session, output, interval, max_interval)?,
        CliCommands::SetChargeMosfet { enable } => session
            .set_charge_mosfet(enable)
            .with_context(|| "Cannot set charge mosfet")?,
        CliCommands::SetDischargeMosfet { enable } => session
            .set_discharge_mosfet(enable)
            .with_context(|| "Cannot set discharge mosfet")?,
        CliCommands::SetSoc { soc_percent } => session
            .set_soc(soc_percent)
            .with_context(|| "Cannot set SOC")?,
        CliCommands::Reset => session.reset().with_context(|| "Cannot reset BMS")?,
        CliCommands::HardwareVersion => println!(
            "Hardware version: {}",
            session
                .hardware_version()
                .with_context(|| "Cannot get hardware version")?
        ),
    }

    Ok(())
}
