//! [`Transport`] over a local serial port using the `serialport` crate.
//!
//! # Example
//!
//! ```no_run
//! use bmsmon_lib::driver::DriverConfig;
//! use bmsmon_lib::serialport::SerialTransport;
//! use bmsmon_lib::session::BmsSession;
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", 9600).unwrap();
//! let mut session = BmsSession::jbd(transport, DriverConfig::jbd());
//! match session.poll() {
//!     Ok(snapshot) => println!("SOC: {}%", snapshot.soc_percent),
//!     Err(err) => eprintln!("communication fault: {err}"),
//! }
//! ```

use crate::error::TransportError;
use crate::transport::Transport;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Shortest pause between the end of one exchange and the next request.
pub const MINIMUM_DELAY: Duration = Duration::from_millis(4);

pub struct SerialTransport {
    serial: Box<dyn serialport::SerialPort>,
    last_execution: Instant,
    delay: Duration,
}

impl SerialTransport {
    /// Opens `port` with 8N1 framing and no flow control.
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let serial = serialport::new(port, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(io_error)?;
        log::debug!("Opened serial port {port} at {baud_rate} baud");
        Ok(Self {
            serial,
            last_execution: Instant::now(),
            delay: MINIMUM_DELAY,
        })
    }

    /// Sets the pause between exchanges, never below [`MINIMUM_DELAY`].
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Duration::max(delay, MINIMUM_DELAY);
    }

    fn await_delay(&self) {
        let last_exec_diff = Instant::now().duration_since(self.last_execution);
        if let Some(time_until_delay_reached) = self.delay.checked_sub(last_exec_diff) {
            std::thread::sleep(time_until_delay_reached);
        }
    }

    /// Throws away whatever is still pending from an earlier, failed exchange.
    fn drain_input(&mut self) -> Result<(), TransportError> {
        loop {
            let pending = self.serial.bytes_to_read().map_err(io_error)?;
            if pending == 0 {
                return Ok(());
            }
            log::trace!("Got {} pending bytes", pending);
            let mut buf = [0u8; 64];
            let received = self.serial.read(&mut buf)?;
            log::trace!("Dropped {} pending bytes", received);
            if received == 0 {
                return Ok(());
            }
        }
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.drain_input()?;
        self.await_delay();
        self.serial.write_all(bytes)?;
        Ok(())
    }

    fn receive(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut rx_buffer = vec![0u8; max_len];
        let mut received = 0;
        while received < max_len {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.serial.set_timeout(remaining).map_err(io_error)?;
            match self.serial.read(&mut rx_buffer[received..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => received += n,
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => break,
                Err(err) => return Err(err.into()),
            }
        }
        self.last_execution = Instant::now();
        if received == 0 {
            return Err(TransportError::Timeout(timeout));
        }
        rx_buffer.truncate(received);
        Ok(rx_buffer)
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.serial.name())
            .field("delay", &self.delay)
            .finish()
    }
}

fn io_error(err: serialport::Error) -> TransportError {
    TransportError::Io(err.into())
}
