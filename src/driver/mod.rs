//! Per-vendor command sequencing on top of a [`Transport`](crate::transport::Transport).

use crate::error::{Cause, Error, PollError, Step};
use crate::protocol::daly::Address;
use crate::session::Vendor;
use crate::snapshot::TelemetrySnapshot;
use std::time::Duration;

pub mod daly;
pub mod jbd;

pub use self::daly::DalyDriver;
pub use self::jbd::JbdDriver;

/// One vendor's way of filling a [`TelemetrySnapshot`].
///
/// `read` either returns a snapshot built from a complete command sequence or the
/// first step that failed. Peaks are left at zero; the session fills them in.
pub trait ProtocolDriver {
    fn vendor(&self) -> Vendor;

    fn read(&mut self) -> Result<TelemetrySnapshot, PollError>;

    fn set_charge_mosfet(&mut self, enable: bool) -> Result<(), Error>;

    fn set_discharge_mosfet(&mut self, enable: bool) -> Result<(), Error>;

    fn set_soc(&mut self, _soc_percent: f32) -> Result<(), Error> {
        Err(Error::Unsupported {
            operation: "set SOC",
            vendor: self.vendor(),
        })
    }

    fn reset(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported {
            operation: "reset",
            vendor: self.vendor(),
        })
    }

    fn hardware_version(&mut self) -> Result<String, Error> {
        Err(Error::Unsupported {
            operation: "hardware version",
            vendor: self.vendor(),
        })
    }
}

/// How often a single step is tried before the poll gives up on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one, at least 1.
    pub attempts: u8,
    /// Pause between two attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Per-read timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Pause after a fire-and-forget write.
    pub settle: Duration,
    /// Pause after a BMS reset.
    pub reset_settle: Duration,
    /// Daly host address, unused by JBD.
    pub address: Address,
}

impl DriverConfig {
    pub fn daly() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            retry: RetryPolicy::once(),
            settle: Duration::from_millis(100),
            reset_settle: Duration::from_millis(1000),
            address: Address::default(),
        }
    }

    pub fn jbd() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            retry: RetryPolicy {
                attempts: 3,
                backoff: Duration::from_millis(50),
            },
            settle: Duration::from_millis(100),
            reset_settle: Duration::from_millis(1000),
            address: Address::default(),
        }
    }

    pub fn for_vendor(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Daly => Self::daly(),
            Vendor::Jbd => Self::jbd(),
        }
    }
}

/// Runs `attempt` until it succeeds, the policy is exhausted or the cause is not
/// worth repeating.
pub(crate) fn with_retry<T>(
    step: Step,
    policy: RetryPolicy,
    mut attempt: impl FnMut() -> Result<T, Cause>,
) -> Result<T, PollError> {
    let attempts = policy.attempts.max(1);
    let mut tried = 0;
    loop {
        tried += 1;
        match attempt() {
            Ok(value) => return Ok(value),
            Err(cause) if tried < attempts && cause.is_retryable() => {
                log::trace!("Failed try {} of {}, repeating ({cause})", tried, attempts);
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
            }
            Err(cause) => {
                log::debug!("{step} failed on try {} of {}: {cause}", tried, attempts);
                return Err(PollError {
                    step,
                    attempts: tried,
                    cause,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, FrameError, TransportError};
    use crate::protocol::jbd::Register;

    const STEP: Step = Step::Jbd(Register::HwInfo);

    fn policy(attempts: u8) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn vendor_defaults() {
        let daly = DriverConfig::daly();
        assert_eq!(daly.retry.attempts, 1);
        assert_eq!(daly.timeout, Duration::from_millis(100));
        assert_eq!(daly.settle, Duration::from_millis(100));
        assert_eq!(daly.reset_settle, Duration::from_millis(1000));

        let jbd = DriverConfig::for_vendor(Vendor::Jbd);
        assert_eq!(jbd.retry.attempts, 3);
        assert_eq!(jbd.retry.backoff, Duration::from_millis(50));
    }

    #[test]
    fn succeeds_after_failures() {
        let mut calls = 0;
        let result = with_retry(STEP, policy(3), || {
            calls += 1;
            if calls < 3 {
                Err(Cause::from(TransportError::Timeout(Duration::ZERO)))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exhausts_attempts() {
        let mut calls = 0;
        let err = with_retry::<()>(STEP, policy(3), || {
            calls += 1;
            Err(Cause::from(FrameError::CrcMismatch {
                calculated: 1,
                received: 2,
            }))
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.step, STEP);
        assert!(matches!(
            err.cause.frame(),
            Some(FrameError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn decode_errors_are_not_retried() {
        let mut calls = 0;
        let err = with_retry::<()>(STEP, policy(3), || {
            calls += 1;
            Err(Cause::from(DecodeError::Truncated {
                register: "HWINFO",
                required: 23,
                received: 4,
            }))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _ = with_retry::<()>(STEP, policy(0), || {
            calls += 1;
            Err(Cause::from(TransportError::Closed))
        });
        assert_eq!(calls, 1);
    }
}
