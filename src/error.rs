use crate::protocol::{daly, jbd};
use crate::session::Vendor;
use std::fmt;
use std::time::Duration;

/// Failures of the byte channel itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Nothing arrived before the read timeout expired.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// Some bytes arrived, but fewer than the frame needs.
    #[error("short read - expected={expected} received={received}")]
    ShortRead { expected: usize, received: usize },
    /// The channel was closed by the other side.
    #[error("channel closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural faults of a received frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short - required={required} received={received}")]
    TooShort { required: usize, received: usize },
    #[error("invalid frame size - expected={expected} received={received}")]
    WrongSize { expected: usize, received: usize },
    #[error("invalid start byte {0:#04X}")]
    BadStart(u8),
    #[error("invalid action byte {0:#04X}")]
    BadAction(u8),
    #[error("invalid end byte {0:#04X}")]
    BadEnd(u8),
    #[error("length field mismatch - declared={declared} actual={actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("invalid checksum - calculated={calculated:#04X} received={received:#04X}")]
    ChecksumMismatch { calculated: u8, received: u8 },
    #[error("invalid CRC - calculated={calculated:#06X} received={received:#06X}")]
    CrcMismatch { calculated: u16, received: u16 },
    #[error("reply for register {received:#04X} while waiting for {expected:#04X}")]
    UnexpectedRegister { expected: u8, received: u8 },
    #[error("BMS reported error status {0:#04X}")]
    ErrorStatus(u8),
}

/// A validated payload that does not carry what its register promises.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload of {register} truncated - required={required} received={received}")]
    Truncated {
        register: &'static str,
        required: usize,
        received: usize,
    },
}

/// Why a single polling step failed.
#[derive(Debug, thiserror::Error)]
pub enum Cause {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Cause {
    /// Transport and framing faults are worth another attempt, a payload that
    /// decodes short will decode short again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Cause::Decode(_))
    }

    pub fn frame(&self) -> Option<&FrameError> {
        match self {
            Cause::Frame(err) => Some(err),
            _ => None,
        }
    }
}

/// The command exchange a poll was executing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Daly(daly::Register),
    Jbd(jbd::Register),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Daly(register) => write!(f, "daly {register}"),
            Step::Jbd(register) => write!(f, "jbd {register}"),
        }
    }
}

/// A failed `poll()`. Fatal for the current cycle only.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed after {attempts} attempt(s): {cause}")]
pub struct PollError {
    pub step: Step,
    pub attempts: u8,
    #[source]
    pub cause: Cause,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("payload of {len} bytes exceeds the frame capacity of {capacity}")]
    PayloadTooLong { len: usize, capacity: usize },
    #[error("Value out of range")]
    RangeError,
    #[error("{operation} is not supported by the {vendor} protocol")]
    Unsupported {
        operation: &'static str,
        vendor: Vendor,
    },
}
