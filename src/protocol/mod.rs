//! Wire formats of the supported BMS families.
//!
//! Each vendor module owns its frame codec (request encoding, reply validation)
//! and the register decoders that turn a validated payload into typed values.
//! Nothing in here performs I/O.

use crate::error::DecodeError;

macro_rules! read_bit {
    ($byte:expr,$position:expr) => {
        ($byte >> $position) & 1 != 0
    };
}

pub mod daly;
pub mod jbd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Read,
    Write,
}

/// One request to the BMS. Built per exchange and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub register: u8,
    pub payload: Vec<u8>,
}

impl Command {
    pub fn read(register: u8) -> Self {
        Self {
            action: Action::Read,
            register,
            payload: Vec::new(),
        }
    }

    pub fn write(register: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            action: Action::Write,
            register,
            payload: payload.into(),
        }
    }
}

/// Bounds-checked big endian reader over a validated payload.
///
/// Every accessor fails with [`DecodeError::Truncated`] instead of reading past
/// the end of the payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Payload<'a> {
    register: &'static str,
    data: &'a [u8],
}

impl<'a> Payload<'a> {
    pub(crate) fn new(register: &'static str, data: &'a [u8]) -> Self {
        Self { register, data }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn require(&self, required: usize) -> Result<(), DecodeError> {
        if self.data.len() < required {
            log::warn!(
                "Payload of {} too short - required={} received={}",
                self.register,
                required,
                self.data.len()
            );
            return Err(DecodeError::Truncated {
                register: self.register,
                required,
                received: self.data.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        self.require(offset + len)?;
        Ok(&self.data[offset..offset + len])
    }

    pub(crate) fn u8(&self, offset: usize) -> Result<u8, DecodeError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub(crate) fn i8(&self, offset: usize) -> Result<i8, DecodeError> {
        Ok(self.u8(offset)? as i8)
    }

    pub(crate) fn u16(&self, offset: usize) -> Result<u16, DecodeError> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn i16(&self, offset: usize) -> Result<i16, DecodeError> {
        let b = self.bytes(offset, 2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&self, offset: usize) -> Result<u32, DecodeError> {
        let b = self.bytes(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
