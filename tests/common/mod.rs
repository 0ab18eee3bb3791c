#![allow(dead_code)]

use bmsmon_lib::driver::DriverConfig;
use bmsmon_lib::error::TransportError;
use bmsmon_lib::protocol::{daly, jbd};
use bmsmon_lib::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake BMS answers to one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Bytes(Vec<u8>),
    Silence,
}

#[derive(Debug, Default)]
pub struct Log {
    pub sent: Vec<Vec<u8>>,
    pub receives: usize,
}

/// In-memory BMS: every `send` pops the next scripted reply, reads are served in
/// chunks of at most `chunk` bytes.
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    pending: VecDeque<u8>,
    chunk: usize,
    log: Arc<Mutex<Log>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> (Self, Arc<Mutex<Log>>) {
        Self::chunked(replies, usize::MAX)
    }

    pub fn chunked(
        replies: impl IntoIterator<Item = Reply>,
        chunk: usize,
    ) -> (Self, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        (
            Self {
                replies: replies.into_iter().collect(),
                pending: VecDeque::new(),
                chunk: chunk.max(1),
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.log.lock().unwrap().sent.push(bytes.to_vec());
        self.pending.clear();
        if let Some(Reply::Bytes(reply)) = self.replies.pop_front() {
            self.pending.extend(reply);
        }
        Ok(())
    }

    fn receive(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.log.lock().unwrap().receives += 1;
        if self.pending.is_empty() {
            return Err(TransportError::Timeout(timeout));
        }
        let len = max_len.min(self.chunk).min(self.pending.len());
        Ok(self.pending.drain(..len).collect())
    }
}

/// Vendor defaults without any sleeping.
pub fn fast(config: DriverConfig) -> DriverConfig {
    let mut config = config;
    config.retry.backoff = Duration::ZERO;
    config.settle = Duration::ZERO;
    config.reset_settle = Duration::ZERO;
    config
}

pub fn daly_reply(register: daly::Register, data: [u8; daly::PAYLOAD_LENGTH]) -> Reply {
    let mut frame = vec![0xA5, 0x01, register.code(), 0x08];
    frame.extend_from_slice(&data);
    frame.push(daly::checksum(&frame));
    Reply::Bytes(frame)
}

/// A complete, healthy Daly answer sequence: 50.0 V, `current_raw` / 10 A,
/// 50.0 % SOC, three cells and two sensors.
pub fn daly_sequence(current_raw: i16) -> Vec<Reply> {
    use daly::Register::*;
    let current = current_raw.to_be_bytes();
    vec![
        daly_reply(
            VoutIoutSoc,
            [0x01, 0xF4, 0x00, 0x00, current[0], current[1], 0x01, 0xF4],
        ),
        daly_reply(MinMaxCellVoltage, [0x0C, 0xE6, 2, 0x0C, 0xE4, 1, 0, 0]),
        daly_reply(MinMaxTemperature, [25, 1, 22, 2, 0, 0, 0, 0]),
        daly_reply(StatusInfo, [3, 2, 0, 1, 0, 0, 0x00, 0x0A]),
        daly_reply(CellVoltages, [1, 0x0C, 0xE4, 0x0C, 0xE6, 0x0C, 0xE5, 0]),
        daly_reply(CellTemperature, [1, 25, 22, 0, 0, 0, 0, 0]),
        daly_reply(CellBalanceState, [0, 0, 0, 0x02, 0, 0, 0, 0]),
        daly_reply(FailureCodes, [0; 8]),
        daly_reply(DischargeChargeMosStatus, [1, 1, 7, 0, 0x4E, 0x20, 0, 0]),
    ]
}

/// HWINFO payload with `cells` cells and two NTCs at 25.0 °C and 21.0 °C.
pub fn hwinfo_payload(current_raw: i16, cells: u8) -> Vec<u8> {
    let mut data = vec![0u8; 23];
    data[0..2].copy_from_slice(&5210u16.to_be_bytes());
    data[2..4].copy_from_slice(&current_raw.to_be_bytes());
    data[4..6].copy_from_slice(&8700u16.to_be_bytes());
    data[6..8].copy_from_slice(&10000u16.to_be_bytes());
    data[8..10].copy_from_slice(&12u16.to_be_bytes());
    data[12..14].copy_from_slice(&0x0004u16.to_be_bytes());
    data[19] = 87;
    data[20] = 0x03;
    data[21] = cells;
    data[22] = 2;
    data.extend_from_slice(&2981u16.to_be_bytes());
    data.extend_from_slice(&2941u16.to_be_bytes());
    data
}

pub fn jbd_reply(register: jbd::Register, data: &[u8]) -> Reply {
    Reply::Bytes(jbd::encode_reply(register.code(), 0x00, data).unwrap())
}

pub fn cellinfo_payload(millivolts: &[u16]) -> Vec<u8> {
    millivolts.iter().flat_map(|mv| mv.to_be_bytes()).collect()
}

/// A HWINFO reply whose CRC no longer matches.
pub fn corrupted(reply: Reply) -> Reply {
    match reply {
        Reply::Bytes(mut frame) => {
            let crc_offset = frame.len() - 3;
            frame[crc_offset + 1] ^= 0x01;
            Reply::Bytes(frame)
        }
        Reply::Silence => Reply::Silence,
    }
}
