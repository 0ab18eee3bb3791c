use crate::error::TransportError;
use std::time::Duration;

/// A half-duplex byte channel to the BMS, already opened and configured.
///
/// The channel is not safe for concurrent use; one owner drives one exchange at a
/// time.
pub trait Transport {
    /// Writes the complete frame.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads up to `max_len` bytes, waiting at most `timeout`.
    ///
    /// Returns what arrived before the deadline, which may be fewer than
    /// `max_len` bytes. Returns [`TransportError::Timeout`] if nothing arrived.
    fn receive(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).receive(max_len, timeout)
    }
}

/// Reads exactly `len` bytes, collecting as many chunks as the channel delivers.
///
/// A timeout after a partial frame is reported as [`TransportError::ShortRead`],
/// a timeout before the first byte as [`TransportError::Timeout`].
pub fn receive_exact<T: Transport + ?Sized>(
    transport: &mut T,
    len: usize,
    timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    let mut rx_buffer = Vec::with_capacity(len);
    while rx_buffer.len() < len {
        match transport.receive(len - rx_buffer.len(), timeout) {
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => rx_buffer.extend_from_slice(&chunk),
            Err(TransportError::Timeout(_)) if !rx_buffer.is_empty() => break,
            Err(err) => return Err(err),
        }
    }
    if rx_buffer.is_empty() && len > 0 {
        return Err(TransportError::Timeout(timeout));
    }
    if rx_buffer.len() < len {
        log::trace!("Short read {:02X?}", rx_buffer);
        return Err(TransportError::ShortRead {
            expected: len,
            received: rx_buffer.len(),
        });
    }
    log::trace!("receive_bytes: {:02X?}", rx_buffer);
    Ok(rx_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Chunks(VecDeque<Vec<u8>>);

    impl Transport for Chunks {
        fn send(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn receive(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
            let mut chunk = self.0.pop_front().ok_or(TransportError::Timeout(timeout))?;
            if chunk.len() > max_len {
                let rest = chunk.split_off(max_len);
                self.0.push_front(rest);
            }
            Ok(chunk)
        }
    }

    #[test]
    fn collects_chunks() {
        let mut transport = Chunks(VecDeque::from([vec![1, 2], vec![3], vec![4, 5, 6]]));
        let rx = receive_exact(&mut transport, 5, Duration::ZERO).unwrap();
        assert_eq!(rx, vec![1, 2, 3, 4, 5]);
        let rx = receive_exact(&mut transport, 1, Duration::ZERO).unwrap();
        assert_eq!(rx, vec![6]);
    }

    #[test]
    fn partial_frame_is_short_read() {
        let mut transport = Chunks(VecDeque::from([vec![0xA5; 7]]));
        assert!(matches!(
            receive_exact(&mut transport, 13, Duration::ZERO),
            Err(TransportError::ShortRead {
                expected: 13,
                received: 7
            })
        ));
    }

    #[test]
    fn silence_is_timeout() {
        let mut transport = Chunks(VecDeque::new());
        assert!(matches!(
            receive_exact(&mut transport, 13, Duration::from_millis(100)),
            Err(TransportError::Timeout(timeout)) if timeout == Duration::from_millis(100)
        ));
    }
}
