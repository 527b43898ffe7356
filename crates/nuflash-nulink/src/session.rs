//! Request/response exchange with sequence numbers
//!
//! Every request gets a fresh sequence number in `1..=0x7F`. The programmer
//! echoes it in its response. Interrupt endpoints may still hold responses
//! to earlier requests, so frames carrying a different sequence number are
//! skipped, up to [`MAX_RECEIVE_ATTEMPTS`] frames per response.

use crate::error::{NulinkError, Result};
use crate::framer::{FrameFormat, Framer};
use crate::transport::Transport;

/// Frames read while waiting for a matching response
pub const MAX_RECEIVE_ATTEMPTS: usize = 5;

/// Largest sequence number before wrapping back to 1
const MAX_SEQUENCE: u8 = 0x7F;

/// One programmer session: a transport, its frame layout and the sequence
/// counter
pub struct Session<T> {
    transport: T,
    framer: Box<dyn Framer>,
    sequence: u8,
    rx_buf: Vec<u8>,
}

impl<T: Transport> Session<T> {
    /// Session using the given frame layout
    pub fn new(transport: T, format: FrameFormat) -> Self {
        Self::with_framer(transport, format.framer())
    }

    /// Session using a specific framer
    pub fn with_framer(transport: T, framer: Box<dyn Framer>) -> Self {
        let rx_buf = vec![0u8; framer.frame_len()];
        Self {
            transport,
            framer,
            sequence: 0,
            rx_buf,
        }
    }

    /// Largest request or response body
    pub fn max_body_len(&self) -> usize {
        self.framer.max_body_len()
    }

    /// Sequence number of the last request sent (0 before the first)
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    fn next_sequence(&mut self) -> u8 {
        self.sequence = if self.sequence >= MAX_SEQUENCE {
            1
        } else {
            self.sequence + 1
        };
        self.sequence
    }

    /// Send one request body
    pub fn send(&mut self, body: &[u8]) -> Result<()> {
        let sequence = self.next_sequence();
        let frame = self.framer.frame(sequence, body)?;

        log::trace!("> {:02X?}", frame);
        let written = self.transport.write(&frame)?;
        if written != frame.len() {
            return Err(NulinkError::WriteSize {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }

    /// Receive the body of the response to the last request
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        let expected = self.framer.frame_len();

        for attempt in 1..=MAX_RECEIVE_ATTEMPTS {
            let read = self.transport.read(&mut self.rx_buf)?;
            if read != expected {
                return Err(NulinkError::ReadSize { read, expected });
            }

            log::trace!("< {:02X?}", self.rx_buf);
            let frame = self.framer.unframe(&self.rx_buf)?;
            if frame.sequence == self.sequence {
                return Ok(frame.body.to_vec());
            }

            log::debug!(
                "expected sequence number {}, got {} (frame {} of {})",
                self.sequence,
                frame.sequence,
                attempt,
                MAX_RECEIVE_ATTEMPTS
            );
        }

        Err(NulinkError::SequenceMismatch {
            expected: self.sequence,
            attempts: MAX_RECEIVE_ATTEMPTS,
        })
    }

    /// Send a request and wait for its response
    pub fn request(&mut self, body: &[u8]) -> Result<Vec<u8>> {
        self.send(body)?;
        self.receive()
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutable
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }
}
