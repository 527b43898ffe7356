//! Fixed-size transport frames
//!
//! Every USB transfer carries exactly one frame:
//!
//! ```text
//! V1 (64 bytes):   [seq:1][len:1][body:len][zero padding]
//! V2 (1024 bytes): [seq:1][len:2 LE][body:len][zero padding]
//! ```
//!
//! The rest of the crate only uses the [`Framer`] trait, so the layout in
//! use is decided once when the programmer is opened.

use crate::error::{NulinkError, Result};

/// A decoded frame borrowing its body from the raw buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Sequence number
    pub sequence: u8,
    /// Body without padding
    pub body: &'a [u8],
}

/// Frame layout of one programmer family
pub trait Framer: Send {
    /// Total size of every frame
    fn frame_len(&self) -> usize;

    /// Largest body a frame can carry
    fn max_body_len(&self) -> usize;

    /// Build a full-size frame
    fn frame(&self, sequence: u8, body: &[u8]) -> Result<Vec<u8>>;

    /// Split a raw frame into sequence number and body
    fn unframe<'a>(&self, raw: &'a [u8]) -> Result<Frame<'a>>;
}

fn check_body(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(NulinkError::BodyTooLong { len, max });
    }
    Ok(())
}

fn check_frame(raw: &[u8], expected: usize) -> Result<()> {
    if raw.len() != expected {
        return Err(NulinkError::FrameLength {
            len: raw.len(),
            expected,
        });
    }
    Ok(())
}

/// 64-byte frames with a one-byte length (Nu-Link-Me, Nu-Link)
#[derive(Debug, Clone, Copy, Default)]
pub struct V1Framer;

impl V1Framer {
    const FRAME_LEN: usize = 64;
    const HEADER_LEN: usize = 2;
}

impl Framer for V1Framer {
    fn frame_len(&self) -> usize {
        Self::FRAME_LEN
    }

    fn max_body_len(&self) -> usize {
        Self::FRAME_LEN - Self::HEADER_LEN
    }

    fn frame(&self, sequence: u8, body: &[u8]) -> Result<Vec<u8>> {
        check_body(body.len(), self.max_body_len())?;
        let mut buf = vec![0u8; Self::FRAME_LEN];
        buf[0] = sequence;
        buf[1] = body.len() as u8;
        buf[Self::HEADER_LEN..Self::HEADER_LEN + body.len()].copy_from_slice(body);
        Ok(buf)
    }

    fn unframe<'a>(&self, raw: &'a [u8]) -> Result<Frame<'a>> {
        check_frame(raw, Self::FRAME_LEN)?;
        let len = raw[1] as usize;
        check_body(len, self.max_body_len())?;
        Ok(Frame {
            sequence: raw[0],
            body: &raw[Self::HEADER_LEN..Self::HEADER_LEN + len],
        })
    }
}

/// 1024-byte frames with a 16-bit little-endian length (Nu-Link2)
#[derive(Debug, Clone, Copy, Default)]
pub struct V2Framer;

impl V2Framer {
    const FRAME_LEN: usize = 1024;
    const HEADER_LEN: usize = 3;
}

impl Framer for V2Framer {
    fn frame_len(&self) -> usize {
        Self::FRAME_LEN
    }

    fn max_body_len(&self) -> usize {
        Self::FRAME_LEN - Self::HEADER_LEN
    }

    fn frame(&self, sequence: u8, body: &[u8]) -> Result<Vec<u8>> {
        check_body(body.len(), self.max_body_len())?;
        let mut buf = vec![0u8; Self::FRAME_LEN];
        buf[0] = sequence;
        buf[1..3].copy_from_slice(&(body.len() as u16).to_le_bytes());
        buf[Self::HEADER_LEN..Self::HEADER_LEN + body.len()].copy_from_slice(body);
        Ok(buf)
    }

    fn unframe<'a>(&self, raw: &'a [u8]) -> Result<Frame<'a>> {
        check_frame(raw, Self::FRAME_LEN)?;
        let len = u16::from_le_bytes([raw[1], raw[2]]) as usize;
        check_body(len, self.max_body_len())?;
        Ok(Frame {
            sequence: raw[0],
            body: &raw[Self::HEADER_LEN..Self::HEADER_LEN + len],
        })
    }
}

/// Frame layout selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// [`V1Framer`]
    V1,
    /// [`V2Framer`]
    V2,
}

impl FrameFormat {
    /// Framer implementing this layout
    pub fn framer(self) -> Box<dyn Framer> {
        match self {
            FrameFormat::V1 => Box::new(V1Framer),
            FrameFormat::V2 => Box::new(V2Framer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_layout() {
        let framer = V1Framer;
        let raw = framer.frame(0x12, &[0xA3, 0, 0, 0]).unwrap();
        assert_eq!(raw.len(), 64);
        assert_eq!(&raw[..6], [0x12, 4, 0xA3, 0, 0, 0]);
        assert!(raw[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_v1_body_limits() {
        let framer = V1Framer;
        assert_eq!(framer.max_body_len(), 62);
        assert!(framer.frame(1, &[0xFF; 62]).is_ok());
        assert!(matches!(
            framer.frame(1, &[0xFF; 63]),
            Err(NulinkError::BodyTooLong { len: 63, max: 62 })
        ));
    }

    #[test]
    fn test_v1_unframe() {
        let framer = V1Framer;
        let raw = framer.frame(7, b"hello").unwrap();
        let frame = framer.unframe(&raw).unwrap();
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.body, b"hello");
    }

    #[test]
    fn test_v1_unframe_errors() {
        let framer = V1Framer;
        assert!(matches!(
            framer.unframe(&[0u8; 63]),
            Err(NulinkError::FrameLength { len: 63, expected: 64 })
        ));
        let mut raw = [0u8; 64];
        raw[1] = 63;
        assert!(matches!(
            framer.unframe(&raw),
            Err(NulinkError::BodyTooLong { len: 63, .. })
        ));
    }

    #[test]
    fn test_v2_layout() {
        let framer = V2Framer;
        let body = vec![0x5A; 300];
        let raw = framer.frame(0x7F, &body).unwrap();
        assert_eq!(raw.len(), 1024);
        assert_eq!(&raw[..3], [0x7F, 0x2C, 0x01]);
        let frame = framer.unframe(&raw).unwrap();
        assert_eq!(frame.sequence, 0x7F);
        assert_eq!(frame.body, &body[..]);
    }

    #[test]
    fn test_v2_limits() {
        let framer = V2Framer;
        assert_eq!(framer.max_body_len(), 1021);
        assert!(framer.frame(1, &vec![0u8; 1022]).is_err());
        let mut raw = vec![0u8; 1024];
        raw[1..3].copy_from_slice(&1022u16.to_le_bytes());
        assert!(matches!(
            framer.unframe(&raw),
            Err(NulinkError::BodyTooLong { len: 1022, max: 1021 })
        ));
        assert!(framer.unframe(&raw[..64]).is_err());
    }

    #[test]
    fn test_format_selects_framer() {
        assert_eq!(FrameFormat::V1.framer().frame_len(), 64);
        assert_eq!(FrameFormat::V2.framer().frame_len(), 1024);
    }
}
