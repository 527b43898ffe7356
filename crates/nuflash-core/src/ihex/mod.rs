//! Intel HEX codec
//!
//! Streaming reader and writer for the Intel HEX record format:
//!
//! ```text
//! :LLAAAATT<data...>CC
//! ```
//!
//! where `LL` is the payload length, `AAAA` the 16-bit address, `TT` the
//! record type and `CC` the two's complement of the byte sum of everything
//! before it.
//!
//! The [`Reader`] folds address extension records into absolute addresses
//! and yields [`Block`]s; the [`Writer`] does the reverse, emitting extended
//! linear address records whenever a block leaves the current 64 KiB segment.

mod reader;
mod record;
mod writer;

pub use reader::Reader;
pub use record::{read_record, write_record};
pub use writer::{Writer, RECORD_DATA_LEN};

use thiserror::Error;

/// Intel HEX record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Data bytes at a 16-bit offset from the current base
    Data = 0x00,
    /// End of file marker
    EndOfFile = 0x01,
    /// Segment base (bits 4..20 of the address)
    ExtendedSegmentAddress = 0x02,
    /// 80x86 CS:IP start address
    StartSegmentAddress = 0x03,
    /// Upper 16 bits of a 32-bit linear address
    ExtendedLinearAddress = 0x04,
    /// 32-bit linear start address
    StartLinearAddress = 0x05,
}

impl RecordKind {
    /// Map a record type byte to its kind
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Data),
            0x01 => Some(Self::EndOfFile),
            0x02 => Some(Self::ExtendedSegmentAddress),
            0x03 => Some(Self::StartSegmentAddress),
            0x04 => Some(Self::ExtendedLinearAddress),
            0x05 => Some(Self::StartLinearAddress),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::EndOfFile => "end of file",
            Self::ExtendedSegmentAddress => "extended segment address",
            Self::StartSegmentAddress => "start segment address",
            Self::ExtendedLinearAddress => "extended linear address",
            Self::StartLinearAddress => "start linear address",
        };
        f.write_str(name)
    }
}

/// A single Intel HEX record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record type
    pub kind: RecordKind,
    /// 16-bit address field
    pub address: u16,
    /// Payload
    pub data: Vec<u8>,
}

impl Record {
    /// Data record at a segment offset
    pub fn data(address: u16, data: &[u8]) -> Self {
        Self {
            kind: RecordKind::Data,
            address,
            data: data.to_vec(),
        }
    }

    /// End of file record
    pub fn end_of_file() -> Self {
        Self {
            kind: RecordKind::EndOfFile,
            address: 0,
            data: Vec::new(),
        }
    }

    /// Extended segment address record for `segment` (address = segment << 4)
    pub fn extended_segment_address(segment: u16) -> Self {
        Self {
            kind: RecordKind::ExtendedSegmentAddress,
            address: 0,
            data: segment.to_be_bytes().to_vec(),
        }
    }

    /// Extended linear address record carrying the upper 16 address bits
    pub fn extended_linear_address(upper: u16) -> Self {
        Self {
            kind: RecordKind::ExtendedLinearAddress,
            address: 0,
            data: upper.to_be_bytes().to_vec(),
        }
    }

    /// Checksum byte for this record
    pub fn checksum(&self) -> u8 {
        let [hi, lo] = self.address.to_be_bytes();
        let sum = self
            .data
            .iter()
            .fold(
                (self.data.len() as u8)
                    .wrapping_add(hi)
                    .wrapping_add(lo)
                    .wrapping_add(self.kind as u8),
                |acc, &b| acc.wrapping_add(b),
            );
        sum.wrapping_neg()
    }
}

/// A run of bytes at an absolute address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Absolute start address
    pub address: u32,
    /// Data bytes
    pub data: Vec<u8>,
}

/// Errors produced while decoding Intel HEX
#[derive(Debug, Error)]
pub enum HexError {
    /// Record did not start with ':'
    #[error("record does not start with ':' (found 0x{0:02X})")]
    InvalidPrefix(u8),

    /// Non-hex character inside a record
    #[error("invalid hex digit 0x{0:02X}")]
    InvalidHexDigit(u8),

    /// Record followed by something other than a line ending
    #[error("invalid line ending 0x{0:02X}")]
    InvalidTerminator(u8),

    /// Stored checksum does not match the record contents
    #[error("checksum mismatch: computed 0x{computed:02X}, record has 0x{found:02X}")]
    ChecksumMismatch {
        /// Checksum computed from the record
        computed: u8,
        /// Checksum stored in the record
        found: u8,
    },

    /// Payload length not valid for the record type
    #[error("invalid payload length {len} for {kind} record")]
    InvalidRecordLength {
        /// Record type
        kind: RecordKind,
        /// Payload length found
        len: usize,
    },

    /// Record type byte outside 00..=05
    #[error("unknown record type 0x{0:02X}")]
    InvalidRecordType(u8),

    /// Stream ended inside a record
    #[error("unexpected end of input inside a record")]
    UnexpectedEof,

    /// Underlying reader failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
