//! Error types for the Nu-Link programmer

use nuflash_core::target::DeviceId;
use thiserror::Error;

use crate::command::{FirmwareVersion, MemorySpace};
use crate::connection::ConnectionState;

/// Result type for Nu-Link operations
pub type Result<T> = std::result::Result<T, NulinkError>;

/// Errors that can occur when talking to a Nu-Link programmer
#[derive(Debug, Error)]
pub enum NulinkError {
    /// Frame body does not fit the framer
    #[error("frame body of {len} bytes exceeds the {max} byte limit")]
    BodyTooLong {
        /// Body length requested or declared
        len: usize,
        /// Largest body the framer carries
        max: usize,
    },

    /// Raw frame has the wrong size
    #[error("frame of {len} bytes, expected {expected}")]
    FrameLength {
        /// Bytes received
        len: usize,
        /// Fixed frame size
        expected: usize,
    },

    /// Transport accepted fewer bytes than a full frame
    #[error("short write: {written} of {expected} bytes")]
    WriteSize {
        /// Bytes written
        written: usize,
        /// Frame size
        expected: usize,
    },

    /// Transport returned fewer bytes than a full frame
    #[error("short read: {read} of {expected} bytes")]
    ReadSize {
        /// Bytes read
        read: usize,
        /// Frame size
        expected: usize,
    },

    /// No frame with the expected sequence number arrived
    #[error("no response with sequence number {expected} after {attempts} frames")]
    SequenceMismatch {
        /// Sequence number of the outstanding request
        expected: u8,
        /// Frames read before giving up
        attempts: usize,
    },

    /// Response does not echo the command code
    #[error("response to command 0x{expected:02X} carries 0x{found:08X}")]
    ResponseMismatch {
        /// Command code sent
        expected: u32,
        /// First word of the response
        found: u32,
    },

    /// Response is shorter than the command requires
    #[error("response of {len} bytes is too short, need {need}")]
    ResponseTooShort {
        /// Response length
        len: usize,
        /// Bytes required
        need: usize,
    },

    /// No supported programmer attached
    #[error("no programmer found")]
    NoProgrammer,

    /// More than one supported programmer attached
    #[error("{0} programmers found - only one may be attached")]
    MultipleProgrammers(usize),

    /// Programmer firmware predates the supported protocol
    #[error("programmer firmware {found} is out of date, need at least {required}")]
    FirmwareTooOld {
        /// Version reported by the programmer
        found: FirmwareVersion,
        /// Oldest supported version
        required: FirmwareVersion,
    },

    /// Attached chip is not the selected target
    #[error("target reports device ID {found}, expected {expected} for {target}")]
    DeviceMismatch {
        /// Name of the selected target
        target: &'static str,
        /// Device ID of the selected target
        expected: DeviceId,
        /// Device ID reported by the chip
        found: DeviceId,
    },

    /// Operation needs a connection that finished its handshake
    #[error("connection is not ready (state: {0:?})")]
    NotReady(ConnectionState),

    /// Address does not fit the 16-bit memory command field
    #[error("{space} address 0x{address:X} out of range")]
    AddressOutOfRange {
        /// Memory space
        space: MemorySpace,
        /// Offending address
        address: u32,
    },

    /// Read-back differs from what was written
    #[error("verify failed in {space} space at 0x{address:04X}: expected 0x{expected:02X}, found 0x{found:02X}")]
    VerifyFailed {
        /// Memory space
        space: MemorySpace,
        /// Address of the first difference
        address: u32,
        /// Byte written
        expected: u8,
        /// Byte read back
        found: u8,
    },

    /// Failed to open the USB device
    #[error("failed to open programmer: {0}")]
    OpenFailed(String),

    /// Failed to claim the USB interface
    #[error("failed to claim interface: {0}")]
    ClaimFailed(String),

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),

    /// Image or configuration error
    #[error(transparent)]
    Core(#[from] nuflash_core::Error),
}
