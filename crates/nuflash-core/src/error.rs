//! Error types for nuflash-core

use thiserror::Error;

use crate::ihex::HexError;
use crate::image::SourceKind;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed Intel HEX input
    #[error("Intel HEX error: {0}")]
    Hex(#[from] HexError),

    /// A HEX block does not fit the region it was loaded into
    #[error("block 0x{address:08X}+{len} out of range for {kind}")]
    OutOfRange {
        /// Absolute block address
        address: u32,
        /// Block length in bytes
        len: usize,
        /// Which input the block came from
        kind: SourceKind,
    },

    /// Configuration bytes shorter than the target requires
    #[error("configuration too short: {len} bytes, need at least {min}")]
    ConfigTooShort {
        /// Length supplied
        len: usize,
        /// Minimum length for the target
        min: usize,
    },

    /// Configuration bytes longer than the target can take
    #[error("configuration too long: {len} bytes, at most {max} allowed")]
    ConfigTooLong {
        /// Length supplied
        len: usize,
        /// Maximum length for the target
        max: usize,
    },

    /// No configuration bytes were found in any input
    #[error("no configuration bytes available")]
    NoConfig,

    /// Configuration argument or document could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inconsistent combination of inputs
    #[error("{0}")]
    Usage(String),

    /// Unknown target name
    #[error("target device '{0}' not found")]
    UnknownTarget(String),

    /// Two targets share a name or ID in a registry
    #[error("duplicate target definition: {0}")]
    DuplicateTarget(String),

    /// Internal consistency check failed; this is a defect, not bad input
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// I/O error on an image source or sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error indicates a bug rather than bad input
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
