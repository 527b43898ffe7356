//! nuflash-core - Image handling for Nuvoton 8051 flash programming
//!
//! This crate contains everything that does not need a programmer attached:
//!
//! - [`ihex`] - streaming Intel HEX reader/writer
//! - [`target`] - target device catalog and configuration byte codecs
//! - [`image`] - composition of flat flash images from HEX sources
//!
//! # Example
//!
//! ```
//! use nuflash_core::ihex::Reader;
//!
//! let hex = ":01001000AA45\n:00000001FF\n";
//! let mut reader = Reader::new(hex.as_bytes());
//! let block = reader.next_block()?.unwrap();
//! assert_eq!(block.address, 0x0010);
//! assert_eq!(block.data, [0xAA]);
//! assert!(reader.next_block()?.is_none());
//! # Ok::<(), nuflash_core::ihex::HexError>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod ihex;
pub mod image;
pub mod target;

pub use error::{Error, Result};
