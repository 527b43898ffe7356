//! nuflash-nulink - Nuvoton Nu-Link programmer support
//!
//! The protocol is layered bottom-up:
//!
//! - [`transport`] moves fixed-size frames (USB interrupt endpoints in
//!   [`usb`], scripted transports in tests)
//! - [`framer`] packs a sequence number and body into a frame
//! - [`session`] numbers requests and skips stale responses
//! - [`command`] encodes the individual programmer commands
//! - [`connection`] runs the ICP handshake and the flash operations, and
//!   always releases the target again
//!
//! # Devices
//!
//! - **Nu-Link-Me** (0416:511C, 0416:511D): 64-byte frames on endpoints
//!   0x04/0x83
//!
//! # Example
//!
//! ```no_run
//! use nuflash_core::target::N76E003;
//! use nuflash_nulink::{usb, NoProgress};
//!
//! let mut conn = usb::connect(&N76E003)?;
//! let image = conn.read_image(&mut NoProgress)?;
//! println!("{} bytes of program memory", image.memory().len());
//! conn.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod command;
pub mod connection;
pub mod error;
pub mod framer;
pub mod session;
pub mod transport;
#[cfg(feature = "usb")]
pub mod usb;

#[cfg(test)]
mod mock;

pub use command::{FirmwareVersion, MemorySpace, ProductId, VersionInfo};
pub use connection::{Connection, ConnectionState, NoProgress, Progress};
pub use error::{NulinkError, Result};
pub use framer::{FrameFormat, Framer};
pub use session::Session;
pub use transport::Transport;
