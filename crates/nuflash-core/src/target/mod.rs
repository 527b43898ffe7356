//! Target device catalog and configuration byte codecs
//!
//! A [`TargetDefinition`] describes one microcontroller: the identifiers the
//! programmer reports, the size of its program memory, where the loader
//! region lives from the programmer's point of view, and how its
//! configuration space is laid out. The configuration bytes themselves are
//! decoded into a [`TargetConfig`], which is the only place that knows how
//! large the loader region is.

mod n76e003;
mod registry;

pub use n76e003::{BodVoltage, BootSelect, LdromSize, N76E003Config, WdtMode, N76E003};
pub use registry::TargetRegistry;

use std::fmt;

use crate::error::{Error, Result};

/// Chip family code sent in the session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipFamily(pub u32);

impl ChipFamily {
    /// N76E003 series
    pub const N76E003: Self = Self(0x0000_0800);
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Device ID reported by the check-id command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// N76E003
    pub const N76E003: Self = Self(0x00DA_3650);
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Which codec interprets a target's configuration bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// CONFIG0..CONFIG3 of the N76E003
    N76E003,
}

/// Decoded configuration bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfig {
    /// N76E003 configuration
    N76E003(N76E003Config),
}

impl TargetConfig {
    /// Size of the loader region (LDROM) selected by this configuration
    pub fn loader_region_size(&self) -> usize {
        match self {
            TargetConfig::N76E003(cfg) => cfg.ldrom_size.bytes(),
        }
    }

    /// Canonical byte form of this configuration
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            TargetConfig::N76E003(cfg) => cfg.encode(),
        }
    }

    /// Codec this configuration belongs to
    pub fn format(&self) -> ConfigFormat {
        match self {
            TargetConfig::N76E003(_) => ConfigFormat::N76E003,
        }
    }
}

/// Layout of a target's configuration space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSpace {
    /// Address at which Intel HEX files store the configuration bytes
    pub hex_offset: u32,
    /// Fewest bytes that still decode
    pub min_size: usize,
    /// Bytes to request when reading the configuration from a device
    pub read_size: usize,
    /// Bytes to send when writing (shorter data is padded with 0xFF)
    pub write_size: usize,
    /// Codec for the bytes
    pub format: ConfigFormat,
}

impl ConfigSpace {
    /// Decode configuration bytes
    pub fn decode(&self, bytes: &[u8]) -> Result<TargetConfig> {
        if bytes.len() < self.min_size {
            return Err(Error::ConfigTooShort {
                len: bytes.len(),
                min: self.min_size,
            });
        }
        match self.format {
            ConfigFormat::N76E003 => Ok(TargetConfig::N76E003(N76E003Config::decode(bytes)?)),
        }
    }

    /// Encode a configuration that belongs to this space
    pub fn encode(&self, config: &TargetConfig) -> Result<Vec<u8>> {
        if config.format() != self.format {
            return Err(Error::InvalidConfig(format!(
                "{:?} configuration does not fit a {:?} configuration space",
                config.format(),
                self.format
            )));
        }
        config.encode()
    }

    /// Parse configuration bytes given as a hex string, e.g. `7FFBFFFF`
    ///
    /// The byte count must be between the minimum and the write size.
    pub fn parse_hex(&self, text: &str) -> Result<Vec<u8>> {
        let text = text.trim();
        if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidConfig(format!("'{}' is not a hex string", text)));
        }
        if text.len() % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "'{}' has an odd number of hex digits",
                text
            )));
        }

        let bytes = text
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
            .collect::<Vec<u8>>();

        if bytes.len() < self.min_size {
            return Err(Error::ConfigTooShort {
                len: bytes.len(),
                min: self.min_size,
            });
        }
        if bytes.len() > self.write_size {
            return Err(Error::ConfigTooLong {
                len: bytes.len(),
                max: self.write_size,
            });
        }
        Ok(bytes)
    }

    /// Parse a TOML configuration document
    ///
    /// A document given as a single inline table (`{ locked = true }`) is
    /// accepted too.
    pub fn parse_document(&self, text: &str) -> Result<TargetConfig> {
        let text = text.trim();
        let invalid = |e: toml::de::Error| Error::InvalidConfig(e.to_string());
        match self.format {
            ConfigFormat::N76E003 => {
                let config = if text.starts_with('{') {
                    toml::from_str::<InlineDocument<N76E003Config>>(&format!("config = {}", text))
                        .map(|doc| doc.config)
                } else {
                    toml::from_str::<N76E003Config>(text)
                };
                config.map(TargetConfig::N76E003).map_err(invalid)
            }
        }
    }

    /// Render a configuration as a TOML document
    pub fn render_document(&self, config: &TargetConfig) -> Result<String> {
        let rendered = match config {
            TargetConfig::N76E003(cfg) => toml::to_string_pretty(cfg),
        };
        rendered.map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct InlineDocument<T> {
    config: T,
}

// Caller guarantees an ASCII hex digit
fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

/// A supported target device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDefinition {
    /// Device name, matched case-insensitively
    pub name: &'static str,
    /// Chip family
    pub family: ChipFamily,
    /// Expected device ID
    pub device_id: DeviceId,
    /// Program memory size in bytes (APROM and LDROM together)
    pub program_memory_size: usize,
    /// Programmer address of the LDROM when it is enabled
    pub loader_offset: u32,
    /// Configuration space layout
    pub config: ConfigSpace,
}

impl fmt::Display for TargetDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
