//! Nu-Link command protocol
//!
//! Request bodies start with a 32-bit little-endian command code followed by
//! fixed little-endian fields. Most responses echo the command code; reads
//! return raw data and get-version returns its record directly.

use std::fmt;

use bitflags::bitflags;
use nuflash_core::target::{ChipFamily, DeviceId};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{NulinkError, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandCode {
    /// Write memory
    WriteMemory = 0xA0,
    /// Read memory
    ReadMemory = 0xA1,
    /// Set session configuration
    SetConfig = 0xA2,
    /// Read the target device ID
    CheckId = 0xA3,
    /// Erase the whole flash
    EraseFlashChip = 0xA4,
    /// Reset the target
    Reset = 0xE2,
    /// Query programmer version (body is all 0xFF)
    GetVersion = 0xFF,
}

/// Programmer firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion(pub u32);

impl FirmwareVersion {
    /// Oldest firmware speaking this protocol
    pub const REQUIRED: Self = Self(6069);
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Programmer product ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductId(pub u32);

impl ProductId {
    /// Nu-Link-Me
    pub const NU_LINK_ME: Self = Self(0x0055_0501);
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NU_LINK_ME => f.write_str("Nu-Link-Me"),
            Self(id) => write!(f, "0x{:08X}", id),
        }
    }
}

bitflags! {
    /// Capability flags from get-version
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VersionFlags: u32 {
        /// Nu-Link Pro (reports voltages)
        const NULINK_PRO = 0x0000_0001;
    }
}

/// get-version response
#[repr(C)]
#[derive(FromBytes, KnownLayout, Immutable)]
struct VersionRecord {
    firmware: U32,
    product: U32,
    flags: U32,
    target_voltage: U16,
    usb_voltage: U16,
}

/// Decoded get-version response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Firmware version
    pub firmware: FirmwareVersion,
    /// Product ID
    pub product: ProductId,
    /// Capability flags
    pub flags: VersionFlags,
    /// Target voltage in millivolts (Nu-Link Pro only)
    pub target_voltage_mv: u16,
    /// USB voltage in millivolts (Nu-Link Pro only)
    pub usb_voltage_mv: u16,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>16} - Firmware Version {}", self.product, self.firmware)?;
        if self.flags.contains(VersionFlags::NULINK_PRO) {
            write!(
                f,
                " (target voltage {}.{:03} V, USB voltage {}.{:03} V)",
                self.target_voltage_mv / 1000,
                self.target_voltage_mv % 1000,
                self.usb_voltage_mv / 1000,
                self.usb_voltage_mv % 1000
            )?;
        }
        Ok(())
    }
}

/// Session configuration sent before talking to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// ICP clock in kHz
    pub clock_khz: u32,
    /// Target chip family
    pub chip_family: ChipFamily,
    /// Target supply in millivolts
    pub voltage_mv: u32,
    /// Whether the programmer powers the target
    pub power_target: u32,
    /// USB function enable mask
    pub usb_func: u32,
}

impl SessionConfig {
    /// Settings used for every target: 1 MHz, 3.3 V, target self-powered
    pub fn for_family(chip_family: ChipFamily) -> Self {
        Self {
            clock_khz: 1000,
            chip_family,
            voltage_mv: 3300,
            power_target: 0,
            usb_func: 0,
        }
    }
}

#[repr(C)]
#[derive(IntoBytes, KnownLayout, Immutable)]
struct SessionConfigFields {
    clock: U32,
    chip_family: U32,
    voltage: U32,
    power_target: U32,
    usb_func: U32,
}

/// Reset type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResetType {
    /// Programmer picks the method
    Auto = 0,
    /// Hardware reset line
    Hw = 1,
    /// SYSRESETREQ
    SysResetReq = 2,
    /// VECTRESET
    VecReset = 3,
    /// Fast rescue
    FastRescue = 4,
    /// No reset (Nu-Link)
    NoneNuLink = 5,
    /// No reset (1T 8051 only)
    None2 = 6,
}

/// How the programmer connects after the reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ConnectType {
    /// Normal
    Normal = 0,
    /// Connect before reset
    PreReset = 1,
    /// Connect while held in reset
    UnderReset = 2,
    /// Do not connect
    None = 3,
    /// Disconnect
    Disconnect = 4,
    /// In-circuit programming mode
    IcpMode = 5,
}

/// Reset mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResetMode {
    /// External mode
    Ext = 0,
    /// Mode 1, used when disconnecting
    Mode1 = 1,
}

/// A reset request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reset {
    /// Reset type
    pub kind: ResetType,
    /// Connection after reset
    pub connection: ConnectType,
    /// Mode
    pub mode: ResetMode,
}

impl Reset {
    /// Reset request
    pub const fn new(kind: ResetType, connection: ConnectType, mode: ResetMode) -> Self {
        Self {
            kind,
            connection,
            mode,
        }
    }
}

#[repr(C)]
#[derive(IntoBytes, KnownLayout, Immutable)]
struct ResetFields {
    kind: U32,
    connection: U32,
    mode: U32,
}

/// Memory space selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MemorySpace {
    /// APROM and LDROM
    Program = 0x0000,
    /// Configuration bytes
    Config = 0x0003,
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemorySpace::Program => "program",
            MemorySpace::Config => "config",
        })
    }
}

#[repr(C)]
#[derive(IntoBytes, KnownLayout, Immutable)]
struct MemoryFields {
    address: U16,
    space: U16,
    length: U32,
}

/// Length of a write-memory request before its data
pub const WRITE_HEADER_LEN: usize = 4 + std::mem::size_of::<MemoryFields>();

fn command<T: IntoBytes + Immutable>(code: CommandCode, fields: &T) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + std::mem::size_of_val(fields));
    body.extend_from_slice(&(code as u32).to_le_bytes());
    body.extend_from_slice(fields.as_bytes());
    body
}

fn check_echo(code: CommandCode, response: &[u8]) -> Result<()> {
    let word = response
        .get(..4)
        .ok_or(NulinkError::ResponseTooShort {
            len: response.len(),
            need: 4,
        })?;
    let found = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    if found != code as u32 {
        return Err(NulinkError::ResponseMismatch {
            expected: code as u32,
            found,
        });
    }
    Ok(())
}

impl<T: Transport> Session<T> {
    /// Query firmware version and product
    pub fn get_version(&mut self) -> Result<VersionInfo> {
        let request = vec![0xFF; self.max_body_len()];
        let response = self.request(&request)?;

        let (record, _) =
            VersionRecord::read_from_prefix(&response).map_err(|_| NulinkError::ResponseTooShort {
                len: response.len(),
                need: std::mem::size_of::<VersionRecord>(),
            })?;

        let info = VersionInfo {
            firmware: FirmwareVersion(record.firmware.get()),
            product: ProductId(record.product.get()),
            flags: VersionFlags::from_bits_retain(record.flags.get()),
            target_voltage_mv: record.target_voltage.get(),
            usb_voltage_mv: record.usb_voltage.get(),
        };
        log::debug!("programmer version: {}", info);
        Ok(info)
    }

    /// Send the session configuration
    pub fn set_config(&mut self, config: &SessionConfig) -> Result<()> {
        log::debug!("setting session config {:?}", config);
        let fields = SessionConfigFields {
            clock: U32::new(config.clock_khz),
            chip_family: U32::new(config.chip_family.0),
            voltage: U32::new(config.voltage_mv),
            power_target: U32::new(config.power_target),
            usb_func: U32::new(config.usb_func),
        };
        let response = self.request(&command(CommandCode::SetConfig, &fields))?;
        check_echo(CommandCode::SetConfig, &response)
    }

    /// Reset the target
    pub fn reset(&mut self, reset: Reset) -> Result<()> {
        log::debug!(
            "reset {:?}, connect {:?}, mode {:?}",
            reset.kind,
            reset.connection,
            reset.mode
        );
        let fields = ResetFields {
            kind: U32::new(reset.kind as u32),
            connection: U32::new(reset.connection as u32),
            mode: U32::new(reset.mode as u32),
        };
        let response = self.request(&command(CommandCode::Reset, &fields))?;
        check_echo(CommandCode::Reset, &response)
    }

    /// Read the target's device ID
    pub fn check_id(&mut self) -> Result<DeviceId> {
        let response = self.request(&command(CommandCode::CheckId, &U32::new(0)))?;
        check_echo(CommandCode::CheckId, &response)?;

        let id = response
            .get(4..8)
            .ok_or(NulinkError::ResponseTooShort {
                len: response.len(),
                need: 8,
            })?;
        let id = DeviceId(u32::from_le_bytes([id[0], id[1], id[2], id[3]]));
        log::debug!("device ID {}", id);
        Ok(id)
    }

    /// Read `len` bytes from `space` at `address`
    pub fn read_memory(&mut self, space: MemorySpace, address: u16, len: usize) -> Result<Vec<u8>> {
        log::trace!("reading {} bytes from {} 0x{:04X}", len, space, address);
        let fields = MemoryFields {
            address: U16::new(address),
            space: U16::new(space as u16),
            length: U32::new(len as u32),
        };
        let mut response = self.request(&command(CommandCode::ReadMemory, &fields))?;
        if response.len() < len {
            return Err(NulinkError::ResponseTooShort {
                len: response.len(),
                need: len,
            });
        }
        response.truncate(len);
        Ok(response)
    }

    /// Write `data` to `space` at `address`
    pub fn write_memory(&mut self, space: MemorySpace, address: u16, data: &[u8]) -> Result<()> {
        log::trace!(
            "writing {} bytes to {} 0x{:04X}: {:02X?}",
            data.len(),
            space,
            address,
            data
        );
        let fields = MemoryFields {
            address: U16::new(address),
            space: U16::new(space as u16),
            length: U32::new(data.len() as u32),
        };
        let mut body = command(CommandCode::WriteMemory, &fields);
        body.extend_from_slice(data);
        let response = self.request(&body)?;
        check_echo(CommandCode::WriteMemory, &response)
    }

    /// Erase APROM, LDROM and configuration
    pub fn erase_flash_chip(&mut self) -> Result<()> {
        log::debug!("erasing flash");
        let response = self.request(&(CommandCode::EraseFlashChip as u32).to_le_bytes())?;
        check_echo(CommandCode::EraseFlashChip, &response)
    }
}
