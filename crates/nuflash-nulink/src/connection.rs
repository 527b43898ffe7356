//! Connection handshake and flash operations
//!
//! A [`Connection`] owns the session to one programmer with one target
//! attached. It is only handed out after the full handshake succeeded, and
//! it always runs the teardown reset sequence when it goes away, including
//! when a handshake step failed halfway.

use nuflash_core::image::TargetImage;
use nuflash_core::target::TargetDefinition;

use crate::command::{
    ConnectType, FirmwareVersion, MemorySpace, Reset, ResetMode, ResetType, SessionConfig,
    VersionInfo,
};
use crate::error::{NulinkError, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Bytes per memory command when programming or reading flash
pub const CHUNK_SIZE: usize = 32;

/// Handshake progress of a connection
///
/// An enumerated but unopened programmer is a `usb::Programmer`; a
/// connection starts at `Opened`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open
    Opened,
    /// Firmware version accepted
    VersionChecked,
    /// Session configuration sent
    Configured,
    /// Target reset into ICP mode
    ResetForIcp,
    /// Device ID matched the target; flash operations allowed
    IdentityVerified,
    /// Teardown done
    Closed,
}

const HANDSHAKE_RESETS: [Reset; 2] = [
    Reset::new(ResetType::Auto, ConnectType::IcpMode, ResetMode::Ext),
    Reset::new(ResetType::NoneNuLink, ConnectType::IcpMode, ResetMode::Ext),
];

// Lets the target run its firmware again after ICP.
const TEARDOWN_RESETS: [Reset; 3] = [
    Reset::new(ResetType::Auto, ConnectType::IcpMode, ResetMode::Ext),
    Reset::new(ResetType::Auto, ConnectType::Disconnect, ResetMode::Mode1),
    Reset::new(ResetType::NoneNuLink, ConnectType::Disconnect, ResetMode::Ext),
];

/// Progress callbacks for long flash operations
///
/// Every method has an empty default so callers only implement what they
/// display. `*_progress` methods receive the bytes handled since the last
/// call.
pub trait Progress {
    /// Chip erase started
    fn erasing(&mut self) {}

    /// Writing `total` bytes started
    fn writing(&mut self, _total: usize) {}

    /// `bytes` more bytes written
    fn write_progress(&mut self, _bytes: usize) {}

    /// Reading `total` bytes started
    fn reading(&mut self, _total: usize) {}

    /// `bytes` more bytes read
    fn read_progress(&mut self, _bytes: usize) {}

    /// Verifying `total` bytes started
    fn verifying(&mut self, _total: usize) {}

    /// `bytes` more bytes verified
    fn verify_progress(&mut self, _bytes: usize) {}
}

/// A no-op progress reporter
pub struct NoProgress;

impl Progress for NoProgress {}

/// A programmer connected to a verified target
pub struct Connection<'t, T: Transport> {
    session: Session<T>,
    target: &'t TargetDefinition,
    state: ConnectionState,
    version: Option<VersionInfo>,
}

impl<'t, T: Transport> Connection<'t, T> {
    /// Run the handshake on an opened session
    ///
    /// On failure the partially set up connection is dropped, which runs
    /// the teardown sequence before the error is returned.
    pub fn establish(session: Session<T>, target: &'t TargetDefinition) -> Result<Self> {
        let mut conn = Self {
            session,
            target,
            state: ConnectionState::Opened,
            version: None,
        };
        conn.handshake()?;
        Ok(conn)
    }

    fn handshake(&mut self) -> Result<()> {
        let version = self.session.get_version()?;
        if version.firmware < FirmwareVersion::REQUIRED {
            return Err(NulinkError::FirmwareTooOld {
                found: version.firmware,
                required: FirmwareVersion::REQUIRED,
            });
        }
        self.version = Some(version);
        self.state = ConnectionState::VersionChecked;

        self.session
            .set_config(&SessionConfig::for_family(self.target.family))?;
        self.state = ConnectionState::Configured;

        for reset in HANDSHAKE_RESETS {
            self.session.reset(reset)?;
        }
        self.state = ConnectionState::ResetForIcp;

        let found = self.session.check_id()?;
        if found != self.target.device_id {
            return Err(NulinkError::DeviceMismatch {
                target: self.target.name,
                expected: self.target.device_id,
                found,
            });
        }
        self.state = ConnectionState::IdentityVerified;

        log::info!("Connected to {} ({})", self.target.name, found);
        Ok(())
    }

    /// Current handshake state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Programmer version reported during the handshake
    pub fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    /// Target this connection was verified against
    pub fn target(&self) -> &'t TargetDefinition {
        self.target
    }

    /// Reset the target back into normal operation and release it
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        log::debug!("releasing target (state: {:?})", self.state);
        for reset in TEARDOWN_RESETS {
            if let Err(e) = self.session.reset(reset) {
                log::warn!("Reset {:?} during teardown failed: {}", reset.kind, e);
            }
        }
        self.state = ConnectionState::Closed;
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state != ConnectionState::IdentityVerified {
            return Err(NulinkError::NotReady(self.state));
        }
        Ok(())
    }

    /// Erase program memory and configuration
    pub fn erase_chip(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.session.erase_flash_chip()
    }

    /// Write `data` in [`CHUNK_SIZE`] pieces starting at `address`
    pub fn write_memory_chunked<P: Progress + ?Sized>(
        &mut self,
        space: MemorySpace,
        address: u32,
        data: &[u8],
        progress: &mut P,
    ) -> Result<()> {
        self.ensure_ready()?;
        check_range(space, address, data.len())?;

        for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            let chunk_address = (address as usize + i * CHUNK_SIZE) as u16;
            self.session.write_memory(space, chunk_address, chunk)?;
            progress.write_progress(chunk.len());
        }
        Ok(())
    }

    /// Fill `buf` from [`CHUNK_SIZE`] reads starting at `address`
    pub fn read_memory_chunked<P: Progress + ?Sized>(
        &mut self,
        space: MemorySpace,
        address: u32,
        buf: &mut [u8],
        progress: &mut P,
    ) -> Result<()> {
        self.ensure_ready()?;
        check_range(space, address, buf.len())?;

        for (i, chunk) in buf.chunks_mut(CHUNK_SIZE).enumerate() {
            let chunk_address = (address as usize + i * CHUNK_SIZE) as u16;
            let data = self.session.read_memory(space, chunk_address, chunk.len())?;
            chunk.copy_from_slice(&data);
            progress.read_progress(chunk.len());
        }
        Ok(())
    }

    fn check_image(&self, image: &TargetImage<'_>) -> Result<()> {
        if image.target() != self.target {
            return Err(nuflash_core::Error::Usage(format!(
                "image is for {}, connected to {}",
                image.target(),
                self.target
            ))
            .into());
        }
        Ok(())
    }

    /// Erase the chip and write configuration, APROM and LDROM
    pub fn program_image<P: Progress + ?Sized>(
        &mut self,
        image: &TargetImage<'_>,
        progress: &mut P,
    ) -> Result<()> {
        self.ensure_ready()?;
        self.check_image(image)?;

        let aprom = image.aprom()?;
        let ldrom = image.ldrom()?;

        progress.erasing();
        self.erase_chip()?;

        progress.writing(aprom.len() + ldrom.len());

        if !image.config().is_empty() {
            let config = padded_config(self.target, image.config());
            log::debug!("writing configuration {:02X?}", config);
            self.write_memory_chunked(MemorySpace::Config, 0, &config, &mut NoProgress)?;
        }

        self.write_memory_chunked(MemorySpace::Program, 0, aprom, progress)?;
        self.write_memory_chunked(
            MemorySpace::Program,
            self.target.loader_offset,
            ldrom,
            progress,
        )?;

        log::info!(
            "Programmed {} bytes APROM, {} bytes LDROM",
            aprom.len(),
            ldrom.len()
        );
        Ok(())
    }

    /// Read configuration, APROM and LDROM back into an image
    pub fn read_image<P: Progress + ?Sized>(&mut self, progress: &mut P) -> Result<TargetImage<'t>> {
        self.ensure_ready()?;

        let mut image = TargetImage::new(self.target);
        let read_size = self.target.config.read_size;
        if read_size != 0 {
            let mut config = vec![0u8; read_size];
            self.read_memory_chunked(MemorySpace::Config, 0, &mut config, &mut NoProgress)?;
            log::debug!("configuration {:02X?}", config);
            image.set_config(config);
        }

        let loader_offset = self.target.loader_offset;
        let (aprom, ldrom) = image.regions_mut()?;
        progress.reading(aprom.len() + ldrom.len());
        self.read_memory_chunked(MemorySpace::Program, 0, aprom, progress)?;
        self.read_memory_chunked(MemorySpace::Program, loader_offset, ldrom, progress)?;

        Ok(image)
    }

    /// Compare configuration, APROM and LDROM on the chip with `image`
    pub fn verify_image<P: Progress + ?Sized>(
        &mut self,
        image: &TargetImage<'_>,
        progress: &mut P,
    ) -> Result<()> {
        self.ensure_ready()?;
        self.check_image(image)?;

        if !image.config().is_empty() {
            let expected = padded_config(self.target, image.config());
            let len = self.target.config.min_size;
            let mut found = vec![0u8; len];
            self.read_memory_chunked(MemorySpace::Config, 0, &mut found, &mut NoProgress)?;
            compare(MemorySpace::Config, 0, &expected[..len], &found)?;
        }

        let aprom = image.aprom()?;
        let ldrom = image.ldrom()?;
        progress.verifying(aprom.len() + ldrom.len());

        let regions = [(0, aprom), (self.target.loader_offset, ldrom)];
        for (address, expected) in regions {
            for (i, chunk) in expected.chunks(CHUNK_SIZE).enumerate() {
                let chunk_address = address + (i * CHUNK_SIZE) as u32;
                let mut found = vec![0u8; chunk.len()];
                self.read_memory_chunked(
                    MemorySpace::Program,
                    chunk_address,
                    &mut found,
                    &mut NoProgress,
                )?;
                compare(MemorySpace::Program, chunk_address, chunk, &found)?;
                progress.verify_progress(chunk.len());
            }
        }

        log::info!("Verified {} bytes", aprom.len() + ldrom.len());
        Ok(())
    }
}

impl<T: Transport> Drop for Connection<'_, T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn check_range(space: MemorySpace, address: u32, len: usize) -> Result<()> {
    if len > 0 && address as usize + len > 0x1_0000 {
        return Err(NulinkError::AddressOutOfRange { space, address });
    }
    Ok(())
}

/// Configuration bytes as written: padded with 0xFF to the write size
fn padded_config(target: &TargetDefinition, config: &[u8]) -> Vec<u8> {
    let write_size = target.config.write_size;
    let mut bytes = config.to_vec();
    bytes.resize(write_size, 0xFF);
    bytes
}

fn compare(space: MemorySpace, address: u32, expected: &[u8], found: &[u8]) -> Result<()> {
    match expected.iter().zip(found).position(|(a, b)| a != b) {
        Some(i) => Err(NulinkError::VerifyFailed {
            space,
            address: address + i as u32,
            expected: expected[i],
            found: found[i],
        }),
        None => Ok(()),
    }
}
