//! USB backend
//!
//! Nu-Link programmers enumerate as HID devices. Frames are exchanged over
//! one interrupt OUT and one interrupt IN endpoint on interface 0, so the
//! kernel HID driver is detached before the interface is claimed.

use std::fmt;
use std::time::Duration;

use nusb::transfer::{Buffer, In, Interrupt, Out};
use nusb::{DeviceInfo, Endpoint, MaybeFuture};
use nuflash_core::target::TargetDefinition;

use crate::connection::Connection;
use crate::error::{NulinkError, Result};
use crate::framer::FrameFormat;
use crate::session::Session;
use crate::transport::Transport;

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// A supported programmer model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammerModel {
    /// Display name
    pub name: &'static str,
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Frame layout
    pub format: FrameFormat,
    /// Interrupt OUT endpoint
    pub out_endpoint: u8,
    /// Interrupt IN endpoint
    pub in_endpoint: u8,
}

/// Supported programmers
pub static PROGRAMMERS: &[ProgrammerModel] = &[
    ProgrammerModel {
        name: "Nu-Link-Me",
        vendor_id: 0x0416,
        product_id: 0x511c,
        format: FrameFormat::V1,
        out_endpoint: 0x04,
        in_endpoint: 0x83,
    },
    ProgrammerModel {
        name: "Nu-Link-Me (UART)",
        vendor_id: 0x0416,
        product_id: 0x511d,
        format: FrameFormat::V1,
        out_endpoint: 0x04,
        in_endpoint: 0x83,
    },
];

fn model_for(vendor_id: u16, product_id: u16) -> Option<&'static ProgrammerModel> {
    PROGRAMMERS
        .iter()
        .find(|m| m.vendor_id == vendor_id && m.product_id == product_id)
}

/// An attached programmer that has not been opened yet
#[derive(Debug, Clone)]
pub struct Programmer {
    info: DeviceInfo,
    model: &'static ProgrammerModel,
}

impl Programmer {
    /// Programmer model
    pub fn model(&self) -> &'static ProgrammerModel {
        self.model
    }

    /// USB bus number
    pub fn bus(&self) -> u8 {
        self.info.busnum()
    }

    /// USB device address
    pub fn address(&self) -> u8 {
        self.info.device_address()
    }

    /// Open the programmer and claim its interface
    pub fn open(&self) -> Result<Session<UsbTransport>> {
        log::debug!("Opening {} at {}", self.model.name, self);

        let device = self
            .info
            .open()
            .wait()
            .map_err(|e| NulinkError::OpenFailed(e.to_string()))?;

        let interface = device
            .detach_and_claim_interface(0)
            .wait()
            .map_err(|e| NulinkError::ClaimFailed(e.to_string()))?;

        let out_ep = interface
            .endpoint::<Interrupt, Out>(self.model.out_endpoint)
            .map_err(|e| NulinkError::ClaimFailed(e.to_string()))?;
        let in_ep = interface
            .endpoint::<Interrupt, In>(self.model.in_endpoint)
            .map_err(|e| NulinkError::ClaimFailed(e.to_string()))?;

        Ok(Session::new(UsbTransport { out_ep, in_ep }, self.model.format))
    }
}

impl fmt::Display for Programmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus {} address {}", self.bus(), self.address())
    }
}

/// Interrupt endpoint pair of an opened programmer
pub struct UsbTransport {
    out_ep: Endpoint<Interrupt, Out>,
    in_ep: Endpoint<Interrupt, In>,
}

impl Transport for UsbTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut buf = Buffer::new(data.len());
        buf.extend_from_slice(data);

        let completion = self.out_ep.transfer_blocking(buf, TRANSFER_TIMEOUT);
        completion
            .status
            .map_err(|e| NulinkError::TransferFailed(e.to_string()))?;
        Ok(completion.actual_len)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut in_buf = Buffer::new(buf.len());
        in_buf.set_requested_len(buf.len());

        let completion = self.in_ep.transfer_blocking(in_buf, TRANSFER_TIMEOUT);
        let data = completion
            .into_result()
            .map_err(|e| NulinkError::TransferFailed(e.to_string()))?;

        let received = data.len().min(buf.len());
        buf[..received].copy_from_slice(&data[..received]);
        Ok(received)
    }
}

/// All attached programmers of a supported model
pub fn list_programmers() -> Result<Vec<Programmer>> {
    let programmers = nusb::list_devices()
        .wait()
        .map_err(|e| NulinkError::OpenFailed(e.to_string()))?
        .filter_map(|info| {
            model_for(info.vendor_id(), info.product_id()).map(|model| Programmer { info, model })
        })
        .collect();
    Ok(programmers)
}

/// The only attached programmer
pub fn find_single() -> Result<Programmer> {
    select_single(list_programmers()?)
}

/// Exactly one entry of `found`, or why there isn't one
fn select_single<T>(mut found: Vec<T>) -> Result<T> {
    match found.len() {
        0 => Err(NulinkError::NoProgrammer),
        1 => Ok(found.remove(0)),
        n => Err(NulinkError::MultipleProgrammers(n)),
    }
}

/// Open the only attached programmer and connect to `target`
pub fn connect(target: &TargetDefinition) -> Result<Connection<'_, UsbTransport>> {
    let programmer = find_single()?;
    log::info!("Using {} at {}", programmer.model.name, programmer);
    Connection::establish(programmer.open()?, target)
}
