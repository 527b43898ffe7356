//! Test transports

use std::collections::VecDeque;

use crate::command::{ConnectType, Reset, ResetMode, ResetType};
use crate::error::{NulinkError, Result};
use crate::framer::{Framer, V1Framer};
use crate::transport::Transport;

/// Replays canned frames and records everything written
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub written: Vec<Vec<u8>>,
    pub reads: VecDeque<Vec<u8>>,
    pub write_limit: Option<usize>,
}

impl ScriptedTransport {
    pub fn push_read(&mut self, frame: Vec<u8>) {
        self.reads.push_back(frame);
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.written.push(data.to_vec());
        Ok(self.write_limit.map_or(data.len(), |limit| limit.min(data.len())))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame = self
            .reads
            .pop_front()
            .ok_or_else(|| NulinkError::TransferFailed("no scripted response".into()))?;
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }
}

/// Emulates a Nu-Link with an N76E003 attached, speaking V1 frames
pub struct MockNulink {
    pub firmware: u32,
    pub product: u32,
    pub device_id: u32,
    pub program: Vec<u8>,
    pub config: [u8; 32],
    pub resets: Vec<Reset>,
    pub commands: Vec<u32>,
    /// Answer this command code with a wrong echo
    pub fail_command: Option<u32>,
    /// Flip one byte of program memory on every read at this address
    pub corrupt_read_at: Option<u16>,
    pub pending: VecDeque<Vec<u8>>,
}

impl Default for MockNulink {
    fn default() -> Self {
        Self {
            firmware: 7010,
            product: 0x0055_0501,
            device_id: 0x00DA_3650,
            program: vec![0xFF; 0x1_0000],
            config: [0xFF; 32],
            resets: Vec::new(),
            commands: Vec::new(),
            fail_command: None,
            corrupt_read_at: None,
            pending: VecDeque::new(),
        }
    }
}

fn word(body: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]])
}

fn reset_type(raw: u32) -> ResetType {
    match raw {
        0 => ResetType::Auto,
        1 => ResetType::Hw,
        2 => ResetType::SysResetReq,
        3 => ResetType::VecReset,
        4 => ResetType::FastRescue,
        5 => ResetType::NoneNuLink,
        _ => ResetType::None2,
    }
}

fn connect_type(raw: u32) -> ConnectType {
    match raw {
        0 => ConnectType::Normal,
        1 => ConnectType::PreReset,
        2 => ConnectType::UnderReset,
        3 => ConnectType::None,
        4 => ConnectType::Disconnect,
        _ => ConnectType::IcpMode,
    }
}

impl MockNulink {
    fn respond(&mut self, body: &[u8]) -> Vec<u8> {
        let code = if body.iter().all(|&b| b == 0xFF) {
            0xFF
        } else {
            word(body, 0)
        };
        self.commands.push(code);

        let mut response = match code {
            0xFF => {
                let mut r = Vec::new();
                r.extend_from_slice(&self.firmware.to_le_bytes());
                r.extend_from_slice(&self.product.to_le_bytes());
                r.extend_from_slice(&0u32.to_le_bytes());
                r.extend_from_slice(&[0; 4]);
                r
            }
            0xA0 => {
                let address = u16::from_le_bytes([body[4], body[5]]) as usize;
                let space = u16::from_le_bytes([body[6], body[7]]);
                let len = word(body, 8) as usize;
                let data = &body[12..12 + len];
                let memory: &mut [u8] = if space == 3 {
                    &mut self.config
                } else {
                    &mut self.program
                };
                memory[address..address + len].copy_from_slice(data);
                code.to_le_bytes().to_vec()
            }
            0xA1 => {
                let address = u16::from_le_bytes([body[4], body[5]]);
                let space = u16::from_le_bytes([body[6], body[7]]);
                let len = word(body, 8) as usize;
                let start = address as usize;
                let memory: &[u8] = if space == 3 {
                    &self.config
                } else {
                    &self.program
                };
                let mut data = memory[start..start + len].to_vec();
                if space == 0 && self.corrupt_read_at == Some(address) {
                    data[0] ^= 0x01;
                }
                data
            }
            0xA2 => code.to_le_bytes().to_vec(),
            0xA3 => {
                let mut r = code.to_le_bytes().to_vec();
                r.extend_from_slice(&self.device_id.to_le_bytes());
                r
            }
            0xA4 => {
                self.program.fill(0xFF);
                self.config.fill(0xFF);
                code.to_le_bytes().to_vec()
            }
            0xE2 => {
                self.resets.push(Reset::new(
                    reset_type(word(body, 4)),
                    connect_type(word(body, 8)),
                    if word(body, 12) == 1 {
                        ResetMode::Mode1
                    } else {
                        ResetMode::Ext
                    },
                ));
                code.to_le_bytes().to_vec()
            }
            _ => Vec::new(),
        };

        if self.fail_command == Some(code) {
            response[..4].copy_from_slice(&0xDEADu32.to_le_bytes());
        }
        response
    }
}

impl Transport for MockNulink {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let frame = V1Framer.unframe(data)?;
        let sequence = frame.sequence;
        let body = frame.body.to_vec();
        let response = self.respond(&body);
        self.pending.push_back(V1Framer.frame(sequence, &response)?);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame = self
            .pending
            .pop_front()
            .ok_or_else(|| NulinkError::TransferFailed("no pending response".into()))?;
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }
}
