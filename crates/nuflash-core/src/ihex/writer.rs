//! Block stream to record stream

use std::io::{self, Write};

use super::{write_record, Block, Record};

/// Maximum payload of data records produced by [`Writer`]
pub const RECORD_DATA_LEN: usize = 32;

/// Encodes absolute-address data as Intel HEX
///
/// Data records never straddle a [`RECORD_DATA_LEN`] boundary once the first
/// aligned address is reached, so they never straddle a 64 KiB segment
/// either. An extended linear address record is written whenever a record
/// falls outside the current segment. The end-of-file record is only written
/// by [`Writer::finish`].
pub struct Writer<W: Write> {
    inner: W,
    base: u32,
}

impl<W: Write> Writer<W> {
    /// Wrap a byte sink; the initial base address is 0
    pub fn new(inner: W) -> Self {
        Self { inner, base: 0 }
    }

    fn emit(&mut self, address: u32, data: &[u8]) -> io::Result<()> {
        if address.wrapping_sub(self.base) > 0xFFFF {
            self.base = address & 0xFFFF_0000;
            write_record(
                &mut self.inner,
                &Record::extended_linear_address((self.base >> 16) as u16),
            )?;
        }
        write_record(&mut self.inner, &Record::data(address as u16, data))
    }

    /// Write `data` starting at absolute address `address`
    pub fn write(&mut self, address: u32, data: &[u8]) -> io::Result<()> {
        let mut address = address;
        let mut data = data;

        let misalign = address as usize % RECORD_DATA_LEN;
        if misalign != 0 {
            let lead = RECORD_DATA_LEN - misalign;
            if data.len() > lead {
                let (head, rest) = data.split_at(lead);
                self.emit(address, head)?;
                address = address.wrapping_add(lead as u32);
                data = rest;
            }
        }

        while data.len() > RECORD_DATA_LEN {
            let (head, rest) = data.split_at(RECORD_DATA_LEN);
            self.emit(address, head)?;
            address = address.wrapping_add(RECORD_DATA_LEN as u32);
            data = rest;
        }

        if !data.is_empty() {
            self.emit(address, data)?;
        }
        Ok(())
    }

    /// Write a decoded block
    pub fn write_block(&mut self, block: &Block) -> io::Result<()> {
        self.write(block.address, &block.data)
    }

    /// Emit the end-of-file record, flush, and return the sink
    pub fn finish(mut self) -> io::Result<W> {
        write_record(&mut self.inner, &Record::end_of_file())?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
