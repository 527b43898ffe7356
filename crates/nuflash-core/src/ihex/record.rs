//! Single-record encoding and decoding

use std::io::{self, BufRead, Write};

use super::{HexError, Record, RecordKind};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Look at the next byte without consuming it, `None` at end of input
fn peek_byte<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(buf.first().copied()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Pull one byte from a buffered reader, `None` at end of input
fn next_byte<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    let byte = peek_byte(reader)?;
    if byte.is_some() {
        reader.consume(1);
    }
    Ok(byte)
}

fn nibble(c: u8) -> Result<u8, HexError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(HexError::InvalidHexDigit(c)),
    }
}

/// Reads hex pairs while keeping the running record sum
struct FieldReader<'r, R: ?Sized> {
    reader: &'r mut R,
    sum: u8,
}

impl<R: BufRead + ?Sized> FieldReader<'_, R> {
    fn char(&mut self) -> Result<u8, HexError> {
        next_byte(&mut *self.reader)?.ok_or(HexError::UnexpectedEof)
    }

    fn raw_byte(&mut self) -> Result<u8, HexError> {
        let hi = self.char()?;
        let lo = self.char()?;
        Ok(nibble(hi)? << 4 | nibble(lo)?)
    }

    fn byte(&mut self) -> Result<u8, HexError> {
        let b = self.raw_byte()?;
        self.sum = self.sum.wrapping_add(b);
        Ok(b)
    }

    fn word(&mut self) -> Result<u16, HexError> {
        let hi = self.byte()?;
        let lo = self.byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }
}

/// Decode the next record from `reader`
///
/// Leading CR/LF characters are skipped. Returns `Ok(None)` if the input ends
/// before another record starts.
pub fn read_record<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<Record>, HexError> {
    loop {
        match next_byte(reader)? {
            None => return Ok(None),
            Some(b'\r' | b'\n') => continue,
            Some(b':') => break,
            Some(other) => return Err(HexError::InvalidPrefix(other)),
        }
    }

    let mut fields = FieldReader { reader, sum: 0 };
    let len = fields.byte()?;
    let address = fields.word()?;
    let kind_byte = fields.byte()?;

    let mut data = Vec::with_capacity(len as usize);
    for _ in 0..len {
        data.push(fields.byte()?);
    }

    let computed = fields.sum.wrapping_neg();
    let found = fields.raw_byte()?;
    if computed != found {
        return Err(HexError::ChecksumMismatch { computed, found });
    }

    // At most one line ending byte belongs to this record
    let reader = fields.reader;
    match peek_byte(reader)? {
        None => {}
        Some(b'\r' | b'\n') => reader.consume(1),
        Some(other) => return Err(HexError::InvalidTerminator(other)),
    }

    let kind = RecordKind::from_byte(kind_byte).ok_or(HexError::InvalidRecordType(kind_byte))?;

    Ok(Some(Record {
        kind,
        address,
        data,
    }))
}

fn push_hex(line: &mut Vec<u8>, b: u8) {
    line.push(HEX_DIGITS[(b >> 4) as usize]);
    line.push(HEX_DIGITS[(b & 0x0F) as usize]);
}

/// Encode `record` as one line (terminated by `\n`)
pub fn write_record<W: Write + ?Sized>(writer: &mut W, record: &Record) -> io::Result<()> {
    if record.data.len() > u8::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("record payload of {} bytes exceeds 255", record.data.len()),
        ));
    }

    // ':' + len + address + type + checksum + '\n' = 12 chars of overhead
    let mut line = Vec::with_capacity(12 + 2 * record.data.len());
    line.push(b':');
    push_hex(&mut line, record.data.len() as u8);
    let [hi, lo] = record.address.to_be_bytes();
    push_hex(&mut line, hi);
    push_hex(&mut line, lo);
    push_hex(&mut line, record.kind as u8);
    for &b in &record.data {
        push_hex(&mut line, b);
    }
    push_hex(&mut line, record.checksum());
    line.push(b'\n');

    writer.write_all(&line)
}
