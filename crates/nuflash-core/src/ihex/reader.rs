//! Record stream to block stream

use std::io::BufRead;

use super::{read_record, Block, HexError, RecordKind};

/// Decodes a HEX stream into absolute-address [`Block`]s
///
/// Address extension records update a running base address which only
/// affects the data records that follow them. The reader stops for good at
/// the end-of-file record, at the end of input, or at the first error.
pub struct Reader<R> {
    inner: R,
    base: u32,
    finished: bool,
}

impl<R: BufRead> Reader<R> {
    /// Wrap a buffered reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            base: 0,
            finished: false,
        }
    }

    /// Return the next data block, or `None` once the stream has ended
    pub fn next_block(&mut self) -> Result<Option<Block>, HexError> {
        if self.finished {
            return Ok(None);
        }

        match self.advance() {
            Ok(Some(block)) => Ok(Some(block)),
            other => {
                self.finished = true;
                other
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Block>, HexError> {
        loop {
            let Some(record) = read_record(&mut self.inner)? else {
                return Ok(None);
            };

            match record.kind {
                RecordKind::Data => {
                    return Ok(Some(Block {
                        address: self.base.wrapping_add(record.address as u32),
                        data: record.data,
                    }));
                }
                RecordKind::EndOfFile => return Ok(None),
                RecordKind::ExtendedSegmentAddress => {
                    let [hi, lo] = extension_payload(record.kind, &record.data)?;
                    self.base = (hi as u32) << 12 | (lo as u32) << 4;
                    log::trace!("ihex: segment base now 0x{:08X}", self.base);
                }
                RecordKind::ExtendedLinearAddress => {
                    let [hi, lo] = extension_payload(record.kind, &record.data)?;
                    self.base = (hi as u32) << 24 | (lo as u32) << 16;
                    log::trace!("ihex: linear base now 0x{:08X}", self.base);
                }
                RecordKind::StartSegmentAddress | RecordKind::StartLinearAddress => {}
            }
        }
    }

    /// Current base address applied to data records
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn extension_payload(kind: RecordKind, data: &[u8]) -> Result<[u8; 2], HexError> {
    match *data {
        [hi, lo] => Ok([hi, lo]),
        _ => Err(HexError::InvalidRecordLength {
            kind,
            len: data.len(),
        }),
    }
}

impl<R: BufRead> Iterator for Reader<R> {
    type Item = Result<Block, HexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

impl<R: BufRead> std::iter::FusedIterator for Reader<R> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(s: &str) -> Result<Vec<Block>, HexError> {
        Reader::new(s.as_bytes()).collect()
    }

    #[test]
    fn test_single_data_block() {
        let blocks = blocks(":01001000AA45\n:00000001FF\n").unwrap();
        assert_eq!(
            blocks,
            vec![Block {
                address: 0x0010,
                data: vec![0xAA]
            }]
        );
    }

    #[test]
    fn test_extended_linear_address() {
        let hex = ":020000040003F7\n:0400000001020304F2\n:00000001FF\n";
        let blocks = blocks(hex).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].address, 0x0003_0000);
        assert_eq!(blocks[0].data, [1, 2, 3, 4]);
    }

    #[test]
    fn test_extended_segment_address() {
        // Segment 0x1000 -> base 0x10000
        let hex = ":020000021000EC\n:01000200AA53\n:00000001FF\n";
        let blocks = blocks(hex).unwrap();
        assert_eq!(blocks[0].address, 0x0001_0002);
    }

    #[test]
    fn test_extension_only_affects_later_records() {
        let hex = ":01000000AA55\n:020000040001F9\n:01000000BB44\n:00000001FF\n";
        let blocks = blocks(hex).unwrap();
        assert_eq!(blocks[0].address, 0x0000_0000);
        assert_eq!(blocks[1].address, 0x0001_0000);
    }

    #[test]
    fn test_start_address_records_ignored() {
        let hex = ":0400000300003800C1\n:04000005000000CD2A\n:01000000AA55\n:00000001FF\n";
        let mut reader = Reader::new(hex.as_bytes());
        let block = reader.next_block().unwrap().unwrap();
        assert_eq!(block.address, 0);
        assert_eq!(reader.base(), 0);
    }

    #[test]
    fn test_bad_extension_length() {
        let hex = ":03000004000100F8\n";
        assert!(matches!(
            blocks(hex),
            Err(HexError::InvalidRecordLength {
                kind: RecordKind::ExtendedLinearAddress,
                len: 3
            })
        ));

        let hex = ":03000002000100FA\n";
        assert!(matches!(
            blocks(hex),
            Err(HexError::InvalidRecordLength {
                kind: RecordKind::ExtendedSegmentAddress,
                len: 3
            })
        ));
    }

    #[test]
    fn test_eof_is_permanent() {
        // Data after the EOF record is never read
        let hex = ":00000001FF\n:01000000AA55\n";
        let mut reader = Reader::new(hex.as_bytes());
        assert!(reader.next_block().unwrap().is_none());
        assert!(reader.next_block().unwrap().is_none());
        assert_eq!(reader.into_inner(), b":01000000AA55\n");
    }

    #[test]
    fn test_missing_eof_record() {
        let blocks = blocks(":01001000AA45\n").unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_error_stops_iteration() {
        let mut reader = Reader::new(":01000000AA56\n:01000000AA55\n".as_bytes());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
