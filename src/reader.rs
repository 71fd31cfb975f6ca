//! Forward-only cursor over an immutable byte buffer
//!
//! All multi-byte reads are big-endian (network byte order). The cursor only
//! ever moves forward; a failed read leaves it where it was.

use crate::error::{Error, Result};

/// Sequential reader over a byte slice
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Current cursor position in bytes
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether any unread bytes remain
    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    fn check(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(Error::OutOfData {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Read one unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Read an unsigned 16-bit big-endian integer
    pub fn read_u16(&mut self) -> Result<u16> {
        self.check(2)?;
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    /// Read an unsigned 32-bit big-endian integer
    pub fn read_u32(&mut self) -> Result<u32> {
        self.check(4)?;
        let value = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(value)
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consume and return every unread byte
    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x0203);
        assert_eq!(reader.read_u32().unwrap(), 0x04050607);
        assert_eq!(reader.position(), 7);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_out_of_data() {
        let data = [0x01, 0x02];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::OutOfData {
                needed: 4,
                available: 0
            }
        ));
    }

    #[test]
    fn test_failed_read_does_not_advance() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = ByteReader::new(&data);

        assert!(reader.read_u32().is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn test_read_bytes() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_bytes(3).unwrap(), &[0xAA, 0xBB, 0xCC]);
        assert!(reader.read_bytes(2).is_err());
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_take_rest() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = ByteReader::new(&data);

        reader.read_u16().unwrap();
        assert_eq!(reader.take_rest(), &[0x03, 0x04]);
        assert_eq!(reader.take_rest(), &[] as &[u8]);
        assert!(!reader.has_remaining());
    }
}
