//! Byte-addressable view over the story image.
//!
//! All accesses are bounds checked; words are big-endian. The engine treats any
//! `MemoryError` as fatal.

use crate::error::MemoryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self { bytes: bytes.to_vec() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    fn check(&self, addr: usize, len: usize) -> Result<(), MemoryError> {
        match addr.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(MemoryError {
                addr,
                len,
                size: self.bytes.len(),
            }),
        }
    }

    #[inline]
    pub fn read8(&self, addr: usize) -> Result<u8, MemoryError> {
        self.check(addr, 1)?;
        Ok(self.bytes[addr])
    }

    #[inline]
    pub fn read16(&self, addr: usize) -> Result<u16, MemoryError> {
        self.check(addr, 2)?;
        Ok(u16::from_be_bytes([self.bytes[addr], self.bytes[addr + 1]]))
    }

    #[inline]
    pub fn write8(&mut self, addr: usize, val: u8) -> Result<(), MemoryError> {
        self.check(addr, 1)?;
        self.bytes[addr] = val;
        Ok(())
    }

    #[inline]
    pub fn write16(&mut self, addr: usize, val: u16) -> Result<(), MemoryError> {
        self.check(addr, 2)?;
        self.bytes[addr..addr + 2].copy_from_slice(&val.to_be_bytes());
        Ok(())
    }

    pub fn write_bytes(&mut self, addr: usize, data: &[u8]) -> Result<(), MemoryError> {
        self.check(addr, data.len())?;
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn read_bytes(&self, addr: usize, len: usize) -> Result<&[u8], MemoryError> {
        self.check(addr, len)?;
        Ok(&self.bytes[addr..addr + len])
    }
}
