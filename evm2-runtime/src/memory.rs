//! Memory subsystem
//!
//! One byte-addressable segment shared by every thread of a process. Accesses
//! are individually atomic per byte and otherwise unsynchronised: ordering
//! between threads is the executing program's business, enforced with the
//! `lock`/`unlock` opcodes.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};

use evm2_spec::AccessSize;

use crate::error::{Result, RuntimeError};

#[derive(Debug)]
pub struct Memory {
    bytes: Box<[AtomicU8]>,
}

impl Memory {
    /// Zero-filled memory of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: (0..size).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Memory initialised from an image
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            bytes: image.into_iter().map(AtomicU8::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read `size` bytes little-endian at `address`, zero-extended
    pub fn read(&self, address: i64, size: AccessSize) -> Result<i64> {
        let range = self.range(address, size.bytes())?;
        let value = self.bytes[range]
            .iter()
            .rev()
            .fold(0u64, |value, byte| value << 8 | byte.load(Ordering::Relaxed) as u64);
        Ok(value as i64)
    }

    /// Write the low `size` bytes of `value` little-endian at `address`
    pub fn write(&self, address: i64, size: AccessSize, value: i64) -> Result<()> {
        let range = self.range(address, size.bytes())?;
        for (byte, cell) in value.to_le_bytes().iter().zip(&self.bytes[range]) {
            cell.store(*byte, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy `count` bytes out of memory
    pub fn read_bytes(&self, address: i64, count: usize) -> Result<Vec<u8>> {
        let range = self.range(address, count)?;
        Ok(self.bytes[range]
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect())
    }

    /// Copy `data` into memory at `address`
    pub fn write_bytes(&self, address: i64, data: &[u8]) -> Result<()> {
        let range = self.range(address, data.len())?;
        for (byte, cell) in data.iter().zip(&self.bytes[range]) {
            cell.store(*byte, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Check that `count` bytes at `address` lie inside the segment
    pub fn check(&self, address: i64, count: usize) -> Result<()> {
        self.range(address, count).map(|_| ())
    }

    /// Copy of the whole segment
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }

    fn range(&self, address: i64, count: usize) -> Result<Range<usize>> {
        let out_of_range = || RuntimeError::MemoryRange {
            address,
            size: count,
            limit: self.bytes.len(),
        };

        let start = usize::try_from(address).map_err(|_| out_of_range())?;
        let end = start.checked_add(count).ok_or_else(out_of_range)?;
        if end > self.bytes.len() {
            return Err(out_of_range());
        }
        Ok(start..end)
    }
}
