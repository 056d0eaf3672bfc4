//! # Program Image
//!
//! Binary format:
//! ```text
//! Offset  Size               Field
//! ──────────────────────────────────────────────
//! 0x00    8                  magic ("ESET-VM2")
//! 0x08    4                  code_size
//! 0x0C    4                  data_size
//! 0x10    4                  initial_data_size
//! 0x14    code_size          bit-permuted code
//! ...     initial_data_size  initial memory contents
//! ```
//!
//! All integers are little-endian.

use crate::encoding::Bitstream;
use crate::error::{ImageError, Result};
use crate::{MAGIC, MAX_CODE_SIZE};
use std::fmt;

/// Image header (20 bytes)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    /// Magic tag: "ESET-VM2"
    pub magic: [u8; 8],

    /// Code section size in bytes
    pub code_size: u32,

    /// Memory segment size in bytes
    pub data_size: u32,

    /// Size of the initialised prefix of the memory segment
    pub initial_data_size: u32,
}

impl ImageHeader {
    /// Header size in bytes
    pub const SIZE: usize = 20;

    pub fn new(code_size: u32, data_size: u32, initial_data_size: u32) -> Self {
        Self {
            magic: MAGIC,
            code_size,
            data_size,
            initial_data_size,
        }
    }

    /// Size of a well-formed image carrying this header
    pub fn image_size(&self) -> u64 {
        Self::SIZE as u64 + self.code_size as u64 + self.initial_data_size as u64
    }

    /// Check the header-only invariants
    pub fn validate(&self) -> Result<()> {
        if self.data_size < self.initial_data_size {
            return Err(ImageError::InvalidDataSize {
                data_size: self.data_size,
                initial_data_size: self.initial_data_size,
            });
        }

        if self.magic != MAGIC {
            return Err(ImageError::BadMagic(self.magic));
        }

        if self.code_size > MAX_CODE_SIZE {
            return Err(ImageError::CodeTooLarge {
                code_size: self.code_size,
                max: MAX_CODE_SIZE,
            });
        }

        Ok(())
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];

        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..12].copy_from_slice(&self.code_size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.data_size.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.initial_data_size.to_le_bytes());

        bytes
    }

    /// Deserialize from bytes without validating
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ImageError::TooShort {
                expected: Self::SIZE,
                found: bytes.len(),
            });
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        Ok(Self {
            magic,
            code_size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            data_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            initial_data_size: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
        })
    }
}

impl Default for ImageHeader {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl fmt::Display for ImageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EVM2 Image Header")?;
        writeln!(f, "  Magic:        {}", String::from_utf8_lossy(&self.magic))?;
        writeln!(f, "  Code:         {} bytes ({} bits)", self.code_size, self.code_size as u64 * 8)?;
        writeln!(f, "  Data:         {} bytes", self.data_size)?;
        write!(f, "  Initial data: {} bytes", self.initial_data_size)
    }
}

/// A complete program image
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program {
    pub header: ImageHeader,

    /// Code bytes as stored in the image (not yet permuted)
    pub code: Vec<u8>,

    /// Initial memory contents
    pub data: Vec<u8>,
}

impl Program {
    /// Build a program, growing `data_size` to fit the initial data
    pub fn new(code: Vec<u8>, data: Vec<u8>, data_size: u32) -> Self {
        let header = ImageHeader::new(
            code.len() as u32,
            data_size.max(data.len() as u32),
            data.len() as u32,
        );
        Self { header, code, data }
    }

    /// Parse and validate an image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = ImageHeader::from_bytes(bytes)?;
        header.validate()?;

        let expected = header.image_size();
        if bytes.len() as u64 != expected {
            return Err(ImageError::InvalidFileSize {
                expected,
                found: bytes.len() as u64,
            });
        }

        let code_end = ImageHeader::SIZE + header.code_size as usize;
        Ok(Self {
            code: bytes[ImageHeader::SIZE..code_end].to_vec(),
            data: bytes[code_end..].to_vec(),
            header,
        })
    }

    /// Serialize to the image file layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.header.image_size() as usize);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.code);
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// De-permuted instruction stream
    pub fn bitstream(&self) -> Bitstream {
        Bitstream::from_code(&self.code)
    }

    /// Initial memory segment: `data_size` bytes, initial data first.
    ///
    /// Initial data beyond `data_size` is dropped.
    pub fn memory_image(&self) -> Vec<u8> {
        let mut memory = vec![0u8; self.header.data_size as usize];
        let initialised = self.data.len().min(memory.len());
        memory[..initialised].copy_from_slice(&self.data[..initialised]);
        memory
    }
}
