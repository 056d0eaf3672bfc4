//! # Bitstream Encoding
//!
//! Code bytes are stored in the image bit-permuted. The loader turns every
//! code byte around with [`permute_code_byte`] and then addresses the result
//! least-significant bit first, so stream bit `i` is bit `7 - i % 8` of file
//! byte `i / 8`.
//!
//! ```text
//! file byte      b7 b6 b5 b4 b3 b2 b1 b0
//! stream index    0  1  2  3  4  5  6  7
//! ```
//!
//! Operand fields are written least-significant bit first: the first bit read
//! is bit 0 of the field.

use crate::instruction::Argument;
use crate::opcode::Opcode;
use crate::{ADDRESS_BITS, CONSTANT_BITS};

/// Bit permutation applied to every code byte at load time.
///
/// The multiply/mask/modulo sequence reverses the bits of the byte.
#[inline]
pub const fn permute_code_byte(byte: u8) -> u8 {
    ((byte as u64 * 0x0202020202 & 0x010884422010) % 1023) as u8
}

/// Read-only instruction bitstream
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Bitstream {
    /// Permuted code bytes, addressed LSB-first
    blocks: Vec<u8>,
}

impl Bitstream {
    /// Build the stream from code bytes as stored in the image
    pub fn from_code(code: &[u8]) -> Self {
        Self {
            blocks: code.iter().map(|&byte| permute_code_byte(byte)).collect(),
        }
    }

    /// Length in bits
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len() * 8
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Bit at `index`, `None` past the end
    #[inline]
    pub fn bit(&self, index: usize) -> Option<bool> {
        let block = self.blocks.get(index / 8)?;
        Some(block >> (index % 8) & 1 == 1)
    }

    /// Index of the last set bit
    pub fn last_set_bit(&self) -> Option<usize> {
        let (block_index, block) = self
            .blocks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, block)| **block != 0)?;
        Some(block_index * 8 + 7 - block.leading_zeros() as usize)
    }
}

/// Sequential writer producing image code bytes
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn push_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Append an opcode's prefix code; pseudo-opcodes write nothing
    pub fn push_opcode(&mut self, opcode: Opcode) {
        if let Some((bits, length)) = opcode.prefix() {
            for i in (0..length).rev() {
                self.push_bit(bits >> i & 1 == 1);
            }
        }
    }

    /// Append the low `width` bits of `value`, least-significant bit first
    pub fn push_field(&mut self, value: u64, width: u32) {
        for i in 0..width {
            self.push_bit(value >> i & 1 == 1);
        }
    }

    pub fn push_address(&mut self, address: u32) {
        self.push_field(address as u64, ADDRESS_BITS);
    }

    pub fn push_constant(&mut self, constant: i64) {
        self.push_field(constant as u64, CONSTANT_BITS);
    }

    pub fn push_argument(&mut self, argument: &Argument) {
        self.push_bit(argument.memory);
        if argument.memory {
            self.push_field(argument.size.selector() as u64, 2);
        }
        self.push_field(argument.register as u64, 4);
    }

    /// Pad to a byte boundary and pack into image code bytes
    pub fn into_code_bytes(self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &bit)| byte | (bit as u8) << (7 - i))
            })
            .collect()
    }
}
