//! Instruction decoder
//!
//! A `Decoder` is a private cursor over a shared, read-only bitstream. Each
//! call to [`Decoder::fetch`] decodes one instruction and overwrites the
//! decoded-instruction record.

use std::sync::Arc;

use evm2_spec::opcode::MAX_PREFIX_BITS;
use evm2_spec::{
    AccessSize, Argument, Bitstream, Instruction, Opcode, ADDRESS_BITS, CONSTANT_BITS,
};

use crate::error::{DecodeError, Result};

/// Streams shorter than a byte past this point are treated as padding
const PADDING_WINDOW: usize = 8;

#[derive(Debug, Clone)]
pub struct Decoder {
    /// Next bit to read
    cursor: usize,
    code: Arc<Bitstream>,
    /// Index of the last set bit in the stream
    padding_position: usize,
    instruction: Instruction,
}

impl Decoder {
    /// Decoder positioned at bit 0
    pub fn new(code: Arc<Bitstream>) -> Self {
        let padding_position = code.last_set_bit().unwrap_or(0);
        Self {
            cursor: 0,
            code,
            padding_position,
            instruction: Instruction::default(),
        }
    }

    /// Decoder positioned at `entry_point`
    pub fn with_entry_point(code: Arc<Bitstream>, entry_point: u32) -> Result<Self> {
        let mut decoder = Self::new(code);
        decoder.jump(entry_point)?;
        Ok(decoder)
    }

    /// Decode the next instruction
    pub fn fetch(&mut self) -> Result<Opcode> {
        self.instruction.clear();

        if self.cursor >= self.padding_position
            && self.code.len().saturating_sub(self.cursor) < PADDING_WINDOW
        {
            return Ok(Opcode::Padding);
        }

        let opcode = self.fetch_opcode()?;

        if opcode.has_address() {
            self.instruction.address = self.fetch_bits(ADDRESS_BITS)? as u32;
        }
        if opcode.has_constant() {
            self.instruction.constant = self.fetch_bits(CONSTANT_BITS)? as i64;
        }
        for _ in 0..opcode.arg_count() {
            let argument = self.fetch_argument()?;
            self.instruction.arguments.push(argument);
        }

        Ok(opcode)
    }

    /// Operands of the last fetched instruction
    #[inline]
    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    /// Current cursor position in bits, as an address operand
    #[inline]
    pub fn get_address(&self) -> Result<u32> {
        bit_address(self.cursor)
    }

    /// Move the cursor to `new_address`
    pub fn jump(&mut self, new_address: u32) -> Result<()> {
        if new_address as usize >= self.code.len() {
            return Err(DecodeError::JumpOutOfRange {
                address: new_address,
                limit: self.code.len(),
            });
        }
        self.cursor = new_address as usize;
        Ok(())
    }

    /// Shared stream this decoder reads
    pub fn code(&self) -> &Arc<Bitstream> {
        &self.code
    }

    pub fn padding_position(&self) -> usize {
        self.padding_position
    }

    fn fetch_opcode(&mut self) -> Result<Opcode> {
        let mut bits = 0u8;
        for length in 1..=MAX_PREFIX_BITS {
            bits = bits << 1 | self.fetch_bit()? as u8;
            if let Some(opcode) = Opcode::from_prefix(bits, length) {
                return Ok(opcode);
            }
        }
        Err(DecodeError::InvalidPrefix { bits })
    }

    fn fetch_argument(&mut self) -> Result<Argument> {
        let memory = self.fetch_bit()?;
        let size = if memory {
            AccessSize::from_selector(self.fetch_bits(2)? as u8)
        } else {
            AccessSize::Byte
        };
        let register = self.fetch_bits(4)? as u8;
        Ok(Argument {
            memory,
            size,
            register,
        })
    }

    /// Read a field of `count` bits, first bit least significant
    fn fetch_bits(&mut self, count: u32) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..count {
            value |= (self.fetch_bit()? as u64) << i;
        }
        Ok(value)
    }

    #[inline]
    fn fetch_bit(&mut self) -> Result<bool> {
        let bit = self
            .code
            .bit(self.cursor)
            .ok_or(DecodeError::StreamExhausted {
                position: self.cursor,
            })?;
        self.cursor += 1;
        Ok(bit)
    }
}

fn bit_address(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| DecodeError::AddressOverflow { position })
}
