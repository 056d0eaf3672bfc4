//! # EVM2 Specification
//!
//! Core types shared by the EVM2 toolchain.
//!
//! ## Key Features
//! - Fixed 20-byte image header (`ESET-VM2` magic, code/data sizes)
//! - Bit-addressed instruction stream with prefix-coded opcodes
//! - Operand fields stored least-significant-bit first
//! - 16 general-purpose signed 64-bit registers
//! - Register-direct and memory-indirect (1/2/4/8 byte) arguments

pub mod error;
pub mod opcode;
pub mod instruction;
pub mod encoding;
pub mod program;

pub use error::{ImageError, Result};
pub use opcode::Opcode;
pub use instruction::{AccessSize, Argument, Instruction};
pub use encoding::{permute_code_byte, BitWriter, Bitstream};
pub use program::{ImageHeader, Program};

/// Magic tag at the start of every image
pub const MAGIC: [u8; 8] = *b"ESET-VM2";

/// Number of general-purpose registers
pub const NUM_REGISTERS: usize = 16;

/// Depth of the per-machine return-address stack
pub const STACK_DEPTH: usize = 4096;

/// Bit offset where the main thread starts executing
pub const DEFAULT_ENTRY_POINT: u32 = 0;

/// Maximum number of arguments a single instruction carries
pub const MAX_ARGUMENTS: usize = 4;

/// Width of an address operand in bits
pub const ADDRESS_BITS: u32 = 32;

/// Largest code section whose every bit position fits an address operand
pub const MAX_CODE_SIZE: u32 = u32::MAX / 8;

/// Width of a constant operand in bits
pub const CONSTANT_BITS: u32 = 64;
