//! # EVM2 Disassembler
//!
//! Decode EVM2 instruction streams and render them as assembly.
//!
//! The [`Decoder`] is also the fetch stage of the runtime: every VM thread
//! owns one, positioned independently over the shared stream.
//!
//! ## Example
//!
//! ```rust
//! use evm2_spec::{BitWriter, Opcode, Program};
//! use evm2_disassembler::disassemble;
//!
//! let mut writer = BitWriter::new();
//! writer.push_opcode(Opcode::Halt);
//! let program = Program::new(writer.into_code_bytes(), vec![], 0);
//!
//! let listing = disassemble(&program).unwrap();
//! assert!(listing.contains("hlt"));
//! ```

pub mod error;
pub mod decoder;
pub mod formatter;
pub mod disassembler;

pub use error::{DecodeError, Result};
pub use decoder::Decoder;
pub use disassembler::{decode_program, disassemble, DecodedInstruction};
pub use formatter::format;
