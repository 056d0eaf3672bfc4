//! Decoder errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Instruction call/jump/jumpEqual out of range: address {address} beyond {limit} bits")]
    JumpOutOfRange { address: u32, limit: usize },

    #[error("Instruction stream exhausted at bit {position}")]
    StreamExhausted { position: usize },

    #[error("Invalid prefix code: 0b{bits:06b}")]
    InvalidPrefix { bits: u8 },

    #[error("Bit position {position} does not fit a 32-bit address")]
    AddressOverflow { position: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
