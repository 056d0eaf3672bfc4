//! Runtime error types for EVM2

use evm2_disassembler::DecodeError;
use evm2_spec::{ImageError, Opcode};
use thiserror::Error;

/// Coarse error classes shared by every runtime failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing image, fatal at load
    ImageFormat,
    /// Jump target, register, thread index or call stack out of range
    OutOfRange,
    /// Memory access beyond the memory segment
    MemoryRange,
    /// Integer division or modulo by zero
    Division,
    /// Unknown opcode, double join, self re-lock or an unserviced opcode
    NotImplemented,
    /// Console or binary file failure
    Io,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("Access register out of range: r{register}")]
    RegisterRange { register: u8 },

    #[error("Instruction has no argument {index}")]
    MissingArgument { index: usize },

    #[error("Memory out of range: {size} bytes at {address:#x}, memory size {limit:#x}")]
    MemoryRange { address: i64, size: usize, limit: usize },

    #[error("Division by zero at bit {address}")]
    DivisionByZero { address: u32 },

    #[error("Stack overflow at bit {address}")]
    StackOverflow { address: u32 },

    #[error("Stack underflow at bit {address}")]
    StackUnderflow { address: u32 },

    #[error("Unimplemented instruction {}", .0.prefix_string().unwrap_or_default())]
    UnknownInstruction(Opcode),

    #[error("Unimplemented instruction: {0} has no process service")]
    Unserviced(Opcode),

    #[error("Invalid join thread argument: {index}")]
    InvalidThread { index: i64 },

    #[error("Threads should be joined once: thread {index}")]
    AlreadyJoined { index: usize },

    #[error("Thread {index} cannot join itself")]
    SelfJoin { index: usize },

    #[error("Lock {lock} is already held by thread {thread}; locks are not re-entrant")]
    ReentrantLock { lock: i64, thread: usize },

    #[error("Invalid binary file offset: {offset}")]
    FileOffset { offset: i64 },

    #[error("Process has already been started")]
    AlreadyStarted,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Image(_) => ErrorKind::ImageFormat,
            RuntimeError::Decode(_)
            | RuntimeError::RegisterRange { .. }
            | RuntimeError::StackOverflow { .. }
            | RuntimeError::StackUnderflow { .. }
            | RuntimeError::InvalidThread { .. } => ErrorKind::OutOfRange,
            RuntimeError::MemoryRange { .. } => ErrorKind::MemoryRange,
            RuntimeError::DivisionByZero { .. } => ErrorKind::Division,
            RuntimeError::MissingArgument { .. }
            | RuntimeError::UnknownInstruction(_)
            | RuntimeError::Unserviced(_)
            | RuntimeError::AlreadyJoined { .. }
            | RuntimeError::SelfJoin { .. }
            | RuntimeError::ReentrantLock { .. }
            | RuntimeError::AlreadyStarted => ErrorKind::NotImplemented,
            RuntimeError::FileOffset { .. } | RuntimeError::IoError(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
