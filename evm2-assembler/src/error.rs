//! Assembler errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Line {line}: unexpected character {text:?}")]
    Lexer { line: usize, text: String },

    #[error("Line {line}: syntax error: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("Line {line}: unknown instruction: {mnemonic}")]
    UnknownInstruction { line: usize, mnemonic: String },

    #[error("Line {line}: {mnemonic} takes {expected} operands, found {found}")]
    OperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: invalid register: {operand}")]
    InvalidRegister { line: usize, operand: String },

    #[error("Line {line}: invalid constant: {text}")]
    InvalidConstant { line: usize, text: String },

    #[error("Line {line}: undefined label: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("Line {line}: duplicate label: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("Line {line}: invalid data byte: {text}")]
    InvalidDataByte { line: usize, text: String },

    #[error("Line {line}: invalid directive: {directive}")]
    InvalidDirective { line: usize, directive: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AssemblerError {
    /// Source line the error was raised on
    pub fn line(&self) -> Option<usize> {
        match self {
            AssemblerError::Lexer { line, .. }
            | AssemblerError::SyntaxError { line, .. }
            | AssemblerError::UnknownInstruction { line, .. }
            | AssemblerError::OperandCount { line, .. }
            | AssemblerError::InvalidRegister { line, .. }
            | AssemblerError::InvalidConstant { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::DuplicateLabel { line, .. }
            | AssemblerError::InvalidDataByte { line, .. }
            | AssemblerError::InvalidDirective { line, .. } => Some(*line),
            AssemblerError::IoError(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
