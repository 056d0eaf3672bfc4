//! # Error Types for EVM2 images

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("File {} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("Invalid image format - file is too short: {found} bytes, header needs {expected}")]
    TooShort { expected: usize, found: usize },

    #[error("Invalid image format - bad magic string {0:?}")]
    BadMagic([u8; 8]),

    #[error("Invalid image data size: data size {data_size} is smaller than initial data size {initial_data_size}")]
    InvalidDataSize { data_size: u32, initial_data_size: u32 },

    #[error("Invalid image code size {code_size}: at most {max} bytes are addressable")]
    CodeTooLarge { code_size: u32, max: u32 },

    #[error("Invalid image size {found}, should be {expected}")]
    InvalidFileSize { expected: u64, found: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImageError>;
