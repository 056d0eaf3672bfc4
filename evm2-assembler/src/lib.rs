//! EVM2 Assembler
//!
//! Assemble EVM2 assembly language into program images.
//!
//! ## Example
//!
//! ```rust
//! use evm2_assembler::assemble;
//!
//! let source = r#"
//!     .dataSize 16
//!     .code
//!         loadConst 42, r0
//!         consoleWrite r0
//!         hlt
//! "#;
//!
//! let program = assemble(source).unwrap();
//! assert_eq!(program.header.data_size, 16);
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod encoder;
pub mod assembler;

pub use error::{AssemblerError, Result};
pub use assembler::assemble;
pub use parser::{parse, parse_constant, parse_register};
pub use encoder::encode;
