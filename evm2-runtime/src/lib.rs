//! # EVM2 Runtime
//!
//! Execute EVM2 program images.
//!
//! ## Features
//!
//! - **Register machines**: 16 signed 64-bit registers and a 4096-deep call
//!   stack per thread
//! - **Threads**: one OS thread per VM thread, register file copied at spawn
//! - **Locks**: created on first use, polled waits that observe cancellation
//! - **I/O**: hexadecimal console and a random-access binary file
//!
//! ## Example
//!
//! ```rust,no_run
//! use evm2_runtime::{Process, VmConfig};
//!
//! let config = VmConfig::captured(vec![2, 3]);
//! let process = Process::load_with_config("math.evm", config).unwrap();
//! process.start().unwrap();
//! println!("{:?}", process.output());
//! ```

pub mod error;
pub mod task;
pub mod memory;
pub mod machine;
pub mod thread;
pub mod locks;
pub mod io;
pub mod config;
pub mod loader;
pub mod process;

pub use config::VmConfig;
pub use error::{ErrorKind, Result, RuntimeError};
pub use io::{BinaryFile, Console, NO_INPUT};
pub use locks::LockTable;
pub use machine::Machine;
pub use memory::Memory;
pub use process::Process;
pub use task::{StopHandle, Task};
pub use thread::{Thread, MAIN_THREAD};

/// Simple execution helper
///
/// Runs a program with scripted console input and returns what it wrote.
pub fn run(program: &evm2_spec::Program, input: Vec<i64>) -> Result<Vec<i64>> {
    let process = Process::from_program(program, VmConfig::captured(input));
    process.start()?;
    Ok(process.output().unwrap_or_default())
}
