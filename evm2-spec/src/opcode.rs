//! # EVM2 Opcode Definitions
//!
//! Opcodes are identified by a variable-length prefix code read bit by bit
//! from the instruction stream. The code is complete: every bit sequence
//! resolves to exactly one opcode after at most six bits.
//!
//! ## Prefix Table
//!
//! ```text
//! 000     mov            2 args
//! 001     load_const     constant, 1 arg
//! 010000  (unknown)
//! 010001  add            3 args
//! 010010  sub            3 args
//! 010011  divide         3 args
//! 010100  mod            3 args
//! 010101  mul            3 args
//! 01011   (unknown)
//! 01100   compare        3 args
//! 01101   jump_address   address
//! 01110   jump_equal     address, 2 args
//! 01111   (unknown)
//! 10000   read           4 args
//! 10001   write          3 args
//! 10010   con_read       1 arg
//! 10011   con_write      1 arg
//! 10100   thread_create  address, 1 arg
//! 10101   thread_join    1 arg
//! 10110   halt
//! 10111   sleep          1 arg
//! 1100    call           address
//! 1101    ret
//! 1110    lock           1 arg
//! 1111    unlock         1 arg
//! ```
//!
//! `Padding` and `Stopped` are pseudo-opcodes with no encoding.

use std::fmt;

/// Instruction opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ========== Data movement ==========
    /// arg2 <- arg1
    Mov,
    /// arg1 <- constant
    LoadConst,

    // ========== Arithmetic ==========
    /// arg3 <- arg1 + arg2
    Add,
    /// arg3 <- arg1 - arg2
    Sub,
    /// arg3 <- arg1 / arg2
    Divide,
    /// arg3 <- arg1 % arg2
    Mod,
    /// arg3 <- arg1 * arg2
    Mul,
    /// arg3 <- -1 / 0 / 1 for arg1 < / == / > arg2
    Compare,

    // ========== Control flow ==========
    /// Continue at address
    JumpAddress,
    /// Continue at address if arg1 == arg2
    JumpEqual,
    /// Push the next instruction's address, continue at address
    Call,
    /// Pop an address and continue there
    Ret,

    // ========== Binary file ==========
    /// Read arg2 bytes at file offset arg1 into memory at arg3, count to arg4
    Read,
    /// Write arg2 bytes from memory at arg3 to file offset arg1
    Write,

    // ========== Console ==========
    /// arg1 <- hexadecimal value from the console
    ConRead,
    /// Print arg1 to the console as hexadecimal
    ConWrite,

    // ========== Threads and locks ==========
    /// Start a thread at address, its index goes to arg1
    ThreadCreate,
    /// Wait for thread arg1 to finish
    ThreadJoin,
    /// End the current thread
    Halt,
    /// Delay the current thread by arg1 milliseconds
    Sleep,
    /// Acquire lock arg1
    Lock,
    /// Release lock arg1
    Unlock,

    // ========== Unassigned prefix codes ==========
    Unknown01011,
    Unknown01111,
    Unknown010000,

    // ========== Pseudo-opcodes ==========
    /// End of the instruction stream
    Padding,
    /// Execution was cancelled
    Stopped,
}

/// All opcodes that have a prefix code, in table order
pub const ENCODED_OPCODES: [Opcode; 25] = [
    Opcode::Mov,
    Opcode::LoadConst,
    Opcode::Unknown010000,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Divide,
    Opcode::Mod,
    Opcode::Mul,
    Opcode::Unknown01011,
    Opcode::Compare,
    Opcode::JumpAddress,
    Opcode::JumpEqual,
    Opcode::Unknown01111,
    Opcode::Read,
    Opcode::Write,
    Opcode::ConRead,
    Opcode::ConWrite,
    Opcode::ThreadCreate,
    Opcode::ThreadJoin,
    Opcode::Halt,
    Opcode::Sleep,
    Opcode::Call,
    Opcode::Ret,
    Opcode::Lock,
    Opcode::Unlock,
];

/// Longest prefix code in bits
pub const MAX_PREFIX_BITS: u8 = 6;

impl Opcode {
    /// Prefix code as `(bits, length)`. The first bit read is the most
    /// significant of the `length` low bits.
    pub const fn prefix(self) -> Option<(u8, u8)> {
        let code = match self {
            Opcode::Mov => (0b000, 3),
            Opcode::LoadConst => (0b001, 3),
            Opcode::Unknown010000 => (0b010000, 6),
            Opcode::Add => (0b010001, 6),
            Opcode::Sub => (0b010010, 6),
            Opcode::Divide => (0b010011, 6),
            Opcode::Mod => (0b010100, 6),
            Opcode::Mul => (0b010101, 6),
            Opcode::Unknown01011 => (0b01011, 5),
            Opcode::Compare => (0b01100, 5),
            Opcode::JumpAddress => (0b01101, 5),
            Opcode::JumpEqual => (0b01110, 5),
            Opcode::Unknown01111 => (0b01111, 5),
            Opcode::Read => (0b10000, 5),
            Opcode::Write => (0b10001, 5),
            Opcode::ConRead => (0b10010, 5),
            Opcode::ConWrite => (0b10011, 5),
            Opcode::ThreadCreate => (0b10100, 5),
            Opcode::ThreadJoin => (0b10101, 5),
            Opcode::Halt => (0b10110, 5),
            Opcode::Sleep => (0b10111, 5),
            Opcode::Call => (0b1100, 4),
            Opcode::Ret => (0b1101, 4),
            Opcode::Lock => (0b1110, 4),
            Opcode::Unlock => (0b1111, 4),
            Opcode::Padding | Opcode::Stopped => return None,
        };
        Some(code)
    }

    /// Resolve the opcode whose prefix code is exactly `length` bits long
    pub const fn from_prefix(bits: u8, length: u8) -> Option<Opcode> {
        let opcode = match (length, bits) {
            (3, 0b000) => Opcode::Mov,
            (3, 0b001) => Opcode::LoadConst,
            (4, 0b1100) => Opcode::Call,
            (4, 0b1101) => Opcode::Ret,
            (4, 0b1110) => Opcode::Lock,
            (4, 0b1111) => Opcode::Unlock,
            (5, 0b01011) => Opcode::Unknown01011,
            (5, 0b01100) => Opcode::Compare,
            (5, 0b01101) => Opcode::JumpAddress,
            (5, 0b01110) => Opcode::JumpEqual,
            (5, 0b01111) => Opcode::Unknown01111,
            (5, 0b10000) => Opcode::Read,
            (5, 0b10001) => Opcode::Write,
            (5, 0b10010) => Opcode::ConRead,
            (5, 0b10011) => Opcode::ConWrite,
            (5, 0b10100) => Opcode::ThreadCreate,
            (5, 0b10101) => Opcode::ThreadJoin,
            (5, 0b10110) => Opcode::Halt,
            (5, 0b10111) => Opcode::Sleep,
            (6, 0b010000) => Opcode::Unknown010000,
            (6, 0b010001) => Opcode::Add,
            (6, 0b010010) => Opcode::Sub,
            (6, 0b010011) => Opcode::Divide,
            (6, 0b010100) => Opcode::Mod,
            (6, 0b010101) => Opcode::Mul,
            _ => return None,
        };
        Some(opcode)
    }

    /// Prefix code rendered as a bit string in stream order
    pub fn prefix_string(self) -> Option<String> {
        let (bits, length) = self.prefix()?;
        Some(format!("{:0width$b}", bits, width = length as usize))
    }

    /// Whether an address operand follows the prefix code
    pub const fn has_address(self) -> bool {
        matches!(
            self,
            Opcode::JumpAddress | Opcode::JumpEqual | Opcode::ThreadCreate | Opcode::Call
        )
    }

    /// Whether a 64-bit constant operand follows the prefix code
    pub const fn has_constant(self) -> bool {
        matches!(self, Opcode::LoadConst)
    }

    /// Number of register/memory arguments
    pub const fn arg_count(self) -> usize {
        match self {
            Opcode::Read => 4,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Divide
            | Opcode::Mod
            | Opcode::Mul
            | Opcode::Compare
            | Opcode::Write => 3,
            Opcode::Mov | Opcode::JumpEqual => 2,
            Opcode::LoadConst
            | Opcode::ConRead
            | Opcode::ConWrite
            | Opcode::ThreadCreate
            | Opcode::ThreadJoin
            | Opcode::Sleep
            | Opcode::Lock
            | Opcode::Unlock => 1,
            _ => 0,
        }
    }

    /// Opcodes with an unassigned prefix code
    pub const fn is_unknown(self) -> bool {
        matches!(
            self,
            Opcode::Unknown01011 | Opcode::Unknown01111 | Opcode::Unknown010000
        )
    }

    /// Opcodes a register machine executes without outside help
    pub const fn is_computational(self) -> bool {
        matches!(
            self,
            Opcode::Mov
                | Opcode::LoadConst
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Divide
                | Opcode::Mod
                | Opcode::Mul
                | Opcode::Compare
                | Opcode::JumpAddress
                | Opcode::JumpEqual
                | Opcode::Call
                | Opcode::Ret
        )
    }

    /// Assembly mnemonic
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::LoadConst => "loadConst",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Divide => "div",
            Opcode::Mod => "mod",
            Opcode::Mul => "mul",
            Opcode::Compare => "compare",
            Opcode::JumpAddress => "jump",
            Opcode::JumpEqual => "jumpEqual",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Read => "read",
            Opcode::Write => "write",
            Opcode::ConRead => "consoleRead",
            Opcode::ConWrite => "consoleWrite",
            Opcode::ThreadCreate => "createThread",
            Opcode::ThreadJoin => "joinThread",
            Opcode::Halt => "hlt",
            Opcode::Sleep => "sleep",
            Opcode::Lock => "lock",
            Opcode::Unlock => "unlock",
            Opcode::Unknown01011 => ".unknown 01011",
            Opcode::Unknown01111 => ".unknown 01111",
            Opcode::Unknown010000 => ".unknown 010000",
            Opcode::Padding => ".padding",
            Opcode::Stopped => ".stopped",
        }
    }

    /// Look up an opcode by assembly mnemonic
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        ENCODED_OPCODES
            .iter()
            .copied()
            .filter(|op| !op.is_unknown())
            .find(|op| op.mnemonic() == name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
