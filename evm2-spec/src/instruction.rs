//! Decoded instruction record

use std::fmt;

/// Width of a memory-indirect access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AccessSize {
    #[default]
    Byte,
    Word,
    Dword,
    Qword,
}

impl AccessSize {
    /// Decode the 2-bit size selector
    pub const fn from_selector(selector: u8) -> Self {
        match selector & 0b11 {
            0 => AccessSize::Byte,
            1 => AccessSize::Word,
            2 => AccessSize::Dword,
            _ => AccessSize::Qword,
        }
    }

    /// The 2-bit size selector
    pub const fn selector(self) -> u8 {
        match self {
            AccessSize::Byte => 0,
            AccessSize::Word => 1,
            AccessSize::Dword => 2,
            AccessSize::Qword => 3,
        }
    }

    /// Number of bytes accessed
    pub const fn bytes(self) -> usize {
        1 << self.selector()
    }

    pub const fn name(self) -> &'static str {
        match self {
            AccessSize::Byte => "byte",
            AccessSize::Word => "word",
            AccessSize::Dword => "dword",
            AccessSize::Qword => "qword",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(AccessSize::Byte),
            "word" => Some(AccessSize::Word),
            "dword" => Some(AccessSize::Dword),
            "qword" => Some(AccessSize::Qword),
            _ => None,
        }
    }
}

/// One instruction argument: a register, or memory addressed by a register
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Argument {
    /// Memory-indirect when set, register-direct otherwise
    pub memory: bool,
    /// Access width, only meaningful for memory arguments
    pub size: AccessSize,
    /// Register index (0-15)
    pub register: u8,
}

impl Argument {
    pub const fn register(register: u8) -> Self {
        Self {
            memory: false,
            size: AccessSize::Byte,
            register,
        }
    }

    pub const fn memory(size: AccessSize, register: u8) -> Self {
        Self {
            memory: true,
            size,
            register,
        }
    }

    /// Number of stream bits this argument occupies
    pub const fn encoded_bits(&self) -> u32 {
        if self.memory {
            1 + 2 + 4
        } else {
            1 + 4
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.memory {
            write!(f, "{}[r{}]", self.size.name(), self.register)
        } else {
            write!(f, "r{}", self.register)
        }
    }
}

/// Operands of the most recently decoded instruction
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Instruction {
    /// Jump, call and thread-create target (bit offset)
    pub address: u32,
    /// load_const value
    pub constant: i64,
    /// Up to four arguments, in operand order
    pub arguments: Vec<Argument>,
}

impl Instruction {
    /// Reset to the empty record, keeping the argument allocation
    pub fn clear(&mut self) {
        self.address = 0;
        self.constant = 0;
        self.arguments.clear();
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }
}
