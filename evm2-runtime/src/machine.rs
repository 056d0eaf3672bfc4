//! Register machine
//!
//! A [`Machine`] executes every computational opcode itself and hands any
//! other opcode back to its caller, with the decoded operands still available
//! through [`Machine::instruction`].

use std::sync::Arc;

use evm2_disassembler::Decoder;
use evm2_spec::{Argument, Bitstream, Instruction, Opcode, NUM_REGISTERS, STACK_DEPTH};

use crate::error::{Result, RuntimeError};
use crate::memory::Memory;
use crate::task::Task;

#[derive(Debug)]
pub struct Machine {
    registers: [i64; NUM_REGISTERS],
    /// Return addresses, innermost call last
    stack: Vec<u32>,
    decoder: Decoder,
    memory: Arc<Memory>,
}

impl Machine {
    /// Machine with zeroed registers, starting at bit 0
    pub fn new(code: Arc<Bitstream>, memory: Arc<Memory>) -> Self {
        Self {
            registers: [0; NUM_REGISTERS],
            stack: Vec::new(),
            decoder: Decoder::new(code),
            memory,
        }
    }

    /// Machine sharing code and memory with `self`, starting at `entry_point`
    /// with a copy of the current registers and an empty stack
    pub fn fork(&self, entry_point: u32) -> Result<Self> {
        let decoder = Decoder::with_entry_point(Arc::clone(self.decoder.code()), entry_point)?;
        Ok(Self {
            registers: self.registers,
            stack: Vec::new(),
            decoder,
            memory: Arc::clone(&self.memory),
        })
    }

    /// Execute until an opcode needs outside service or `task` is stopped
    pub fn run(&mut self, task: &Task) -> Result<Opcode> {
        while task.can_run() {
            let address = self.decoder.get_address()?;
            let opcode = self.decoder.fetch()?;

            match opcode {
                Opcode::LoadConst => {
                    let constant = self.decoder.instruction().constant;
                    self.write_arg(0, constant)?;
                }

                Opcode::Mov => {
                    let value = self.read_arg(0)?;
                    self.write_arg(1, value)?;
                }

                Opcode::Add => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
                Opcode::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
                Opcode::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,

                Opcode::Divide => self.binary(|a, b| {
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero { address });
                    }
                    Ok(a.wrapping_div(b))
                })?,

                Opcode::Mod => self.binary(|a, b| {
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero { address });
                    }
                    Ok(a.wrapping_rem(b))
                })?,

                Opcode::Compare => self.binary(|a, b| Ok(a.cmp(&b) as i64))?,

                Opcode::JumpAddress => {
                    let target = self.decoder.instruction().address;
                    self.decoder.jump(target)?;
                }

                Opcode::JumpEqual => {
                    if self.read_arg(0)? == self.read_arg(1)? {
                        let target = self.decoder.instruction().address;
                        self.decoder.jump(target)?;
                    }
                }

                Opcode::Call => {
                    if self.stack.len() >= STACK_DEPTH {
                        return Err(RuntimeError::StackOverflow { address });
                    }
                    self.stack.push(self.decoder.get_address()?);
                    let target = self.decoder.instruction().address;
                    self.decoder.jump(target)?;
                }

                Opcode::Ret => {
                    let target = self
                        .stack
                        .pop()
                        .ok_or(RuntimeError::StackUnderflow { address })?;
                    self.decoder.jump(target)?;
                }

                other => return Ok(other),
            }
        }

        Ok(Opcode::Stopped)
    }

    /// Value of argument `index` of the current instruction
    pub fn read_arg(&self, index: usize) -> Result<i64> {
        let argument = self.argument(index)?;
        let value = self.register(argument.register)?;

        if argument.memory {
            self.memory.read(value, argument.size)
        } else {
            Ok(value)
        }
    }

    /// Store `value` through argument `index` of the current instruction
    pub fn write_arg(&mut self, index: usize, value: i64) -> Result<()> {
        let argument = self.argument(index)?;

        if argument.memory {
            let address = self.register(argument.register)?;
            self.memory.write(address, argument.size, value)
        } else {
            self.set_register(argument.register, value)
        }
    }

    pub fn register(&self, register: u8) -> Result<i64> {
        self.registers
            .get(register as usize)
            .copied()
            .ok_or(RuntimeError::RegisterRange { register })
    }

    pub fn set_register(&mut self, register: u8, value: i64) -> Result<()> {
        let slot = self
            .registers
            .get_mut(register as usize)
            .ok_or(RuntimeError::RegisterRange { register })?;
        *slot = value;
        Ok(())
    }

    pub fn registers(&self) -> &[i64; NUM_REGISTERS] {
        &self.registers
    }

    /// Operands of the last fetched instruction
    pub fn instruction(&self) -> &Instruction {
        self.decoder.instruction()
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    /// Number of return addresses on the stack
    pub fn call_depth(&self) -> usize {
        self.stack.len()
    }

    fn argument(&self, index: usize) -> Result<Argument> {
        self.decoder
            .instruction()
            .argument(index)
            .copied()
            .ok_or(RuntimeError::MissingArgument { index })
    }

    /// arg3 <- op(arg1, arg2)
    fn binary(&mut self, op: impl FnOnce(i64, i64) -> Result<i64>) -> Result<()> {
        let a = self.read_arg(0)?;
        let b = self.read_arg(1)?;
        let result = op(a, b)?;
        self.write_arg(2, result)
    }
}
