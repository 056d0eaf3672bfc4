//! Instruction formatting to assembly text

use evm2_spec::{Instruction, Opcode};

/// Format a decoded instruction in assembler syntax
pub fn format(opcode: Opcode, instr: &Instruction) -> String {
    let mut operands = Vec::with_capacity(1 + instr.arguments.len());

    if opcode.has_address() {
        operands.push(instr.address.to_string());
    }
    if opcode.has_constant() {
        operands.push(instr.constant.to_string());
    }
    operands.extend(instr.arguments.iter().map(ToString::to_string));

    if operands.is_empty() {
        opcode.mnemonic().to_string()
    } else {
        format!("{} {}", opcode.mnemonic(), operands.join(", "))
    }
}
