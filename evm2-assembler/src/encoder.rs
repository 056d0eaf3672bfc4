//! Instruction encoding to the EVM2 bitstream
//!
//! Encoding is two-pass: the first pass sizes every instruction to find the
//! bit offset of each label, the second writes the stream with every target
//! resolved.

use std::collections::HashMap;

use evm2_spec::{BitWriter, ADDRESS_BITS, CONSTANT_BITS};

use crate::error::{AssemblerError, Result};
use crate::parser::{CodeItem, SourceInstruction, Target};

/// Number of stream bits `instr` occupies
pub fn encoded_bits(instr: &SourceInstruction) -> usize {
    let prefix = instr.opcode.prefix().map_or(0, |(_, length)| length as usize);
    let address = if instr.opcode.has_address() { ADDRESS_BITS as usize } else { 0 };
    let constant = if instr.opcode.has_constant() { CONSTANT_BITS as usize } else { 0 };
    let arguments: usize = instr
        .arguments
        .iter()
        .map(|arg| arg.encoded_bits() as usize)
        .sum();

    prefix + address + constant + arguments
}

/// Bit offset of every code label
pub fn label_offsets(code: &[CodeItem]) -> HashMap<String, u32> {
    let mut offsets = HashMap::new();
    let mut position = 0usize;

    for item in code {
        match item {
            CodeItem::Label { name, .. } => {
                offsets.insert(name.clone(), position as u32);
            }
            CodeItem::Instruction(instr) => position += encoded_bits(instr),
        }
    }

    offsets
}

/// Encode the code section into image code bytes
pub fn encode(code: &[CodeItem]) -> Result<Vec<u8>> {
    let labels = label_offsets(code);
    let mut writer = BitWriter::new();

    for item in code {
        if let CodeItem::Instruction(instr) = item {
            encode_instruction(&mut writer, instr, &labels)?;
        }
    }

    Ok(writer.into_code_bytes())
}

/// Append one instruction: prefix code, then address, constant and arguments
pub fn encode_instruction(
    writer: &mut BitWriter,
    instr: &SourceInstruction,
    labels: &HashMap<String, u32>,
) -> Result<()> {
    writer.push_opcode(instr.opcode);

    if instr.opcode.has_address() {
        let address = match &instr.target {
            Some(Target::Offset(offset)) => *offset,
            Some(Target::Label(label)) => {
                *labels
                    .get(label)
                    .ok_or_else(|| AssemblerError::UndefinedLabel {
                        line: instr.line,
                        label: label.clone(),
                    })?
            }
            None => 0,
        };
        writer.push_address(address);
    }

    if instr.opcode.has_constant() {
        writer.push_constant(instr.constant);
    }

    for argument in &instr.arguments {
        writer.push_argument(argument);
    }

    Ok(())
}
