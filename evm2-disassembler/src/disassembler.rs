//! Linear disassembly of a whole image

use std::fmt::Write;
use std::sync::Arc;

use evm2_spec::{Instruction, Opcode, Program};

use crate::decoder::Decoder;
use crate::error::Result;
use crate::formatter::format;

/// One instruction recovered from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Bit offset of the prefix code
    pub offset: u32,
    pub opcode: Opcode,
    pub instruction: Instruction,
}

/// Decode the stream from bit 0 up to padding or the first unknown opcode
pub fn decode_program(program: &Program) -> Result<Vec<DecodedInstruction>> {
    let mut decoder = Decoder::new(Arc::new(program.bitstream()));
    let mut decoded = Vec::new();

    loop {
        let offset = decoder.get_address()?;
        let opcode = decoder.fetch()?;
        if opcode == Opcode::Padding {
            break;
        }

        decoded.push(DecodedInstruction {
            offset,
            opcode,
            instruction: decoder.instruction().clone(),
        });

        if opcode.is_unknown() {
            break;
        }
    }

    Ok(decoded)
}

/// Disassemble a program to a listing
pub fn disassemble(program: &Program) -> Result<String> {
    let decoded = decode_program(program)?;
    let mut output = String::new();

    let header = &program.header;
    let _ = writeln!(output, "# EVM2 image");
    let _ = writeln!(
        output,
        "# code: {} bytes, data: {} bytes ({} initialised)",
        header.code_size, header.data_size, header.initial_data_size
    );
    let _ = writeln!(output, "# {} instructions", decoded.len());
    let _ = writeln!(output);

    for entry in &decoded {
        let _ = writeln!(
            output,
            "{:>8}: {}",
            entry.offset,
            format(entry.opcode, &entry.instruction)
        );
    }

    Ok(output)
}
