//! Main assembler logic

use evm2_spec::Program;
use tracing::warn;

use crate::encoder::encode;
use crate::error::Result;
use crate::parser::parse;

/// Assemble source code into a program image
pub fn assemble(source: &str) -> Result<Program> {
    let parsed = parse(source)?;
    let code = encode(&parsed.code)?;

    let used = parsed.data.len() as u32;
    let data_size = match parsed.data_size {
        Some(declared) if declared < used => {
            warn!(declared, used, "bad .dataSize, expanding");
            used
        }
        Some(declared) => declared,
        None => used,
    };

    Ok(Program::new(code, parsed.data, data_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # Simple test
            .code
                loadConst 7, r0
                consoleWrite r0
                hlt
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.code.len(), (72 + 10 + 5 + 7) / 8);
        assert_eq!(program.header.code_size as usize, program.code.len());
    }

    #[test]
    fn test_data_size_expands() {
        let program = assemble(".dataSize 2\n.data\n01 02 03 04\n").unwrap();
        assert_eq!(program.header.data_size, 4);
        assert_eq!(program.header.initial_data_size, 4);
    }

    #[test]
    fn test_data_size_defaults_to_data() {
        let program = assemble(".data\n01 02\n").unwrap();
        assert_eq!(program.header.data_size, 2);

        let program = assemble(".dataSize 64\n.code\nhlt\n").unwrap();
        assert_eq!(program.header.data_size, 64);
        assert_eq!(program.header.initial_data_size, 0);
    }
}
