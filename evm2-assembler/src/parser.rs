//! Assembly parser

use std::collections::HashSet;

use evm2_spec::{AccessSize, Argument, Opcode, NUM_REGISTERS};

use crate::error::{AssemblerError, Result};
use crate::lexer::{tokenize, Line, Token};

/// Jump, call and thread-create target as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Label(String),
    Offset(u32),
}

/// One instruction with its operands parsed but labels unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInstruction {
    pub line: usize,
    pub opcode: Opcode,
    pub target: Option<Target>,
    pub constant: i64,
    pub arguments: Vec<Argument>,
}

/// Entry of the code section, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeItem {
    Label { line: usize, name: String },
    Instruction(SourceInstruction),
}

/// Parsed program source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    /// Value of the `.dataSize` directive
    pub data_size: Option<u32>,
    pub code: Vec<CodeItem>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Code,
    Data,
}

/// Parse a whole source file
///
/// Lines before the first section directive belong to the code section.
pub fn parse(source: &str) -> Result<Source> {
    let mut parsed = Source::default();
    let mut section = Section::Code;
    let mut code_labels = HashSet::new();
    let mut data_labels = HashSet::new();

    for line in tokenize(source)? {
        match line.tokens.as_slice() {
            [Token::Directive(directive), rest @ ..] => {
                parse_directive(&line, directive, rest, &mut parsed, &mut section)?;
            }
            [Token::Word(name), Token::Colon] => {
                let labels = match section {
                    Section::Code => &mut code_labels,
                    Section::Data => &mut data_labels,
                };
                if !labels.insert(name.clone()) {
                    return Err(AssemblerError::DuplicateLabel {
                        line: line.number,
                        label: name.clone(),
                    });
                }
                if section == Section::Code {
                    parsed.code.push(CodeItem::Label {
                        line: line.number,
                        name: name.clone(),
                    });
                }
            }
            tokens => match section {
                Section::Code => {
                    let instruction = parse_instruction(line.number, tokens)?;
                    parsed.code.push(CodeItem::Instruction(instruction));
                }
                Section::Data => parse_data(&line, &mut parsed.data)?,
            },
        }
    }

    Ok(parsed)
}

fn parse_directive(
    line: &Line,
    directive: &str,
    rest: &[Token],
    parsed: &mut Source,
    section: &mut Section,
) -> Result<()> {
    match (directive, rest) {
        ("code", []) => *section = Section::Code,
        ("data", []) => *section = Section::Data,
        ("dataSize", [Token::Word(value)]) => {
            if parsed.data_size.is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line.number,
                    message: "duplicate .dataSize".to_string(),
                });
            }
            let size = value
                .parse::<u32>()
                .map_err(|_| AssemblerError::InvalidConstant {
                    line: line.number,
                    text: value.clone(),
                })?;
            parsed.data_size = Some(size);
        }
        _ => {
            return Err(AssemblerError::InvalidDirective {
                line: line.number,
                directive: format!(".{}", directive),
            })
        }
    }
    Ok(())
}

fn parse_data(line: &Line, data: &mut Vec<u8>) -> Result<()> {
    for token in &line.tokens {
        let byte = match token {
            Token::Word(text) => u8::from_str_radix(text, 16).ok(),
            _ => None,
        };
        let byte = byte.ok_or_else(|| AssemblerError::InvalidDataByte {
            line: line.number,
            text: token_text(token),
        })?;
        data.push(byte);
    }
    Ok(())
}

/// Parse one instruction line
pub fn parse_instruction(line: usize, tokens: &[Token]) -> Result<SourceInstruction> {
    let (mnemonic, rest) = match tokens {
        [Token::Word(mnemonic), rest @ ..] => (mnemonic, rest),
        _ => {
            return Err(AssemblerError::SyntaxError {
                line,
                message: "expected an instruction".to_string(),
            })
        }
    };

    let opcode =
        Opcode::from_mnemonic(mnemonic).ok_or_else(|| AssemblerError::UnknownInstruction {
            line,
            mnemonic: mnemonic.clone(),
        })?;

    let operands: Vec<&[Token]> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(|token| *token == Token::Comma).collect()
    };

    let expected = opcode.has_address() as usize + opcode.has_constant() as usize + opcode.arg_count();
    if operands.len() != expected {
        return Err(AssemblerError::OperandCount {
            line,
            mnemonic: mnemonic.clone(),
            expected,
            found: operands.len(),
        });
    }

    let mut operands = operands.into_iter();
    let mut instruction = SourceInstruction {
        line,
        opcode,
        target: None,
        constant: 0,
        arguments: Vec::with_capacity(opcode.arg_count()),
    };

    if opcode.has_address() {
        if let Some(operand) = operands.next() {
            instruction.target = Some(parse_target(line, operand)?);
        }
    }
    if opcode.has_constant() {
        if let Some(operand) = operands.next() {
            instruction.constant = match operand {
                [Token::Word(text)] => {
                    parse_constant(text).ok_or_else(|| AssemblerError::InvalidConstant {
                        line,
                        text: text.clone(),
                    })?
                }
                _ => return Err(syntax(line, "expected a constant")),
            };
        }
    }
    for operand in operands {
        instruction.arguments.push(parse_argument(line, operand)?);
    }

    Ok(instruction)
}

/// Parse a register name (`r0`-`r15`)
pub fn parse_register(line: usize, text: &str) -> Result<u8> {
    text.strip_prefix('r')
        .and_then(|index| index.parse::<u8>().ok())
        .filter(|&index| (index as usize) < NUM_REGISTERS)
        .ok_or_else(|| AssemblerError::InvalidRegister {
            line,
            operand: text.to_string(),
        })
}

/// Parse a decimal, `0x` or `0b` literal, optionally negative
///
/// Positive literals up to `u64::MAX` are accepted and stored as their
/// two's-complement bit pattern.
pub fn parse_constant(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(binary) = digits.strip_prefix("0b") {
        u64::from_str_radix(binary, 2).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };

    if negative {
        if magnitude > i64::MIN.unsigned_abs() {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else {
        Some(magnitude as i64)
    }
}

fn parse_target(line: usize, operand: &[Token]) -> Result<Target> {
    match operand {
        [Token::Word(text)] => {
            if let Some(offset) = parse_constant(text) {
                u32::try_from(offset)
                    .map(Target::Offset)
                    .map_err(|_| AssemblerError::InvalidConstant {
                        line,
                        text: text.clone(),
                    })
            } else if text.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                Ok(Target::Label(text.clone()))
            } else {
                Err(syntax(line, "expected a label or bit offset"))
            }
        }
        _ => Err(syntax(line, "expected a label or bit offset")),
    }
}

fn parse_argument(line: usize, operand: &[Token]) -> Result<Argument> {
    match operand {
        [Token::Word(register)] => Ok(Argument::register(parse_register(line, register)?)),
        [Token::Word(size), Token::LBracket, Token::Word(register), Token::RBracket] => {
            let size = AccessSize::from_name(size).ok_or_else(|| {
                syntax(line, &format!("unknown access size {}", size))
            })?;
            Ok(Argument::memory(size, parse_register(line, register)?))
        }
        _ => Err(syntax(line, "expected a register or memory operand")),
    }
}

fn syntax(line: usize, message: &str) -> AssemblerError {
    AssemblerError::SyntaxError {
        line,
        message: message.to_string(),
    }
}

fn token_text(token: &Token) -> String {
    match token {
        Token::Word(text) => text.clone(),
        Token::Directive(name) => format!(".{}", name),
        Token::Comma => ",".to_string(),
        Token::Colon => ":".to_string(),
        Token::LBracket => "[".to_string(),
        Token::RBracket => "]".to_string(),
        Token::Newline => "\\n".to_string(),
    }
}
