//! # Lexer for EVM2 Assembly Language

use logos::Logos;

use crate::error::{AssemblerError, Result};

/// Tokens for EVM2 assembly
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Skip whitespace (not newlines)
#[logos(skip r"#[^\n]*")] // Skip comments
pub enum Token {
    /// Mnemonics, registers, labels, numbers and data bytes
    #[regex(r"-?[a-zA-Z0-9_]+", |lex| lex.slice().to_string())]
    Word(String),

    /// Directive (.code, .data, .dataSize)
    #[regex(r"\.[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Directive(String),

    #[token(",")]
    Comma,

    /// Colon (for labels)
    #[token(":")]
    Colon,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("\n")]
    Newline,
}

/// Tokens of one non-empty source line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 1-based line number
    pub number: usize,
    pub tokens: Vec<Token>,
}

/// Split source text into lines of tokens, dropping blank lines
pub fn tokenize(source: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    let mut current = Line {
        number: 1,
        tokens: Vec::new(),
    };

    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        match token {
            Ok(Token::Newline) => {
                let number = current.number + 1;
                let finished = std::mem::replace(
                    &mut current,
                    Line {
                        number,
                        tokens: Vec::new(),
                    },
                );
                if !finished.tokens.is_empty() {
                    lines.push(finished);
                }
            }
            Ok(token) => current.tokens.push(token),
            Err(()) => {
                return Err(AssemblerError::Lexer {
                    line: current.number,
                    text: lexer.slice().to_string(),
                })
            }
        }
    }

    if !current.tokens.is_empty() {
        lines.push(current);
    }

    Ok(lines)
}
