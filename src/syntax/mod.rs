//! Lexing and parsing of mykt source files
//!
//! The parser recovers from errors so that a tree is always available for analysis.

mod lexer;
mod parser;
mod tree;

pub use lexer::Token;
pub use parser::{ParseResult, Parser};
pub use tree::{Import, NodeId, NodeKind, SyntaxTree};

use thiserror::Error;
use tower_lsp_server::lsp_types::{Position, Range};

#[derive(Error, Clone, Debug, PartialEq)]
pub enum ErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("expected {expected}, found {found}")]
    ExpectedToken {
        expected: &'static str,
        found: String,
    },
}

/// An error encountered while parsing, positioned at the offending token
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{error}")]
pub struct Error {
    pub error: ErrorKind,
    // 1-based
    pub line: u32,
    pub column: u32,
    pub width: u32,
}

impl Error {
    pub fn range(&self) -> Range {
        let line = self.line.saturating_sub(1);
        Range {
            start: Position {
                line,
                character: self.column,
            },
            end: Position {
                line,
                character: self.column + self.width,
            },
        }
    }
}
