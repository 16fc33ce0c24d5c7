use thiserror::Error;
use tower_lsp_server::lsp_types::{Position, Range};

use crate::syntax::{NodeId, SyntaxTree, Token};

/// A syntax node without position information for its end, left behind by an incomplete parse
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("syntax node {0:?} is missing its stop token")]
pub struct MalformedNode(pub NodeId);

/// Converts a node's token span into an end-exclusive LSP range
pub fn node_range(tree: &SyntaxTree, node: NodeId) -> Result<Range, MalformedNode> {
    let stop = tree.stop_token(node).ok_or(MalformedNode(node))?;
    Ok(Range {
        start: token_start(tree.start_token(node)),
        end: token_end(stop),
    })
}

pub fn token_start(token: &Token) -> Position {
    Position {
        line: token.line.saturating_sub(1),
        character: token.column,
    }
}

pub fn token_end(token: &Token) -> Position {
    Position {
        line: token.line.saturating_sub(1),
        character: token.column + token.width(),
    }
}

pub fn default<T: Default>() -> T {
    T::default()
}
