use std::sync::Arc;

use tower_lsp_server::lsp_types::{LocationLink, Range, Uri};
use tracing::debug;

use crate::{
    symbol_table::{DeclarationLocation, ScopeId, SymbolTable},
    syntax::{NodeId, NodeKind, SyntaxTree},
    utils::node_range,
};

/// The result of resolving an identifier to its declaration
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    /// The range of the identifier that was resolved
    pub origin_selection_range: Range,
    pub declaration: DeclarationLocation,
}

impl From<Definition> for LocationLink {
    fn from(definition: Definition) -> Self {
        Self {
            origin_selection_range: Some(definition.origin_selection_range),
            target_uri: definition.declaration.uri.as_ref().clone(),
            target_range: definition.declaration.range,
            target_selection_range: definition.declaration.selection_range,
        }
    }
}

/// Returns the innermost scope containing `node`
///
/// The node's ancestors are checked for a scope anchor, falling back to the global scope.
pub fn enclosing_scope(
    tree: &SyntaxTree,
    uri: &Arc<Uri>,
    node: NodeId,
    table: &SymbolTable,
) -> ScopeId {
    tree.ancestors(node)
        .find_map(|ancestor| table.scope_anchored_at(uri, ancestor))
        .unwrap_or_else(|| table.root())
}

/// Finds the declaration that the identifier at `node` refers to
///
/// Returns `None` when no scope in the chain declares the name.
pub fn locate(
    tree: &SyntaxTree,
    uri: &Arc<Uri>,
    node: NodeId,
    table: &SymbolTable,
) -> Option<Definition> {
    if tree.kind(node) != NodeKind::Identifier {
        return None;
    }

    let name = tree.text(node);
    let scope = enclosing_scope(tree, uri, node, table);
    let Some(symbol) = table.lookup(scope, name) else {
        debug!(name, "No declaration found");
        return None;
    };
    debug!(
        name,
        kind = ?symbol.kind,
        uri = symbol.declaration.uri.as_str(),
        "Resolved declaration"
    );

    Some(Definition {
        origin_selection_range: node_range(tree, node).ok()?,
        declaration: symbol.declaration.clone(),
    })
}
