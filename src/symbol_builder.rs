use std::sync::Arc;

use tower_lsp_server::lsp_types::Uri;
use tracing::warn;

use crate::{
    symbol_table::{Anchor, DeclarationLocation, ScopeId, Symbol, SymbolKind, SymbolTable},
    syntax::{NodeId, NodeKind, SyntaxTree},
    utils::{MalformedNode, node_range},
};

/// Returns the kind of symbol declared by a node, if it's a declaration
pub fn declaration_kind(kind: NodeKind) -> Option<SymbolKind> {
    match kind {
        NodeKind::VarDecl => Some(SymbolKind::Variable),
        NodeKind::RoutineDecl => Some(SymbolKind::Routine),
        NodeKind::Param => Some(SymbolKind::Parameter),
        _ => None,
    }
}

/// Returns the declaration location of a declaration node
pub fn declaration_location(
    tree: &SyntaxTree,
    uri: &Arc<Uri>,
    node: NodeId,
) -> Result<Option<DeclarationLocation>, MalformedNode> {
    let Some(name) = tree.name(node) else {
        return Ok(None);
    };
    Ok(Some(DeclarationLocation {
        uri: uri.clone(),
        range: node_range(tree, node)?,
        selection_range: node_range(tree, name)?,
    }))
}

/// Populates a [SymbolTable] by walking syntax trees
///
/// Several trees can be walked with the same builder, their top-level declarations all end up
/// in the shared global scope.
pub struct SymbolBuilder {
    table: SymbolTable,
    // The innermost scope is last, the global scope is always at the bottom
    scope_stack: Vec<ScopeId>,
}

impl Default for SymbolBuilder {
    fn default() -> Self {
        let table = SymbolTable::default();
        let scope_stack = vec![table.root()];
        Self { table, scope_stack }
    }
}

impl SymbolBuilder {
    /// Builds the symbol table for a single tree
    pub fn build(tree: &SyntaxTree, uri: &Arc<Uri>) -> SymbolTable {
        let mut builder = Self::default();
        builder.walk(tree, uri);
        builder.finish()
    }

    /// Adds the declarations found in `tree` to the table, attributed to `uri`
    pub fn walk(&mut self, tree: &SyntaxTree, uri: &Arc<Uri>) {
        let ctx = Context { tree, uri };
        self.visit_node(tree.root(), &ctx);
        debug_assert_eq!(self.scope_stack.len(), 1);
    }

    pub fn finish(self) -> SymbolTable {
        self.table
    }

    fn visit_node(&mut self, node: NodeId, ctx: &Context) {
        match ctx.tree.kind(node) {
            NodeKind::RoutineDecl => {
                // The routine is visible in the enclosing scope, its parameters and body get
                // a scope of their own.
                self.add_declaration(node, SymbolKind::Routine, ctx);
                self.push_scope(node, ctx);
                self.visit_children(node, ctx);
                self.pop_scope();
            }
            kind => {
                if let Some(symbol_kind) = declaration_kind(kind) {
                    self.add_declaration(node, symbol_kind, ctx);
                }
                self.visit_children(node, ctx);
            }
        }
    }

    fn visit_children(&mut self, node: NodeId, ctx: &Context) {
        for child in ctx.tree.children(node) {
            self.visit_node(*child, ctx);
        }
    }

    fn add_declaration(&mut self, node: NodeId, kind: SymbolKind, ctx: &Context) {
        let declaration = match declaration_location(ctx.tree, ctx.uri, node) {
            Ok(Some(declaration)) => declaration,
            Ok(None) => return,
            Err(error) => {
                warn!(%error, uri = ctx.uri.as_str(), "Skipping incomplete declaration");
                return;
            }
        };

        let Some(name) = ctx.tree.name(node) else {
            return;
        };

        let symbol = Symbol {
            name: ctx.tree.text(name).to_string(),
            kind,
            declaration,
        };
        self.table.add_symbol(self.current_scope(), symbol);
    }

    fn push_scope(&mut self, node: NodeId, ctx: &Context) {
        let anchor = Anchor {
            uri: ctx.uri.clone(),
            node,
        };
        let scope = self.table.add_scope(self.current_scope(), anchor);
        self.scope_stack.push(scope);
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().unwrap_or(&self.table.root())
    }
}

struct Context<'a> {
    tree: &'a SyntaxTree,
    uri: &'a Arc<Uri>,
}
