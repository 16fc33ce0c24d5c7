use std::{collections::HashMap, sync::Arc};

use tower_lsp_server::lsp_types::{self, Range, Uri};

use crate::syntax::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Routine,
    Parameter,
}

impl From<SymbolKind> for lsp_types::SymbolKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Variable | SymbolKind::Parameter => Self::VARIABLE,
            SymbolKind::Routine => Self::FUNCTION,
        }
    }
}

/// Where a symbol is declared
#[derive(Clone, Debug, PartialEq)]
pub struct DeclarationLocation {
    pub uri: Arc<Uri>,
    /// The range of the whole declaration
    pub range: Range,
    /// The range of the declared name
    pub selection_range: Range,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub declaration: DeclarationLocation,
}

/// The syntax node that introduces a scope
///
/// Node ids are only unique within a single file, so the file's uri is part of the anchor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub uri: Arc<Uri>,
    pub node: NodeId,
}

/// The index of a [Scope] in its [SymbolTable]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

#[derive(Clone, Debug, Default)]
pub struct Scope {
    symbols: HashMap<String, Symbol>,
    parent: Option<ScopeId>,
    anchor: Option<Anchor>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    #[cfg(test)]
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// The enclosing scope, `None` for the global scope
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    #[cfg(test)]
    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }
}

/// A tree of scopes rooted at a single global scope
///
/// Scopes are only ever appended, and a new scope's parent must already exist, so following
/// parent links always reaches the root.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    anchors: HashMap<Anchor, ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::default()],
            anchors: HashMap::new(),
        }
    }
}

impl SymbolTable {
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    #[cfg(test)]
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(index, scope)| (ScopeId(index), scope))
    }

    /// Adds a child scope to `parent`, introduced by the given anchor
    pub fn add_scope(&mut self, parent: ScopeId, anchor: Anchor) -> ScopeId {
        debug_assert!(parent.0 < self.scopes.len(), "Unknown parent scope");

        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            parent: Some(parent),
            anchor: Some(anchor.clone()),
        });
        self.anchors.insert(anchor, id);
        id
    }

    /// Adds a symbol to a scope, returning the symbol that it replaced
    ///
    /// A redeclared name replaces the earlier declaration.
    pub fn add_symbol(&mut self, scope: ScopeId, symbol: Symbol) -> Option<Symbol> {
        self.scopes[scope.0]
            .symbols
            .insert(symbol.name.clone(), symbol)
    }

    /// Returns the scope introduced by the given node, if any
    pub fn scope_anchored_at(&self, uri: &Arc<Uri>, node: NodeId) -> Option<ScopeId> {
        self.anchors
            .get(&Anchor {
                uri: uri.clone(),
                node,
            })
            .copied()
    }

    /// Iterates from the given scope outwards to the root
    pub fn scope_chain(&self, from: ScopeId) -> ScopeChain<'_> {
        ScopeChain {
            table: self,
            next: Some(from),
        }
    }

    /// Finds the nearest declaration of `name` visible from the given scope
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<&Symbol> {
        self.scope_chain(from)
            .find_map(|scope| self.scope(scope).get(name))
    }
}

#[derive(Clone)]
pub struct ScopeChain<'a> {
    table: &'a SymbolTable,
    next: Option<ScopeId>,
}

impl Iterator for ScopeChain<'_> {
    type Item = ScopeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.table.scope(current).parent();
        Some(current)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;
    use tower_lsp_server::lsp_types::Position;

    fn test_uri() -> Arc<Uri> {
        Arc::new(Uri::from_str("file:///test.mykt").unwrap())
    }

    fn symbol(name: &str, line: u32) -> Symbol {
        let range = Range {
            start: Position { line, character: 0 },
            end: Position { line, character: 1 },
        };
        Symbol {
            name: name.to_string(),
            kind: SymbolKind::Variable,
            declaration: DeclarationLocation {
                uri: test_uri(),
                range,
                selection_range: range,
            },
        }
    }

    fn anchor(node: usize) -> Anchor {
        Anchor {
            uri: test_uri(),
            node: NodeId(node),
        }
    }

    #[test]
    fn lookup_walks_outwards() {
        let mut table = SymbolTable::default();
        let root = table.root();
        let outer = table.add_scope(root, anchor(1));
        let inner = table.add_scope(outer, anchor(2));

        table.add_symbol(root, symbol("a", 0));
        table.add_symbol(outer, symbol("b", 1));
        table.add_symbol(inner, symbol("a", 2));

        assert_eq!(table.lookup(inner, "a").map(|s| s.declaration.range.start.line), Some(2));
        assert_eq!(table.lookup(inner, "b").map(|s| s.declaration.range.start.line), Some(1));
        assert_eq!(table.lookup(outer, "a").map(|s| s.declaration.range.start.line), Some(0));
        assert!(table.lookup(root, "b").is_none());
        assert_eq!(
            table.scope_chain(inner).collect::<Vec<_>>(),
            [inner, outer, root]
        );
    }

    #[test]
    fn last_declaration_wins() {
        let mut table = SymbolTable::default();
        let root = table.root();

        assert!(table.add_symbol(root, symbol("x", 0)).is_none());
        let replaced = table.add_symbol(root, symbol("x", 3));

        assert_eq!(replaced.map(|s| s.declaration.range.start.line), Some(0));
        assert_eq!(table.lookup(root, "x").map(|s| s.declaration.range.start.line), Some(3));
    }

    #[test]
    fn anchors_are_scoped_to_their_file() {
        let mut table = SymbolTable::default();
        let scope = table.add_scope(table.root(), anchor(4));
        let other_uri = Arc::new(Uri::from_str("file:///other.mykt").unwrap());

        assert_eq!(table.scope_anchored_at(&test_uri(), NodeId(4)), Some(scope));
        assert_eq!(table.scope_anchored_at(&other_uri, NodeId(4)), None);
        assert_eq!(table.scope(scope).anchor(), Some(&anchor(4)));
    }
}
