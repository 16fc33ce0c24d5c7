use tower_lsp_server::lsp_types::Position;

use super::Token;

/// The index of a [Node] in its [SyntaxTree]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Import,
    VarDecl,
    RoutineDecl,
    Params,
    Param,
    TypeRef,
    Block,
    Identifier,
    Literal,
    Return,
    If,
    While,
    Assign,
    ExprStatement,
    Call,
    Args,
    Binary,
    Unary,
    Paren,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    // Index of the node's first token
    pub start: usize,
    // Index of the node's last token, missing if parsing of the node was cut short
    pub stop: Option<usize>,
}

/// An import directive found at the top level of a file
#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    /// The import directive's node
    pub node: NodeId,
    /// The imported path without the file extension, e.g. `foo` or `sub/foo`
    pub path: String,
}

/// A parsed file
///
/// Nodes are stored in an arena with the file node at index 0.
#[derive(Clone, Debug)]
pub struct SyntaxTree {
    pub(super) tokens: Vec<Token>,
    pub(super) nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn start_token(&self, id: NodeId) -> &Token {
        &self.tokens[self.node(id).start]
    }

    pub fn stop_token(&self, id: NodeId) -> Option<&Token> {
        self.node(id).stop.map(|stop| &self.tokens[stop])
    }

    /// The text of the node's first token, for identifiers this is the name
    pub fn text(&self, id: NodeId) -> &str {
        &self.start_token(id).text
    }

    /// The identifier naming a declaration node
    pub fn name(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.kind(*child) == NodeKind::Identifier)
    }

    /// Iterates over the node and its ancestors, ending at the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |node| self.parent(*node))
    }

    pub fn imports(&self) -> impl Iterator<Item = Import> + '_ {
        self.children(self.root())
            .iter()
            .filter(|child| self.kind(**child) == NodeKind::Import)
            .filter_map(|import| {
                let target = *self.children(*import).first()?;
                let path = match self.kind(target) {
                    NodeKind::Identifier => self.text(target),
                    NodeKind::Literal => self.text(target).trim_matches('"'),
                    _ => return None,
                };
                Some(Import {
                    node: *import,
                    path: path.to_string(),
                })
            })
    }

    /// Finds the identifier containing the given zero-based position
    pub fn identifier_at(&self, position: Position) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind == NodeKind::Identifier)
            .map(|(index, _)| NodeId(index))
            .find(|id| {
                let token = self.start_token(*id);
                // Token lines are 1-based
                token.line - 1 == position.line
                    && token.column <= position.character
                    && position.character < token.column + token.width()
            })
    }
}
