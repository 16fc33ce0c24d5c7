use super::{
    Error, ErrorKind, NodeId, NodeKind, SyntaxTree, Token,
    lexer::{TokenKind, tokenize},
    tree::Node,
};

/// The result of parsing a file
///
/// A tree is always produced, nodes that were cut short by an error have no stop token.
#[derive(Clone, Debug)]
pub struct ParseResult {
    pub tree: SyntaxTree,
    pub errors: Vec<Error>,
}

// Binary operators, from lowest to highest precedence
const BINARY_OPERATORS: &[&[TokenKind]] = &[
    &[TokenKind::OrOr],
    &[TokenKind::AndAnd],
    &[TokenKind::EqualEqual, TokenKind::NotEqual],
    &[
        TokenKind::Less,
        TokenKind::Greater,
        TokenKind::LessEqual,
        TokenKind::GreaterEqual,
    ],
    &[TokenKind::Plus, TokenKind::Minus],
    &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
];

pub struct Parser {
    tokens: Vec<Token>,
    nodes: Vec<Node>,
    errors: Vec<Error>,
    // Index of the next token
    position: usize,
    // Index of the most recently consumed token
    last: usize,
}

type ParseOutput = Result<NodeId, Error>;

impl Parser {
    pub fn parse(source: &str) -> ParseResult {
        let (tokens, errors) = tokenize(source);

        // Invalid tokens have already been reported by the lexer
        let tokens = tokens
            .into_iter()
            .filter(|token| token.kind != TokenKind::Error)
            .collect();

        let mut parser = Self {
            tokens,
            nodes: Vec::new(),
            errors,
            position: 0,
            last: 0,
        };

        let file = parser.start_node(NodeKind::File, None);
        parser.statements(file, false);
        parser.finish_node(file);

        ParseResult {
            tree: SyntaxTree {
                tokens: parser.tokens,
                nodes: parser.nodes,
            },
            errors: parser.errors,
        }
    }

    fn statements(&mut self, parent: NodeId, in_block: bool) {
        loop {
            while self.eat(TokenKind::Semicolon) {}

            let start = self.position;
            let result = match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::RBrace if in_block => break,
                TokenKind::Import if !in_block => self.import(parent),
                _ => self.statement(parent),
            };

            if let Err(error) = result {
                self.errors.push(error);
                self.synchronize(start, in_block);
            }
        }
    }

    // Skips ahead to a token that could start a new statement
    fn synchronize(&mut self, start: usize, in_block: bool) {
        use TokenKind::*;

        // A closing brace is left for the enclosing block to consume
        let at_boundary = matches!(
            self.peek_kind(),
            Import | Fun | Var | Val | Return | If | While
        ) || (in_block && self.at(RBrace));
        if self.position == start || !at_boundary {
            self.advance();
        }
        while !matches!(
            self.peek_kind(),
            Eof | RBrace | Semicolon | Import | Fun | Var | Val | Return | If | While
        ) {
            self.advance();
        }
    }

    fn import(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::Import, Some(parent));
        self.advance();
        match self.peek_kind() {
            TokenKind::Identifier => self.leaf(NodeKind::Identifier, node),
            TokenKind::Str => self.leaf(NodeKind::Literal, node),
            _ => return Err(self.unexpected("import path")),
        };
        Ok(self.finish_node(node))
    }

    fn statement(&mut self, parent: NodeId) -> ParseOutput {
        match self.peek_kind() {
            TokenKind::Var | TokenKind::Val => self.var_decl(parent),
            TokenKind::Fun => self.routine_decl(parent),
            TokenKind::Return => self.return_statement(parent),
            TokenKind::If => self.if_statement(parent),
            TokenKind::While => self.while_statement(parent),
            TokenKind::Identifier if self.peek_kind_at(1) == TokenKind::Assign => {
                self.assignment(parent)
            }
            _ => {
                let node = self.start_node(NodeKind::ExprStatement, Some(parent));
                self.expression(node)?;
                Ok(self.finish_node(node))
            }
        }
    }

    fn var_decl(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::VarDecl, Some(parent));
        self.advance();
        self.expect_leaf(TokenKind::Identifier, NodeKind::Identifier, node, "variable name")?;
        if self.eat(TokenKind::Colon) {
            self.expect_leaf(TokenKind::Identifier, NodeKind::TypeRef, node, "type name")?;
        }
        if self.eat(TokenKind::Assign) {
            self.expression(node)?;
        }
        Ok(self.finish_node(node))
    }

    fn routine_decl(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::RoutineDecl, Some(parent));
        self.advance();
        self.expect_leaf(TokenKind::Identifier, NodeKind::Identifier, node, "function name")?;

        let params = self.start_node(NodeKind::Params, Some(node));
        self.expect(TokenKind::LParen, "'('")?;
        if !self.at(TokenKind::RParen) {
            loop {
                let param = self.start_node(NodeKind::Param, Some(params));
                self.expect_leaf(
                    TokenKind::Identifier,
                    NodeKind::Identifier,
                    param,
                    "parameter name",
                )?;
                if self.eat(TokenKind::Colon) {
                    self.expect_leaf(TokenKind::Identifier, NodeKind::TypeRef, param, "type name")?;
                }
                self.finish_node(param);

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.finish_node(params);

        if self.eat(TokenKind::Colon) {
            self.expect_leaf(TokenKind::Identifier, NodeKind::TypeRef, node, "type name")?;
        }

        self.block(node)?;
        Ok(self.finish_node(node))
    }

    fn block(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::Block, Some(parent));
        self.expect(TokenKind::LBrace, "'{'")?;
        self.statements(node, true);
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(self.finish_node(node))
    }

    fn return_statement(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::Return, Some(parent));
        self.advance();
        // The returned value has to start on the same line as the keyword
        if self.peek_kind().can_start_expression() && self.peek().line == self.previous().line {
            self.expression(node)?;
        }
        Ok(self.finish_node(node))
    }

    fn if_statement(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::If, Some(parent));
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        self.expression(node)?;
        self.expect(TokenKind::RParen, "')'")?;
        self.block(node)?;
        if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                self.if_statement(node)?;
            } else {
                self.block(node)?;
            }
        }
        Ok(self.finish_node(node))
    }

    fn while_statement(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::While, Some(parent));
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        self.expression(node)?;
        self.expect(TokenKind::RParen, "')'")?;
        self.block(node)?;
        Ok(self.finish_node(node))
    }

    fn assignment(&mut self, parent: NodeId) -> ParseOutput {
        let node = self.start_node(NodeKind::Assign, Some(parent));
        self.leaf(NodeKind::Identifier, node);
        self.advance(); // =
        self.expression(node)?;
        Ok(self.finish_node(node))
    }

    fn expression(&mut self, parent: NodeId) -> ParseOutput {
        self.binary(parent, 0)
    }

    fn binary(&mut self, parent: NodeId, level: usize) -> ParseOutput {
        let Some(operators) = BINARY_OPERATORS.get(level) else {
            return self.unary(parent);
        };

        let mut lhs = self.binary(parent, level + 1)?;
        while operators.contains(&self.peek_kind()) {
            let node = self.wrap(lhs, NodeKind::Binary);
            self.advance();
            self.binary(node, level + 1)?;
            lhs = self.finish_node(node);
        }
        Ok(lhs)
    }

    fn unary(&mut self, parent: NodeId) -> ParseOutput {
        if matches!(self.peek_kind(), TokenKind::Minus | TokenKind::Bang) {
            let node = self.start_node(NodeKind::Unary, Some(parent));
            self.advance();
            self.unary(node)?;
            Ok(self.finish_node(node))
        } else {
            self.call(parent)
        }
    }

    fn call(&mut self, parent: NodeId) -> ParseOutput {
        let mut expression = self.primary(parent)?;

        // Call arguments have to start on the same line as the callee
        while self.at(TokenKind::LParen) && self.peek().line == self.previous().line {
            let call = self.wrap(expression, NodeKind::Call);
            let args = self.start_node(NodeKind::Args, Some(call));
            self.advance();
            if !self.at(TokenKind::RParen) {
                loop {
                    self.expression(args)?;
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            self.finish_node(args);
            expression = self.finish_node(call);
        }

        Ok(expression)
    }

    fn primary(&mut self, parent: NodeId) -> ParseOutput {
        match self.peek_kind() {
            TokenKind::Identifier => Ok(self.leaf(NodeKind::Identifier, parent)),
            TokenKind::Integer | TokenKind::Str | TokenKind::True | TokenKind::False => {
                Ok(self.leaf(NodeKind::Literal, parent))
            }
            TokenKind::LParen => {
                let node = self.start_node(NodeKind::Paren, Some(parent));
                self.advance();
                self.expression(node)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(self.finish_node(node))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn start_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            start: self.position,
            stop: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn finish_node(&mut self, id: NodeId) -> NodeId {
        self.nodes[id.0].stop = Some(self.last.max(self.nodes[id.0].start));
        id
    }

    // Consumes the next token as a single-token node
    fn leaf(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = self.start_node(kind, Some(parent));
        self.advance();
        self.finish_node(id)
    }

    fn expect_leaf(
        &mut self,
        token: TokenKind,
        kind: NodeKind,
        parent: NodeId,
        expected: &'static str,
    ) -> ParseOutput {
        if self.at(token) {
            Ok(self.leaf(kind, parent))
        } else {
            Err(self.unexpected(expected))
        }
    }

    // Inserts a new node between `inner` and its parent, starting at the inner node's first token
    fn wrap(&mut self, inner: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.nodes[inner.0].parent;
        self.nodes.push(Node {
            kind,
            parent,
            children: vec![inner],
            start: self.nodes[inner.0].start,
            stop: None,
        });
        self.nodes[inner.0].parent = Some(id);
        if let Some(parent) = parent {
            for child in self.nodes[parent.0].children.iter_mut() {
                if *child == inner {
                    *child = id;
                }
            }
        }
        id
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.position + offset)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.last]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    // The final Eof token is never consumed
    fn advance(&mut self) {
        if !self.at(TokenKind::Eof) {
            self.last = self.position;
            self.position += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), Error> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> Error {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            format!("'{}'", token.text)
        };
        Error {
            error: ErrorKind::ExpectedToken { expected, found },
            line: token.line,
            column: token.column,
            width: token.width().max(1),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_ok(source: &str) -> SyntaxTree {
        let result = Parser::parse(source);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        result.tree
    }

    fn kinds(tree: &SyntaxTree, node: NodeId) -> Vec<NodeKind> {
        tree.children(node)
            .iter()
            .map(|child| tree.kind(*child))
            .collect()
    }

    #[test]
    fn routine_declaration() {
        let tree = parse_ok(
            "\
fun add(a: Int, b: Int): Int {
  return a + b
}
",
        );

        let routine = tree.children(tree.root())[0];
        assert_eq!(tree.kind(routine), NodeKind::RoutineDecl);
        assert_eq!(
            kinds(&tree, routine),
            [
                NodeKind::Identifier,
                NodeKind::Params,
                NodeKind::TypeRef,
                NodeKind::Block
            ]
        );
        assert_eq!(tree.name(routine).map(|name| tree.text(name)), Some("add"));

        let params = tree.children(routine)[1];
        assert_eq!(kinds(&tree, params), [NodeKind::Param, NodeKind::Param]);

        assert_eq!(tree.start_token(routine).text, "fun");
        assert_eq!(tree.stop_token(routine).map(|t| t.line), Some(3));
    }

    #[test]
    fn binary_expressions_are_wrapped() {
        let tree = parse_ok("var x = a + b * c");

        let declaration = tree.children(tree.root())[0];
        let sum = tree.children(declaration)[1];
        assert_eq!(tree.kind(sum), NodeKind::Binary);
        assert_eq!(tree.parent(sum), Some(declaration));
        assert_eq!(kinds(&tree, sum), [NodeKind::Identifier, NodeKind::Binary]);

        let a = tree.children(sum)[0];
        assert_eq!(tree.parent(a), Some(sum));
        assert_eq!(tree.start_token(sum).text, "a");
        assert_eq!(tree.stop_token(sum).map(|t| t.text.as_str()), Some("c"));
    }

    #[test]
    fn calls_must_start_on_the_same_line() {
        let tree = parse_ok("f(1)\nx\n(y)");

        assert_eq!(
            kinds(&tree, tree.root()),
            [
                NodeKind::ExprStatement,
                NodeKind::ExprStatement,
                NodeKind::ExprStatement
            ]
        );
        let call = tree.children(tree.children(tree.root())[0])[0];
        assert_eq!(tree.kind(call), NodeKind::Call);
    }

    #[test]
    fn imports() {
        let tree = parse_ok("import lib\nimport \"sub/other\"\nlib()");

        let imports: Vec<_> = tree.imports().map(|import| import.path).collect();
        assert_eq!(imports, ["lib", "sub/other"]);
    }

    #[test]
    fn recovery_leaves_incomplete_nodes_unfinished() {
        let result = Parser::parse(
            "\
var a = 1
var b =
}
var c = 3
",
        );
        let tree = result.tree;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 3);

        let declarations = tree.children(tree.root());
        assert_eq!(declarations.len(), 3);
        assert!(tree.stop_token(declarations[0]).is_some());
        assert!(tree.stop_token(declarations[1]).is_none());
        assert!(tree.stop_token(declarations[2]).is_some());
        assert_eq!(tree.name(declarations[2]).map(|n| tree.text(n)), Some("c"));
    }

    #[test]
    fn recovery_inside_block_keeps_the_closing_brace() {
        let result = Parser::parse(
            "\
fun f() {
  var = 1
}
var after = 2
",
        );
        let tree = result.tree;

        assert_eq!(result.errors.len(), 1);

        let statements = tree.children(tree.root());
        assert_eq!(statements.len(), 2);
        assert!(tree.stop_token(statements[0]).is_some());
        assert_eq!(tree.name(statements[1]).map(|n| tree.text(n)), Some("after"));
    }

    #[test]
    fn recovery_keeps_a_following_declaration() {
        let result = Parser::parse("fun\nvar x = 1");
        let tree = result.tree;

        assert_eq!(result.errors.len(), 1);

        let statements = tree.children(tree.root());
        assert_eq!(statements.len(), 2);
        assert!(tree.stop_token(statements[0]).is_none());
        assert_eq!(tree.name(statements[1]).map(|n| tree.text(n)), Some("x"));
    }

    #[test]
    fn identifier_at_position() {
        use tower_lsp_server::lsp_types::Position;

        let tree = parse_ok("var count = 1\nprint(count)");

        let at = |line, character| {
            tree.identifier_at(Position { line, character })
                .map(|node| tree.text(node).to_string())
        };

        assert_eq!(at(0, 4).as_deref(), Some("count"));
        assert_eq!(at(0, 8).as_deref(), Some("count"));
        assert_eq!(at(0, 9), None);
        assert_eq!(at(1, 0).as_deref(), Some("print"));
        assert_eq!(at(1, 6).as_deref(), Some("count"));
        assert_eq!(at(1, 5), None);
        assert_eq!(at(2, 0), None);
        assert_eq!(at(u32::MAX, 0), None);
        assert_eq!(at(0, u32::MAX), None);
    }
}
