use std::{iter::Peekable, str::CharIndices};

use super::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Import,
    Fun,
    Var,
    Val,
    Return,
    If,
    Else,
    While,
    True,
    False,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    AndAnd,
    OrOr,
    Bang,
    // Everything else
    Identifier,
    Integer,
    Str,
    Error,
    Eof,
}

impl TokenKind {
    pub fn can_start_expression(self) -> bool {
        use TokenKind::*;

        matches!(
            self,
            Identifier | Integer | Str | True | False | LParen | Minus | Bang
        )
    }
}

/// A lexed token
///
/// Lines are 1-based, columns are 0-based and counted in UTF-16 code units.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// The token's width in UTF-16 code units
    pub fn width(&self) -> u32 {
        self.text.encode_utf16().count() as u32
    }
}

/// Splits the source into tokens, the last of which is always [TokenKind::Eof]
///
/// Unrecognized input produces [TokenKind::Error] tokens along with a matching error.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Error>) {
    let lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
        line: 1,
        column: 0,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lexer.run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    errors: Vec<Error>,
}

impl Lexer<'_> {
    fn run(mut self) -> (Vec<Token>, Vec<Error>) {
        while let Some(c) = self.peek() {
            let (line, column, start) = (self.line, self.column, self.offset());

            let kind = match c {
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '/' if self.peek_second() == Some('/') => {
                    self.bump_while(|c| c != '\n');
                    continue;
                }
                c if is_identifier_start(c) => {
                    self.bump_while(is_identifier_continue);
                    let end = self.offset();
                    keyword_or_identifier(&self.source[start..end])
                }
                c if c.is_ascii_digit() => {
                    self.bump_while(|c| c.is_ascii_digit());
                    TokenKind::Integer
                }
                '"' => self.string(),
                c => self.punctuation(c),
            };

            let end = self.offset();
            let text = self.source[start..end].to_string();
            if kind == TokenKind::Error {
                let error = if text.starts_with('"') {
                    ErrorKind::UnterminatedString
                } else {
                    ErrorKind::UnexpectedCharacter(c)
                };
                self.errors.push(Error {
                    error,
                    line,
                    column,
                    width: text.encode_utf16().count() as u32,
                });
            }

            self.tokens.push(Token {
                kind,
                text,
                line,
                column,
            });
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line: self.line,
            column: self.column,
        });

        debug_assert!(is_sorted::IsSorted::is_sorted_by_key(
            &mut self.tokens.iter(),
            |token| (token.line, token.column)
        ));

        (self.tokens, self.errors)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map_or(self.source.len(), |(offset, _)| *offset)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += c.len_utf16() as u32;
        }
        Some(c)
    }

    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn string(&mut self) -> TokenKind {
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None | Some('\n') => return TokenKind::Error,
                Some('"') => {
                    self.bump();
                    return TokenKind::Str;
                }
                Some('\\') => {
                    self.bump();
                    if self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn punctuation(&mut self, c: char) -> TokenKind {
        use TokenKind::*;

        self.bump();
        match c {
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            ',' => Comma,
            ':' => Colon,
            ';' => Semicolon,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '<' if self.eat('=') => LessEqual,
            '<' => Less,
            '>' if self.eat('=') => GreaterEqual,
            '>' => Greater,
            '=' if self.eat('=') => EqualEqual,
            '=' => Assign,
            '!' if self.eat('=') => NotEqual,
            '!' => Bang,
            '&' if self.eat('&') => AndAnd,
            '|' if self.eat('|') => OrOr,
            _ => TokenKind::Error,
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn keyword_or_identifier(text: &str) -> TokenKind {
    use TokenKind::*;

    match text {
        "import" => Import,
        "fun" => Fun,
        "var" => Var,
        "val" => Val,
        "return" => Return,
        "if" => If,
        "else" => Else,
        "while" => While,
        "true" => True,
        "false" => False,
        _ => Identifier,
    }
}
