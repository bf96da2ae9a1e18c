use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::error::{Diagnostics, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    /// Byte offset of the lexeme in the scanned source.
    pub offset: usize,
    /// 1-based line the lexeme starts on.
    pub line: usize,
}

impl<'a> Token<'a> {
    /// The constant value carried by a literal token.
    pub fn literal(&self) -> Option<Literal> {
        match self.kind {
            TokenKind::Number if self.lexeme.contains('.') => {
                BigDecimal::from_str(self.lexeme).ok().map(Literal::Decimal)
            }
            TokenKind::Number => BigInt::from_str(self.lexeme).ok().map(Literal::Integer),
            TokenKind::String => {
                let text = &self.lexeme[1..self.lexeme.len() - 1];
                Some(Literal::Text(text.to_string()))
            }
            TokenKind::True => Some(Literal::Boolean(true)),
            TokenKind::False => Some(Literal::Boolean(false)),
            TokenKind::Null => Some(Literal::Null),
            _ => None,
        }
    }
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    LessGreater,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Pipe,
    PipePipe,
    Ampersand,
    AmpersandAmpersand,
    Tilde,
    Semicolon,
    At,
    Colon,
    ColonEqual,
    Dollar,
    Dot,
    DotDot,
    String,
    Number,
    Identifier,
    False,
    True,
    Null,
    This,
    Left,
    Right,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(BigInt),
    Decimal(BigDecimal),
    Text(String),
    Boolean(bool),
    Null,
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Decimal(d) => write!(f, "{d}"),
            Literal::Text(s) => write!(f, "\"{s}\""),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug)]
pub struct Lexer<'a> {
    rest: &'a str,
    byte: usize,
    line: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            byte: 0,
            line: 1,
            finished: false,
        }
    }

    /// Moves past `len` more bytes of the current lexeme.
    fn bump(&mut self, len: usize) {
        self.byte += len;
        self.rest = &self.rest[len..];
    }
}

/// Scans the whole source. Unrecognized input is reported and skipped, so the
/// token list is always terminated by a single `Eof`.
pub fn scan(source: &str) -> (Vec<Token<'_>>, Diagnostics) {
    let mut tokens = Vec::new();
    let mut diagnostics = Diagnostics::new();
    for item in Lexer::new(source) {
        match item {
            Ok(token) => tokens.push(token),
            Err(err) => diagnostics.report(err),
        }
    }
    (tokens, diagnostics)
}

fn is_ident(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_' | '0'..='9')
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut chars = self.rest.chars();
            let Some(c) = chars.next() else {
                if self.finished {
                    return None;
                }
                self.finished = true;
                return Some(Ok(Token {
                    kind: TokenKind::Eof,
                    lexeme: "",
                    offset: self.byte,
                    line: self.line,
                }));
            };
            let offset = self.byte;
            let line = self.line;
            let c_onwards = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Started {
                String,
                Number,
                Identifier,
                IfNextElse(char, TokenKind, TokenKind),
                Less,
                Comment,
            }

            let make_token = |kind: TokenKind, len: usize| {
                Some(Ok(Token {
                    kind,
                    lexeme: &c_onwards[..len],
                    offset,
                    line,
                }))
            };

            let started = match c {
                '(' => return make_token(TokenKind::LeftParen, 1),
                ')' => return make_token(TokenKind::RightParen, 1),
                '[' => return make_token(TokenKind::LeftBracket, 1),
                ']' => return make_token(TokenKind::RightBracket, 1),
                '{' => return make_token(TokenKind::LeftBrace, 1),
                '}' => return make_token(TokenKind::RightBrace, 1),
                '-' => return make_token(TokenKind::Minus, 1),
                '+' => return make_token(TokenKind::Plus, 1),
                ';' => return make_token(TokenKind::Semicolon, 1),
                '*' => return make_token(TokenKind::Star, 1),
                '=' => return make_token(TokenKind::Equal, 1),
                '~' => return make_token(TokenKind::Tilde, 1),
                '^' => return make_token(TokenKind::Caret, 1),
                '%' => return make_token(TokenKind::Percent, 1),
                '@' => return make_token(TokenKind::At, 1),
                '/' => return make_token(TokenKind::Slash, 1),
                '$' => return make_token(TokenKind::Dollar, 1),
                ':' => Started::IfNextElse('=', TokenKind::ColonEqual, TokenKind::Colon),
                '>' => Started::IfNextElse('=', TokenKind::GreaterEqual, TokenKind::Greater),
                '|' => Started::IfNextElse('|', TokenKind::PipePipe, TokenKind::Pipe),
                '&' => Started::IfNextElse('&', TokenKind::AmpersandAmpersand, TokenKind::Ampersand),
                '.' => Started::IfNextElse('.', TokenKind::DotDot, TokenKind::Dot),
                '<' => Started::Less,
                '#' => Started::Comment,
                '"' => Started::String,
                '0'..='9' => Started::Number,
                'a'..='z' | 'A'..='Z' | '_' => Started::Identifier,
                '\n' => {
                    self.line += 1;
                    continue;
                }
                ',' => continue,
                c if c.is_whitespace() => continue,
                _ => {
                    return Some(Err(SyntaxError::at_char(
                        line,
                        offset,
                        c.len_utf8(),
                        "Unexpected character.",
                    )))
                }
            };

            match started {
                Started::IfNextElse(next, yes, no) => {
                    if self.rest.starts_with(next) {
                        self.bump(1);
                        return make_token(yes, 2);
                    }
                    return make_token(no, 1);
                }
                Started::Less => {
                    if self.rest.starts_with('=') {
                        self.bump(1);
                        return make_token(TokenKind::LessEqual, 2);
                    }
                    if self.rest.starts_with('>') {
                        self.bump(1);
                        return make_token(TokenKind::LessGreater, 2);
                    }
                    return make_token(TokenKind::Less, 1);
                }
                Started::Comment => {
                    let line_end = self.rest.find('\n').unwrap_or(self.rest.len());
                    self.bump(line_end);
                    continue;
                }
                Started::String => {
                    let Some(end) = self.rest.find('"') else {
                        let err = SyntaxError::at_char(
                            line,
                            offset,
                            c_onwards.len(),
                            "Unterminated string.",
                        );
                        self.line += self.rest.matches('\n').count();
                        self.bump(self.rest.len());
                        return Some(Err(err));
                    };
                    self.line += self.rest[..end].matches('\n').count();
                    self.bump(end + 1);
                    return make_token(TokenKind::String, end + 2);
                }
                Started::Number => {
                    let mut end = self
                        .rest
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(self.rest.len());
                    let fraction = &self.rest[end..];
                    if fraction.starts_with('.')
                        && fraction[1..].starts_with(|c: char| c.is_ascii_digit())
                    {
                        end += 1 + fraction[1..]
                            .find(|c: char| !c.is_ascii_digit())
                            .unwrap_or(fraction.len() - 1);
                    }
                    self.bump(end);
                    return make_token(TokenKind::Number, end + 1);
                }
                Started::Identifier => {
                    let end = self.rest.find(|c| !is_ident(c)).unwrap_or(self.rest.len());
                    self.bump(end);
                    let literal = &c_onwards[..end + 1];

                    let kind = match literal {
                        "false" => TokenKind::False,
                        "true" => TokenKind::True,
                        "null" => TokenKind::Null,
                        "this" => TokenKind::This,
                        "left" => TokenKind::Left,
                        "right" => TokenKind::Right,
                        _ => TokenKind::Identifier,
                    };

                    return make_token(kind, literal.len());
                }
            }
        }
    }
}
