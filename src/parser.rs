use std::collections::HashMap;

use crate::{
    error::SyntaxError,
    lexer::{Literal, Token, TokenKind},
    ops::BinaryOp,
    value::Arity,
};

/// Expression tree. Each top-level expression of an input is its own tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    Literal {
        token: Token<'a>,
        value: Literal,
    },
    Variable(Token<'a>),
    Grouping(Box<Expr<'a>>),
    Unary {
        op: Token<'a>,
        operand: Box<Expr<'a>>,
    },
    Binary {
        left: Box<Expr<'a>>,
        op: Token<'a>,
        right: Box<Expr<'a>>,
    },
    /// `callee $ argument`
    Call {
        callee: Box<Expr<'a>>,
        dollar: Token<'a>,
        argument: Box<Expr<'a>>,
    },
}

impl<'a> Expr<'a> {
    /// The token a diagnostic about this node points at.
    pub fn token(&self) -> &Token<'a> {
        match self {
            Expr::Literal { token, .. } | Expr::Variable(token) => token,
            Expr::Grouping(inner) => inner.token(),
            Expr::Unary { op, .. } | Expr::Binary { op, .. } => op,
            Expr::Call { dollar, .. } => dollar,
        }
    }
}

/// Prints the tree in parenthesized prefix form, e.g. `(+ 1 (group 2))`.
impl<'a> std::fmt::Display for Expr<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal { value, .. } => write!(f, "{value}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Grouping(inner) => write!(f, "(group {inner})"),
            Expr::Unary { op, operand } => write!(f, "({op} {operand})"),
            Expr::Binary { left, op, right } => write!(f, "({op} {left} {right})"),
            Expr::Call {
                callee, argument, ..
            } => write!(f, "($ {callee} {argument})"),
        }
    }
}

/// Deepest nesting of groupings, prefix operators and chained assignments.
pub const MAX_NESTING: usize = 256;

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    current: usize,
    depth: usize,
    extensions: HashMap<String, Arity>,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (offset, line) = tokens
                .last()
                .map_or((0, 1), |t| (t.offset + t.lexeme.len(), t.line));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: "",
                offset,
                line,
            });
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
            extensions: HashMap::new(),
        }
    }

    /// Identifiers bound to operator extensions; they parse as infix (binary)
    /// or prefix (unary) operators.
    pub fn with_extensions(mut self, extensions: HashMap<String, Arity>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Parses every expression up to end of input. The first syntax error aborts the parse.
    pub fn parse(&mut self) -> Result<Vec<Expr<'a>>, SyntaxError> {
        let mut expressions = Vec::new();
        while !self.is_at_end() {
            expressions.push(self.expression()?);
        }
        Ok(expressions)
    }

    fn expression(&mut self) -> Result<Expr<'a>, SyntaxError> {
        self.binary(true)
    }

    /// All binary operators share one precedence level and associate to the left,
    /// except assignment to a name. With `chain` unset, `$` is left for an
    /// enclosing application.
    fn binary(&mut self, chain: bool) -> Result<Expr<'a>, SyntaxError> {
        let mut expr = self.unary(chain)?;
        while let Some(op) = self.match_binary() {
            // `name : ...` stores the value of the whole remaining expression
            let assigns = matches!(expr, Expr::Variable(_))
                && BinaryOp::from_token(op.kind) == Some(BinaryOp::Assign);
            let right = if assigns {
                self.enter(&op)?;
                let right = self.binary(chain);
                self.depth -= 1;
                right?
            } else {
                self.unary(chain)?
            };
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self, chain: bool) -> Result<Expr<'a>, SyntaxError> {
        let token = self.peek();
        let prefix = match token.kind {
            TokenKind::Tilde | TokenKind::Minus => true,
            TokenKind::Identifier => {
                self.extension(token.lexeme) == Some(Arity::Unary)
                    && starts_operand(self.peek_next().kind)
            }
            _ => false,
        };
        if prefix {
            let op = self.advance();
            self.enter(&op)?;
            let operand = self.unary(chain);
            self.depth -= 1;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand?),
            });
        }
        self.call(chain)
    }

    /// `f $ x $ y` applies left to right: `(f $ x) $ y`. Each argument runs up
    /// to the next `$` at the same nesting level.
    fn call(&mut self, chain: bool) -> Result<Expr<'a>, SyntaxError> {
        let mut expr = self.primary()?;
        if !chain {
            return Ok(expr);
        }
        while self.check(TokenKind::Dollar) {
            let dollar = self.advance();
            let argument = self.binary(false)?;
            expr = Expr::Call {
                callee: Box::new(expr),
                dollar,
                argument: Box::new(argument),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let token = self.peek();
        match token.kind {
            TokenKind::False
            | TokenKind::True
            | TokenKind::Null
            | TokenKind::Number
            | TokenKind::String => {
                self.advance();
                let value = token
                    .literal()
                    .ok_or_else(|| SyntaxError::at_token(&token, "Invalid literal."))?;
                Ok(Expr::Literal { token, value })
            }
            TokenKind::Identifier => Ok(Expr::Variable(self.advance())),
            TokenKind::LeftParen => self.grouping(TokenKind::RightParen, "Expect ')' after expression."),
            TokenKind::LeftBracket => {
                self.grouping(TokenKind::RightBracket, "Expect ']' after expression.")
            }
            TokenKind::LeftBrace => self.grouping(TokenKind::RightBrace, "Expect '}' after expression."),
            _ => Err(SyntaxError::at_token(&token, "Expect expression.")),
        }
    }

    fn grouping(&mut self, close: TokenKind, message: &str) -> Result<Expr<'a>, SyntaxError> {
        let open = self.advance();
        self.enter(&open)?;
        let expr = self.expression();
        self.depth -= 1;
        let expr = expr?;
        self.consume(close, message)?;
        Ok(Expr::Grouping(Box::new(expr)))
    }

    fn enter(&mut self, token: &Token<'a>) -> Result<(), SyntaxError> {
        if self.depth == MAX_NESTING {
            return Err(SyntaxError::at_token(token, "Expression nested too deeply."));
        }
        self.depth += 1;
        Ok(())
    }

    fn match_binary(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        let is_operator = match token.kind {
            TokenKind::Identifier => self.extension(token.lexeme) == Some(Arity::Binary),
            kind => BinaryOp::from_token(kind).is_some(),
        };
        is_operator.then(|| self.advance())
    }

    fn extension(&self, name: &str) -> Option<Arity> {
        self.extensions.get(name).copied()
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token<'a>, SyntaxError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(SyntaxError::at_token(&self.peek(), message))
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> Token<'a> {
        self.tokens[self.current]
    }

    fn peek_next(&self) -> Token<'a> {
        self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
}

/// Whether a token can begin the operand of a prefix operator.
fn starts_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number
            | TokenKind::String
            | TokenKind::Identifier
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::LeftBrace
            | TokenKind::Tilde
            | TokenKind::Minus
    )
}

pub fn parse(tokens: Vec<Token<'_>>) -> Result<Vec<Expr<'_>>, SyntaxError> {
    Parser::new(tokens).parse()
}
