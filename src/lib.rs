pub mod builtins;
pub mod decimal;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod value;

use miette::Diagnostic;
use thiserror::Error;

pub use env::Environment;
pub use error::{Diagnostics, OpError, RuntimeError, SyntaxError};
pub use evaluator::{Evaluator, Streams};
pub use lexer::{scan, Lexer, Token, TokenKind};
pub use parser::{parse, Expr};
pub use value::{Arity, Callable, Value};

/// Why a run stopped early.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum RunError {
    /// Nothing was evaluated.
    #[error("{} syntax error(s)", .0.len())]
    Syntax(#[related] Vec<SyntaxError>),
    /// Earlier expressions of the batch were evaluated and printed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(RuntimeError),
}

impl RunError {
    /// Conventional process exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Syntax(_) => 65,
            RunError::Runtime(_) => 70,
        }
    }
}

/// One interpreter session. The environment persists across calls to [`Interpreter::run`].
pub struct Interpreter {
    evaluator: Evaluator,
}

impl Interpreter {
    /// A session on the process's standard streams with the built-in extensions registered.
    pub fn new() -> Self {
        Self::with_streams(Streams::stdio())
    }

    pub fn with_streams(streams: Streams) -> Self {
        Self {
            evaluator: Evaluator::new(Environment::with_builtins(), streams),
        }
    }

    pub fn env(&self) -> &Environment {
        self.evaluator.env()
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        self.evaluator.env_mut()
    }

    /// Scans, parses and interprets `source`, printing each top-level result.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let (tokens, mut diagnostics) = lexer::scan(source);
        tracing::debug!(tokens = tokens.len(), "scanned");

        let parsed = parser::Parser::new(tokens)
            .with_extensions(self.evaluator.env().extension_arities())
            .parse();
        let trees = match parsed {
            Ok(trees) => trees,
            Err(err) => {
                diagnostics.report(err);
                Vec::new()
            }
        };
        if diagnostics.had_error() {
            return Err(RunError::Syntax(diagnostics.into_errors()));
        }

        tracing::debug!(trees = trees.len(), "parsed");
        self.evaluator.interpret(&trees).map_err(|err| {
            tracing::debug!(line = err.line, message = %err.message, "runtime error");
            RunError::Runtime(err)
        })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
