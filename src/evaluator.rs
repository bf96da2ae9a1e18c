use std::{
    io::{self, BufRead, Write},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    env::Environment,
    error::{OpError, RuntimeError},
    lexer::Token,
    ops::{cons, intersect, range, BinaryOp, Logic, ShortCircuit, UnaryOp},
    parser::Expr,
    value::{Callable, Value},
};

pub enum Input {
    Stdin,
    Reader(Box<dyn BufRead>),
}

/// Where the `@` operator and the result printer read and write.
pub struct Streams {
    input: Input,
    output: Box<dyn Write>,
    error: Box<dyn Write>,
}

impl Streams {
    pub fn stdio() -> Self {
        Self {
            input: Input::Stdin,
            output: Box::new(io::stdout()),
            error: Box::new(io::stderr()),
        }
    }

    pub fn new(
        input: impl BufRead + 'static,
        output: impl Write + 'static,
        error: impl Write + 'static,
    ) -> Self {
        Self {
            input: Input::Reader(Box::new(input)),
            output: Box::new(output),
            error: Box::new(error),
        }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        match &mut self.input {
            Input::Stdin => io::stdin().read_line(&mut line)?,
            Input::Reader(reader) => reader.read_line(&mut line)?,
        };
        Ok(line)
    }
}

pub struct Evaluator {
    env: Environment,
    streams: Streams,
}

impl Evaluator {
    pub fn new(env: Environment, streams: Streams) -> Self {
        Self { env, streams }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Evaluates each tree in order and prints its result. The first runtime
    /// error ends the batch.
    pub fn interpret(&mut self, expressions: &[Expr<'_>]) -> Result<(), RuntimeError> {
        for expr in expressions {
            let value = self.evaluate(expr)?;
            writeln!(self.streams.output, "{value}")
                .and_then(|()| self.streams.output.flush())
                .map_err(|err| io_failure(expr.token(), err))?;
        }
        Ok(())
    }

    pub fn evaluate(&mut self, expr: &Expr<'_>) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone().into()),
            Expr::Grouping(inner) => self.evaluate(inner),
            // an unbound name quotes itself
            Expr::Variable(name) => Ok(self
                .env
                .get(name.lexeme)
                .unwrap_or_else(|| Value::Symbol(name.lexeme.into()))),
            Expr::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                match UnaryOp::from_token(op.kind) {
                    Some(unary) => unary.apply(&operand).map_err(|err| op_failure(op, err)),
                    None => self.extension_unary(op, operand),
                }
            }
            Expr::Binary { left, op, right } => self.binary(left, op, right),
            Expr::Call {
                callee,
                dollar,
                argument,
            } => match self.evaluate(callee)? {
                Value::Callable(Callable::Unary { func, name }) => {
                    let argument = self.evaluate(argument)?;
                    tracing::trace!(operator = %name, "applying extension");
                    func(argument).map_err(|err| op_failure(dollar, err))
                }
                _ => Err(RuntimeError::new(dollar, "Can only call unary operators.")),
            },
        }
    }

    fn binary(&mut self, left: &Expr<'_>, op: &Token<'_>, right: &Expr<'_>) -> Result<Value, RuntimeError> {
        let Some(kind) = BinaryOp::from_token(op.kind) else {
            let (l, r) = self.operands(left, right)?;
            return self.extension_binary(op, l, r);
        };

        let result = match kind {
            BinaryOp::Assign => return self.assign(op, left, right),
            BinaryOp::Logic {
                op: logic,
                short_circuit: true,
            } => return self.short_circuit(op, logic, left, right),
            BinaryOp::Io => {
                let (l, r) = self.operands(left, right)?;
                return self.io(op, l, r);
            }
            BinaryOp::Arith(arith) => {
                let (l, r) = self.operands(left, right)?;
                arith.apply(&l, &r)
            }
            BinaryOp::Compare(compare) => {
                let (l, r) = self.operands(left, right)?;
                compare.apply(&l, &r)
            }
            BinaryOp::Logic { op: logic, .. } => {
                let (l, r) = self.operands(left, right)?;
                logic.apply(&l, &r)
            }
            BinaryOp::Cons => {
                let (l, r) = self.operands(left, right)?;
                Ok(cons(l, r))
            }
            BinaryOp::Intersect => {
                let (l, r) = self.operands(left, right)?;
                Ok(intersect(&l, &r))
            }
            BinaryOp::Range => {
                let (l, r) = self.operands(left, right)?;
                range(&l, &r)
            }
        };
        result.map_err(|err| op_failure(op, err))
    }

    /// Left first, then right.
    fn operands(&mut self, left: &Expr<'_>, right: &Expr<'_>) -> Result<(Value, Value), RuntimeError> {
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;
        Ok((l, r))
    }

    fn assign(&mut self, op: &Token<'_>, target: &Expr<'_>, value: &Expr<'_>) -> Result<Value, RuntimeError> {
        let Expr::Variable(name) = target else {
            return Err(RuntimeError::new(op, "Invalid assignment target."));
        };
        let value = self.evaluate(value)?;
        self.env.set(name.lexeme, value.clone());
        Ok(value)
    }

    fn short_circuit(
        &mut self,
        op: &Token<'_>,
        logic: Logic,
        left: &Expr<'_>,
        right: &Expr<'_>,
    ) -> Result<Value, RuntimeError> {
        let l = self.evaluate(left)?;
        if !logic.proceed(&l).map_err(|err| op_failure(op, err))? {
            return Ok(Value::Boolean(logic.short_circuit_value()));
        }
        let r = self.evaluate(right)?;
        logic.apply(&l, &r).map_err(|err| op_failure(op, err))
    }

    /// `value @ "out"` and friends. Every form passes the left value through
    /// except `"now"`, which yields the epoch seconds.
    fn io(&mut self, op: &Token<'_>, left: Value, right: Value) -> Result<Value, RuntimeError> {
        let Value::Text(command) = &right else {
            return Ok(left);
        };
        let failed = |err| io_failure(op, err);
        match &**command {
            "in" => {
                // the line is consumed but the result is still the left operand
                let line = self.streams.read_line().map_err(failed)?;
                tracing::trace!(line = line.trim_end(), "read line");
                Ok(left)
            }
            "out" => {
                writeln!(self.streams.output, "{left}")
                    .and_then(|()| self.streams.output.flush())
                    .map_err(failed)?;
                Ok(left)
            }
            "err" => {
                writeln!(self.streams.error, "{left}").map_err(failed)?;
                Ok(left)
            }
            "now" => {
                let seconds = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |elapsed| elapsed.as_secs());
                Ok(Value::Integer(seconds.into()))
            }
            _ => Ok(left),
        }
    }

    fn extension_unary(&self, op: &Token<'_>, operand: Value) -> Result<Value, RuntimeError> {
        match self.env.extension(op.lexeme) {
            Some(Callable::Unary { func, .. }) => {
                tracing::trace!(operator = op.lexeme, "applying extension");
                func(operand).map_err(|err| op_failure(op, err))
            }
            _ => Err(unknown_operator(op)),
        }
    }

    fn extension_binary(&self, op: &Token<'_>, left: Value, right: Value) -> Result<Value, RuntimeError> {
        match self.env.extension(op.lexeme) {
            Some(Callable::Binary { func, .. }) => {
                tracing::trace!(operator = op.lexeme, "applying extension");
                func(left, right).map_err(|err| op_failure(op, err))
            }
            _ => Err(unknown_operator(op)),
        }
    }
}

fn op_failure(op: &Token<'_>, err: OpError) -> RuntimeError {
    RuntimeError::new(op, err.to_string())
}

fn io_failure(token: &Token<'_>, err: io::Error) -> RuntimeError {
    RuntimeError::new(token, format!("I/O failure: {err}"))
}

fn unknown_operator(op: &Token<'_>) -> RuntimeError {
    RuntimeError::new(op, format!("Unknown operator '{}'.", op.lexeme))
}
