use std::{cell::RefCell, fmt, rc::Rc};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::{error::OpError, lexer::Literal};

/// Shared, growable sequence. Every holder of a `List` sees mutations made through cons.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

type ListPtr = *const RefCell<Vec<Value>>;

pub type UnaryFn = dyn Fn(Value) -> Result<Value, OpError>;
pub type BinaryFn = dyn Fn(Value, Value) -> Result<Value, OpError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Unary,
    Binary,
}

/// An operator extension bound in the environment.
#[derive(Clone)]
pub enum Callable {
    Unary { name: Rc<str>, func: Rc<UnaryFn> },
    Binary { name: Rc<str>, func: Rc<BinaryFn> },
}

impl Callable {
    pub fn unary(name: &str, func: impl Fn(Value) -> Result<Value, OpError> + 'static) -> Self {
        Callable::Unary {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn binary(
        name: &str,
        func: impl Fn(Value, Value) -> Result<Value, OpError> + 'static,
    ) -> Self {
        Callable::Binary {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Unary { name, .. } | Callable::Binary { name, .. } => name,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Callable::Unary { .. } => Arity::Unary,
            Callable::Binary { .. } => Arity::Binary,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({:?}, {})", self.arity(), self.name())
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Unary { func: a, .. }, Callable::Unary { func: b, .. }) => Rc::ptr_eq(a, b),
            (Callable::Binary { func: a, .. }, Callable::Binary { func: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Decimal(BigDecimal),
    Integer(BigInt),
    Boolean(bool),
    Text(Rc<str>),
    List(ListRef),
    /// A name that had no binding when it was evaluated.
    Symbol(Rc<str>),
    Callable(Callable),
}

/// A value reduced to a number for arithmetic and comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Integer(BigInt),
    Decimal(BigDecimal),
}

impl Number {
    pub fn to_decimal(&self) -> BigDecimal {
        match self {
            Number::Integer(n) => BigDecimal::new(n.clone(), 0),
            Number::Decimal(d) => d.clone(),
        }
    }

    /// Truncates toward zero.
    pub fn to_integer(&self) -> BigInt {
        match self {
            Number::Integer(n) => n.clone(),
            Number::Decimal(d) => d.with_scale(0).into_bigint_and_exponent().0,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Integer(n) => n.is_zero(),
            Number::Decimal(d) => d.is_zero(),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Decimal(d) => Value::Decimal(d),
        }
    }
}

impl Value {
    pub fn new_list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn text(s: &str) -> Self {
        Value::Text(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Value::Integer(BigInt::from(n))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Decimal(_) => "Decimal",
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::Text(_) => "Text",
            Value::List(_) => "List",
            Value::Symbol(_) => "Symbol",
            Value::Callable(_) => "Callable",
        }
    }

    /// Numeric coercion: booleans are 0/1, text is its length, a list its element count.
    pub fn to_number(&self) -> Result<Number, OpError> {
        match self {
            Value::Decimal(d) => Ok(Number::Decimal(d.clone())),
            Value::Integer(n) => Ok(Number::Integer(n.clone())),
            Value::Boolean(b) => Ok(Number::Integer(BigInt::from(u8::from(*b)))),
            Value::Text(s) => Ok(Number::Integer(BigInt::from(s.chars().count()))),
            Value::List(items) => Ok(Number::Integer(BigInt::from(items.borrow().len()))),
            Value::Symbol(_) | Value::Callable(_) => Err(OpError::NotCoercible(self.kind())),
        }
    }

    pub fn is_truthy(&self) -> Result<bool, OpError> {
        match self {
            Value::Decimal(d) => Ok(!d.is_zero()),
            Value::Integer(n) => Ok(!n.is_zero()),
            Value::Boolean(b) => Ok(*b),
            Value::Text(s) => Ok(!s.is_empty()),
            Value::List(items) => Ok(!items.borrow().is_empty()),
            Value::Symbol(_) | Value::Callable(_) => Err(OpError::NotCoercible(self.kind())),
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<ListPtr>) -> fmt::Result {
        match self {
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Symbol(name) => write!(f, "{name}"),
            Value::Callable(c) => write!(f, "<{} operator {}>", arity_name(c.arity()), c.name()),
            Value::List(items) => {
                let ptr = Rc::as_ptr(items);
                if open.contains(&ptr) {
                    return write!(f, "[...]");
                }
                open.push(ptr);
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f, open)?;
                }
                open.pop();
                write!(f, "]")
            }
        }
    }
}

fn arity_name(arity: Arity) -> &'static str {
    match arity {
        Arity::Unary => "unary",
        Arity::Binary => "binary",
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Integer(n) => Value::Integer(n),
            Literal::Decimal(d) => Value::Decimal(d),
            Literal::Text(s) => Value::Text(s.into()),
            Literal::Boolean(b) => Value::Boolean(b),
            Literal::Null => Value::new_list(Vec::new()),
        }
    }
}

/// Structural equality, used for set membership. Kinds never compare equal to each other.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_nested(other, &mut Vec::new())
    }
}

impl Value {
    /// `open` holds the list pairs being compared further up; meeting one
    /// again means both sides repeat the same way from there on.
    fn eq_nested(&self, other: &Value, open: &mut Vec<(ListPtr, ListPtr)>) -> bool {
        match (self, other) {
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
                if open.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                open.push(pair);
                let equal = a.iter().zip(b.iter()).all(|(x, y)| x.eq_nested(y, open));
                open.pop();
                equal
            }
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, &mut Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_coercion() {
        assert_eq!(Value::Boolean(true).to_number(), Ok(Number::Integer(1.into())));
        assert_eq!(Value::text("héllo").to_number(), Ok(Number::Integer(5.into())));
        let list = Value::new_list(vec![Value::integer(1), Value::integer(2)]);
        assert_eq!(list.to_number(), Ok(Number::Integer(2.into())));
        assert_eq!(
            Value::Symbol("x".into()).to_number(),
            Err(OpError::NotCoercible("Symbol"))
        );
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(Value::integer(0).is_truthy(), Ok(false));
        assert_eq!(Value::Decimal(BigDecimal::from_str("0.5").unwrap()).is_truthy(), Ok(true));
        assert_eq!(Value::text("").is_truthy(), Ok(false));
        assert_eq!(Value::new_list(vec![]).is_truthy(), Ok(false));
        assert_eq!(Value::new_list(vec![Value::Boolean(false)]).is_truthy(), Ok(true));
    }

    #[test]
    fn test_truncation() {
        let n = Number::Decimal(BigDecimal::from_str("-7.9").unwrap());
        assert_eq!(n.to_integer(), BigInt::from(-7));
    }

    #[test]
    fn test_display() {
        let inner = Value::new_list(vec![Value::text("a"), Value::Boolean(true)]);
        let list = Value::new_list(vec![Value::integer(1), inner]);
        assert_eq!(list.to_string(), "[1, [a, true]]");
        assert_eq!(Value::Decimal(BigDecimal::from_str("5.0").unwrap()).to_string(), "5.0");
    }

    #[test]
    fn test_display_self_reference() {
        let list = Value::new_list(vec![Value::integer(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.to_string(), "[1, [...]]");
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Value::integer(2), Value::integer(2));
        assert_ne!(Value::integer(2), Value::Decimal(BigDecimal::from(2)));
        assert_eq!(
            Value::new_list(vec![Value::text("a")]),
            Value::new_list(vec![Value::text("a")])
        );
    }

    fn self_containing(items: Vec<Value>) -> Value {
        let list = Value::new_list(items);
        if let Value::List(cell) = &list {
            cell.borrow_mut().push(list.clone());
        }
        list
    }

    #[test]
    fn test_equality_of_cyclic_lists() {
        let x = self_containing(vec![Value::integer(1), Value::integer(2)]);
        let y = self_containing(vec![Value::integer(1), Value::integer(2)]);
        let z = self_containing(vec![Value::integer(1), Value::integer(3)]);
        assert!(x == y);
        assert!(x != z);
        assert!(x != Value::new_list(vec![Value::integer(1), Value::integer(2)]));
    }
}
