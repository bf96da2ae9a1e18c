use std::cmp::Ordering;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

use crate::{
    decimal,
    error::OpError,
    lexer::TokenKind,
    value::{Number, Value},
};

/// Longest list a range may materialize.
pub const MAX_RANGE_LEN: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Sum,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Arith(Arith),
    Compare(Compare),
    /// `short_circuit` is set for the doubled token forms `&&` and `||`.
    Logic { op: Logic, short_circuit: bool },
    Cons,
    Intersect,
    Range,
    Assign,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `~`: the operand's truthiness as a Boolean.
    Truthy,
    Negate,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Plus => BinaryOp::Arith(Arith::Sum),
            TokenKind::Minus => BinaryOp::Arith(Arith::Sub),
            TokenKind::Star => BinaryOp::Arith(Arith::Mul),
            TokenKind::Slash => BinaryOp::Arith(Arith::Div),
            TokenKind::Percent => BinaryOp::Arith(Arith::Mod),
            TokenKind::Caret => BinaryOp::Arith(Arith::Pow),
            TokenKind::Greater => BinaryOp::Compare(Compare::Gt),
            TokenKind::GreaterEqual => BinaryOp::Compare(Compare::Ge),
            TokenKind::Less => BinaryOp::Compare(Compare::Lt),
            TokenKind::LessEqual => BinaryOp::Compare(Compare::Le),
            TokenKind::Equal => BinaryOp::Compare(Compare::Eq),
            TokenKind::LessGreater => BinaryOp::Compare(Compare::Ne),
            TokenKind::Pipe => BinaryOp::Logic {
                op: Logic::Or,
                short_circuit: false,
            },
            TokenKind::PipePipe => BinaryOp::Logic {
                op: Logic::Or,
                short_circuit: true,
            },
            TokenKind::Ampersand => BinaryOp::Logic {
                op: Logic::And,
                short_circuit: false,
            },
            TokenKind::AmpersandAmpersand => BinaryOp::Logic {
                op: Logic::And,
                short_circuit: true,
            },
            TokenKind::Semicolon => BinaryOp::Cons,
            TokenKind::Dot => BinaryOp::Intersect,
            TokenKind::DotDot => BinaryOp::Range,
            TokenKind::Colon | TokenKind::ColonEqual => BinaryOp::Assign,
            TokenKind::At => BinaryOp::Io,
            _ => return None,
        };
        Some(op)
    }
}

impl UnaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Tilde => Some(UnaryOp::Truthy),
            TokenKind::Minus => Some(UnaryOp::Negate),
            _ => None,
        }
    }

    pub fn apply(self, operand: &Value) -> Result<Value, OpError> {
        match self {
            UnaryOp::Truthy => Ok(Value::Boolean(operand.is_truthy()?)),
            UnaryOp::Negate => match operand {
                Value::Decimal(d) => Ok(Value::Decimal(-d.clone())),
                Value::Integer(n) => Ok(Value::Integer(-n.clone())),
                _ => Err(OpError::NotANumber),
            },
        }
    }
}

impl Arith {
    /// Applies the operation to the coerced operands. The result is Decimal when
    /// either operand is Decimal, Integer otherwise; `Boolean % Boolean` is logical and.
    pub fn apply(self, left: &Value, right: &Value) -> Result<Value, OpError> {
        if let (Arith::Mod, Value::Boolean(a), Value::Boolean(b)) = (self, left, right) {
            return Ok(Value::Boolean(*a && *b));
        }
        let result = match (left.to_number()?, right.to_number()?) {
            (Number::Integer(a), Number::Integer(b)) => Number::Integer(self.integers(a, b)?),
            (a, b) => Number::Decimal(self.decimals(a.to_decimal(), b.to_decimal())?),
        };
        Ok(result.into())
    }

    fn integers(self, a: BigInt, b: BigInt) -> Result<BigInt, OpError> {
        Ok(match self {
            Arith::Sum => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div if b.is_zero() => return Err(OpError::DivisionByZero),
            Arith::Div => a / b,
            Arith::Mod if b.is_zero() => return Err(OpError::DivisionByZero),
            Arith::Mod => a.mod_floor(&b),
            Arith::Pow => {
                let exponent = b.to_u32().ok_or_else(|| {
                    if b < BigInt::zero() {
                        OpError::NegativeExponent
                    } else {
                        OpError::ExponentTooLarge(b.to_string())
                    }
                })?;
                a.pow(exponent)
            }
        })
    }

    fn decimals(self, a: BigDecimal, b: BigDecimal) -> Result<BigDecimal, OpError> {
        Ok(match self {
            Arith::Sum => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div if b.is_zero() => return Err(OpError::DivisionByZero),
            Arith::Div => a / b,
            Arith::Mod if b.is_zero() => return Err(OpError::DivisionByZero),
            Arith::Mod => {
                let zero = BigDecimal::zero();
                let r = a % b.clone();
                // floored: the remainder takes the divisor's sign
                if !r.is_zero() && (r < zero) != (b < zero) {
                    r + b
                } else {
                    r
                }
            }
            Arith::Pow => decimal_pow(a, b)?,
        })
    }
}

/// Integral exponents are computed exactly, fractional ones through `exp` and `ln`.
fn decimal_pow(base: BigDecimal, exponent: BigDecimal) -> Result<BigDecimal, OpError> {
    let whole = exponent.with_scale(0);
    if whole == exponent {
        let n = whole
            .into_bigint_and_exponent()
            .0
            .to_i64()
            .ok_or_else(|| OpError::ExponentTooLarge(exponent.to_string()))?;
        return powi(base, n);
    }
    decimal::pow(&base, &exponent)
}

fn powi(base: BigDecimal, n: i64) -> Result<BigDecimal, OpError> {
    if n < 0 && base.is_zero() {
        return Err(OpError::DivisionByZero);
    }
    let mut e = n.unsigned_abs();
    let mut acc = BigDecimal::one();
    let mut square = base;
    while e > 0 {
        if e & 1 == 1 {
            acc = &acc * &square;
        }
        e >>= 1;
        if e > 0 {
            square = &square * &square;
        }
    }
    if n < 0 {
        acc = BigDecimal::one() / acc;
    }
    Ok(acc)
}

impl Compare {
    /// Compares the coerced operands, so Text and List compare by length.
    pub fn apply(self, left: &Value, right: &Value) -> Result<Value, OpError> {
        let ordering = match (left.to_number()?, right.to_number()?) {
            (Number::Integer(a), Number::Integer(b)) => a.cmp(&b),
            (a, b) => a.to_decimal().cmp(&b.to_decimal()),
        };
        let result = match self {
            Compare::Gt => ordering == Ordering::Greater,
            Compare::Ge => ordering != Ordering::Less,
            Compare::Lt => ordering == Ordering::Less,
            Compare::Le => ordering != Ordering::Greater,
            Compare::Eq => ordering == Ordering::Equal,
            Compare::Ne => ordering != Ordering::Equal,
        };
        Ok(Value::Boolean(result))
    }
}

impl Logic {
    pub fn apply(self, left: &Value, right: &Value) -> Result<Value, OpError> {
        let (l, r) = (left.is_truthy()?, right.is_truthy()?);
        Ok(Value::Boolean(match self {
            Logic::And => l && r,
            Logic::Or => l || r,
        }))
    }
}

/// Lets an operator skip its right operand once the left one decides the result.
pub trait ShortCircuit {
    /// Whether the right operand still has to be evaluated.
    fn proceed(&self, left: &Value) -> Result<bool, OpError>;

    /// The result when `proceed` returned false.
    fn short_circuit_value(&self) -> bool;
}

impl ShortCircuit for Logic {
    fn proceed(&self, left: &Value) -> Result<bool, OpError> {
        let truthy = left.is_truthy()?;
        Ok(match self {
            Logic::And => truthy,
            Logic::Or => !truthy,
        })
    }

    fn short_circuit_value(&self) -> bool {
        matches!(self, Logic::Or)
    }
}

/// Appends `right` to `left` when it is already a list (in place, visible to
/// every holder), otherwise starts a new list `[left, right]`.
pub fn cons(left: Value, right: Value) -> Value {
    match left {
        Value::List(items) => {
            items.borrow_mut().push(right);
            Value::List(items)
        }
        other => Value::new_list(vec![other, right]),
    }
}

/// Set intersection. Elements keep the order of their first occurrence on the left.
pub fn intersect(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            let mut common: Vec<Value> = Vec::new();
            for item in a.iter() {
                if b.contains(item) && !common.contains(item) {
                    common.push(item.clone());
                }
            }
            Value::new_list(common)
        }
        (Value::List(items), scalar) | (scalar, Value::List(items)) => {
            if items.borrow().contains(scalar) {
                Value::new_list(vec![scalar.clone()])
            } else {
                Value::new_list(Vec::new())
            }
        }
        _ => Value::new_list(Vec::new()),
    }
}

/// Inclusive ascending run from `left` up to `right`, stepping by one. Empty
/// when `left` is above `right`.
pub fn range(left: &Value, right: &Value) -> Result<Value, OpError> {
    let (a, b) = (left.to_number()?, right.to_number()?);
    let too_large = || OpError::RangeTooLarge(left.to_string(), right.to_string());

    let items = match (a, b) {
        (Number::Integer(lo), Number::Integer(hi)) => {
            if lo > hi {
                return Ok(Value::new_list(Vec::new()));
            }
            let count = (&hi - &lo + 1u32)
                .to_u64()
                .filter(|n| *n <= MAX_RANGE_LEN)
                .ok_or_else(too_large)?;
            let mut items = Vec::with_capacity(count as usize);
            let mut current = lo;
            for _ in 0..count {
                items.push(Value::Integer(current.clone()));
                current += 1u32;
            }
            items
        }
        (a, b) => {
            let (lo, hi) = (a.to_decimal(), b.to_decimal());
            if lo > hi {
                return Ok(Value::new_list(Vec::new()));
            }
            let count = (Number::Decimal(&hi - &lo).to_integer() + 1u32)
                .to_u64()
                .filter(|n| *n <= MAX_RANGE_LEN)
                .ok_or_else(too_large)?;
            let mut items = Vec::with_capacity(count as usize);
            let mut current = lo;
            for _ in 0..count {
                items.push(Value::Decimal(current.clone()));
                current = current + BigDecimal::one();
            }
            items
        }
    };
    Ok(Value::new_list(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Value {
        Value::Decimal(BigDecimal::from_str(s).unwrap())
    }

    fn int(n: i64) -> Value {
        Value::integer(n)
    }

    fn list(items: Vec<Value>) -> Value {
        Value::new_list(items)
    }

    fn data_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0i64..50).prop_map(Value::integer),
            (0i64..500).prop_map(|n| Value::Decimal(BigDecimal::new(n.into(), 1))),
            any::<bool>().prop_map(Value::Boolean),
            "[a-z]{0,5}".prop_map(|s| Value::text(&s)),
            prop::collection::vec((0i64..5).prop_map(Value::integer), 0..4).prop_map(Value::new_list),
        ]
    }

    #[test]
    fn test_sum_kinds() {
        assert_eq!(Arith::Sum.apply(&int(3), &int(2)), Ok(int(5)));
        assert_eq!(Arith::Sum.apply(&dec("3.0"), &int(2)), Ok(dec("5.0")));
        assert_eq!(Arith::Sum.apply(&Value::Boolean(true), &int(2)), Ok(int(3)));
        assert_eq!(Arith::Sum.apply(&Value::text("ab"), &int(2)), Ok(int(4)));
        assert_eq!(
            Arith::Sum.apply(&list(vec![int(9), int(9), int(9)]), &Value::text("x")),
            Ok(int(4))
        );
    }

    #[test]
    fn test_div_and_mod() {
        assert_eq!(Arith::Div.apply(&int(7), &int(2)), Ok(int(3)));
        assert_eq!(Arith::Div.apply(&int(-7), &int(2)), Ok(int(-3)));
        assert_eq!(Arith::Div.apply(&dec("7.5"), &dec("2.5")), Ok(dec("3")));
        assert_eq!(Arith::Div.apply(&int(1), &Value::Boolean(false)), Err(OpError::DivisionByZero));
        assert_eq!(Arith::Mod.apply(&int(7), &int(3)), Ok(int(1)));
        assert_eq!(Arith::Mod.apply(&int(-7), &int(3)), Ok(int(2)));
        assert_eq!(Arith::Mod.apply(&dec("7.5"), &int(2)), Ok(dec("1.5")));
        assert_eq!(Arith::Mod.apply(&dec("-7.5"), &int(2)), Ok(dec("0.5")));
        assert_eq!(Arith::Mod.apply(&int(1), &list(vec![])), Err(OpError::DivisionByZero));
    }

    #[test]
    fn test_boolean_mod_is_and() {
        let t = Value::Boolean(true);
        let f = Value::Boolean(false);
        assert_eq!(Arith::Mod.apply(&t, &t), Ok(Value::Boolean(true)));
        assert_eq!(Arith::Mod.apply(&t, &f), Ok(Value::Boolean(false)));
        // only both-boolean pairs are special
        assert_eq!(Arith::Mod.apply(&t, &int(2)), Ok(int(1)));
    }

    #[test]
    fn test_pow() {
        assert_eq!(Arith::Pow.apply(&int(2), &int(3)), Ok(int(8)));
        assert_eq!(Arith::Pow.apply(&Value::text("abc"), &Value::Boolean(true)), Ok(int(3)));
        assert_eq!(Arith::Pow.apply(&int(2), &int(-1)), Err(OpError::NegativeExponent));
        assert_eq!(Arith::Pow.apply(&dec("1.5"), &int(2)), Ok(dec("2.25")));
        assert_eq!(Arith::Pow.apply(&int(2), &dec("-2.0")), Ok(dec("0.25")));
        assert_eq!(Arith::Pow.apply(&dec("4.0"), &dec("0.5")), Ok(dec("2")));
        assert_eq!(Arith::Pow.apply(&dec("-4.0"), &dec("0.5")), Err(OpError::NotReal));
    }

    #[test]
    fn test_fractional_pow_keeps_precision() {
        let root = Arith::Pow.apply(&dec("2.0"), &dec("0.5")).unwrap().to_string();
        assert!(root.starts_with("1.41421356237309504880168872420969807"), "{root}");
        let power = Arith::Pow.apply(&int(10), &dec("2.5")).unwrap().to_string();
        assert!(power.starts_with("316.22776601683793319988935444327"), "{power}");
    }

    #[test]
    fn test_comparison_by_length() {
        let eq = |a: &Value, b: &Value| Compare::Eq.apply(a, b).unwrap();
        assert_eq!(eq(&Value::text("ab"), &int(2)), Value::Boolean(true));
        assert_eq!(eq(&Value::Boolean(true), &int(1)), Value::Boolean(true));
        assert_eq!(eq(&Value::text("ab"), &list(vec![int(5), int(6)])), Value::Boolean(true));
        assert_eq!(Compare::Lt.apply(&dec("1.5"), &int(2)), Ok(Value::Boolean(true)));
        assert_eq!(Compare::Ne.apply(&dec("2.0"), &int(2)), Ok(Value::Boolean(false)));
        assert_eq!(Compare::Ge.apply(&Value::text(""), &Value::Boolean(false)), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_logic_and_short_circuit() {
        assert_eq!(Logic::And.apply(&Value::text("a"), &int(3)), Ok(Value::Boolean(true)));
        assert_eq!(Logic::Or.apply(&int(0), &list(vec![])), Ok(Value::Boolean(false)));

        assert_eq!(Logic::Or.proceed(&int(1)), Ok(false));
        assert_eq!(Logic::Or.proceed(&int(0)), Ok(true));
        assert!(Logic::Or.short_circuit_value());
        assert_eq!(Logic::And.proceed(&int(0)), Ok(false));
        assert_eq!(Logic::And.proceed(&Value::text("x")), Ok(true));
        assert!(!Logic::And.short_circuit_value());
    }

    #[test]
    fn test_unary() {
        assert_eq!(UnaryOp::Truthy.apply(&int(0)), Ok(Value::Boolean(false)));
        assert_eq!(UnaryOp::Truthy.apply(&int(5)), Ok(Value::Boolean(true)));
        assert_eq!(UnaryOp::Negate.apply(&dec("2.5")), Ok(dec("-2.5")));
        assert_eq!(UnaryOp::Negate.apply(&Value::text("a")), Err(OpError::NotANumber));
    }

    #[test]
    fn test_cons_shares_left_list() {
        let first = cons(int(1), int(2));
        let second = cons(first.clone(), int(3));
        assert_eq!(first.to_string(), "[1, 2, 3]");
        match (&first, &second) {
            (Value::List(a), Value::List(b)) => assert!(std::rc::Rc::ptr_eq(a, b)),
            _ => panic!("cons must produce lists"),
        }
        // a list on the right is nested, not spliced
        let nested = cons(int(0), list(vec![int(1)]));
        assert_eq!(nested.to_string(), "[0, [1]]");
    }

    #[test]
    fn test_intersect() {
        let a = list(vec![int(3), int(1), int(2), int(1)]);
        let b = list(vec![int(1), int(3), int(5)]);
        assert_eq!(intersect(&a, &b).to_string(), "[3, 1]");
        assert_eq!(intersect(&int(2), &a).to_string(), "[2]");
        assert_eq!(intersect(&a, &int(7)).to_string(), "[]");
        assert_eq!(intersect(&int(1), &int(1)).to_string(), "[]");
    }

    #[test]
    fn test_intersect_self_containing_lists() {
        let x = cons(int(1), int(2));
        let x = cons(x.clone(), x);
        let y = cons(int(1), int(2));
        let y = cons(y.clone(), y);
        let common = intersect(&cons(x, int(0)), &cons(y, int(0)));
        assert_eq!(common.to_string(), "[1, 2, [1, 2, [...], 0], 0]");
    }

    #[test]
    fn test_range() {
        assert_eq!(range(&int(1), &int(4)).unwrap().to_string(), "[1, 2, 3, 4]");
        assert_eq!(range(&int(3), &int(1)).unwrap().to_string(), "[]");
        assert_eq!(range(&int(2), &int(2)).unwrap().to_string(), "[2]");
        assert_eq!(range(&dec("0.5"), &int(2)).unwrap().to_string(), "[0.5, 1.5]");
        assert_eq!(range(&dec("2.5"), &int(1)).unwrap().to_string(), "[]");
        assert_eq!(range(&Value::Boolean(true), &Value::text("ab")).unwrap().to_string(), "[1, 2]");
        assert!(matches!(
            range(&int(0), &int(1 << 40)),
            Err(OpError::RangeTooLarge(_, _))
        ));
    }

    #[test]
    fn test_non_data_operands() {
        let symbol = Value::Symbol("x".into());
        assert_eq!(
            Arith::Sum.apply(&symbol, &int(1)),
            Err(OpError::NotCoercible("Symbol"))
        );
        assert_eq!(
            Logic::And.apply(&int(1), &symbol),
            Err(OpError::NotCoercible("Symbol"))
        );
        // structural operators accept any kind
        assert_eq!(cons(symbol.clone(), int(1)).to_string(), "[x, 1]");
    }

    #[test]
    fn test_operator_tokens() {
        assert_eq!(
            BinaryOp::from_token(TokenKind::PipePipe),
            Some(BinaryOp::Logic {
                op: Logic::Or,
                short_circuit: true
            })
        );
        assert_eq!(BinaryOp::from_token(TokenKind::ColonEqual), Some(BinaryOp::Assign));
        assert_eq!(BinaryOp::from_token(TokenKind::Tilde), None);
        assert_eq!(UnaryOp::from_token(TokenKind::Minus), Some(UnaryOp::Negate));
    }

    proptest! {
        #[test]
        fn prop_operators_are_total(a in data_value(), b in data_value()) {
            for op in [Arith::Sum, Arith::Sub, Arith::Mul, Arith::Pow] {
                prop_assert!(op.apply(&a, &b).is_ok(), "{:?} {} {}", op, a, b);
            }
            if !b.to_number().unwrap().is_zero() {
                prop_assert!(Arith::Div.apply(&a, &b).is_ok());
                prop_assert!(Arith::Mod.apply(&a, &b).is_ok());
            }
            for op in [Compare::Gt, Compare::Ge, Compare::Lt, Compare::Le, Compare::Eq, Compare::Ne] {
                prop_assert!(op.apply(&a, &b).is_ok());
            }
            for op in [Logic::And, Logic::Or] {
                prop_assert!(op.apply(&a, &b).is_ok());
            }
            prop_assert!(UnaryOp::Truthy.apply(&a).is_ok());
        }

        #[test]
        fn prop_sum_and_mul_commute(a in data_value(), b in data_value()) {
            prop_assert_eq!(Arith::Sum.apply(&a, &b), Arith::Sum.apply(&b, &a));
            prop_assert_eq!(Arith::Mul.apply(&a, &b), Arith::Mul.apply(&b, &a));
        }

        #[test]
        fn prop_sub_is_antisymmetric(a in data_value(), b in data_value()) {
            let forward = Arith::Sub.apply(&a, &b).unwrap();
            let backward = Arith::Sub.apply(&b, &a).unwrap();
            prop_assert_eq!(forward, UnaryOp::Negate.apply(&backward).unwrap());
        }
    }
}
