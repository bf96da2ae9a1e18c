//! Operator extensions registered by the host at interpreter construction.
//!
//! Each one is bound under the identifier that acts as its operator token:
//! `size xs`, `xs cproduct ys`, `permutations xs`.

use crate::{
    env::Environment,
    error::OpError,
    value::{Callable, Value},
};

/// Longest list `permutations` accepts (8! orderings).
pub const MAX_PERMUTED_LEN: usize = 8;

pub fn register_all(env: &mut Environment) {
    env.register(Callable::unary("size", size));
    env.register(Callable::binary("cproduct", cproduct));
    env.register(Callable::unary("permutations", permutations));
}

/// A list's elements; any other value stands for the one-element list holding it.
fn elements(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.borrow().clone(),
        other => vec![other.clone()],
    }
}

fn size(value: Value) -> Result<Value, OpError> {
    let n = match &value {
        Value::Text(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        _ => 1,
    };
    Ok(Value::Integer(n.into()))
}

/// Cartesian product as a list of `[left, right]` pairs.
fn cproduct(left: Value, right: Value) -> Result<Value, OpError> {
    let (left, right) = (elements(&left), elements(&right));
    let pairs = left
        .iter()
        .flat_map(|a| {
            right
                .iter()
                .map(move |b| Value::new_list(vec![a.clone(), b.clone()]))
        })
        .collect();
    Ok(Value::new_list(pairs))
}

fn permutations(value: Value) -> Result<Value, OpError> {
    let items = elements(&value);
    if items.len() > MAX_PERMUTED_LEN {
        return Err(OpError::Extension(format!(
            "Cannot permute {} elements, at most {} are allowed.",
            items.len(),
            MAX_PERMUTED_LEN
        )));
    }
    let mut out = Vec::new();
    permute(&items, &mut vec![false; items.len()], &mut Vec::new(), &mut out);
    Ok(Value::new_list(out))
}

fn permute(items: &[Value], used: &mut [bool], current: &mut Vec<Value>, out: &mut Vec<Value>) {
    if current.len() == items.len() {
        out.push(Value::new_list(current.clone()));
        return;
    }
    for i in 0..items.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        current.push(items[i].clone());
        permute(items, used, current, out);
        current.pop();
        used[i] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Value {
        Value::new_list(ns.iter().map(|n| Value::integer(*n)).collect())
    }

    #[test]
    fn test_size() {
        assert_eq!(size(ints(&[1, 2, 3])), Ok(Value::integer(3)));
        assert_eq!(size(Value::text("abcd")), Ok(Value::integer(4)));
        assert_eq!(size(Value::Boolean(false)), Ok(Value::integer(1)));
    }

    #[test]
    fn test_cproduct() {
        let product = cproduct(ints(&[1, 2]), ints(&[3, 4])).unwrap();
        assert_eq!(product.to_string(), "[[1, 3], [1, 4], [2, 3], [2, 4]]");
        let with_scalar = cproduct(Value::text("a"), ints(&[1])).unwrap();
        assert_eq!(with_scalar.to_string(), "[[a, 1]]");
        assert_eq!(cproduct(ints(&[]), ints(&[1])).unwrap().to_string(), "[]");
    }

    #[test]
    fn test_permutations() {
        let perms = permutations(ints(&[1, 2, 3])).unwrap();
        assert_eq!(
            perms.to_string(),
            "[[1, 2, 3], [1, 3, 2], [2, 1, 3], [2, 3, 1], [3, 1, 2], [3, 2, 1]]"
        );
        assert_eq!(permutations(ints(&[])).unwrap().to_string(), "[[]]");
        assert!(permutations(ints(&[0; 9])).is_err());
    }
}
