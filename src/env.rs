use std::collections::HashMap;

use crate::value::{Arity, Callable, Value};

/// The session's single binding table. Names are matched exactly; there are no
/// nested scopes.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment with the host's operator extensions pre-registered.
    pub fn with_builtins() -> Self {
        let mut env = Self::new();
        crate::builtins::register_all(&mut env);
        env
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binds an operator extension under its own name.
    pub fn register(&mut self, callable: Callable) {
        let name = callable.name().to_string();
        self.bindings.insert(name, Value::Callable(callable));
    }

    pub fn extension(&self, name: &str) -> Option<&Callable> {
        match self.bindings.get(name) {
            Some(Value::Callable(callable)) => Some(callable),
            _ => None,
        }
    }

    /// Names currently bound to operator extensions, with their arity.
    pub fn extension_arities(&self) -> HashMap<String, Arity> {
        self.bindings
            .iter()
            .filter_map(|(name, value)| match value {
                Value::Callable(callable) => Some((name.clone(), callable.arity())),
                _ => None,
            })
            .collect()
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.bindings.keys().collect();
        names.sort();
        write!(f, "<")?;
        for (i, name) in names.into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, self.bindings[name])?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_contains() {
        let mut env = Environment::new();
        assert!(!env.contains("x"));
        assert_eq!(env.get("x"), None);
        env.set("x", Value::integer(5));
        assert!(env.contains("x"));
        assert_eq!(env.get("x"), Some(Value::integer(5)));
        env.set("x", Value::text("again"));
        assert_eq!(env.get("x"), Some(Value::text("again")));
    }

    #[test]
    fn test_register_extension() {
        let mut env = Environment::new();
        env.register(Callable::unary("twice", |v| Ok(crate::ops::cons(v.clone(), v))));
        assert!(env.contains("twice"));
        assert_eq!(env.extension("twice").map(Callable::arity), Some(Arity::Unary));
        assert_eq!(env.extension_arities().get("twice"), Some(&Arity::Unary));

        // rebinding the name to data removes it from the operator set
        env.set("twice", Value::integer(2));
        assert!(env.extension("twice").is_none());
        assert!(env.extension_arities().is_empty());
    }

    #[test]
    fn test_builtins_registered() {
        let env = Environment::with_builtins();
        let arities = env.extension_arities();
        assert_eq!(arities.get("size"), Some(&Arity::Unary));
        assert_eq!(arities.get("cproduct"), Some(&Arity::Binary));
        assert_eq!(arities.get("permutations"), Some(&Arity::Unary));
    }

    #[test]
    fn test_display() {
        let mut env = Environment::new();
        env.set("b", Value::integer(2));
        env.set("a", Value::Boolean(true));
        assert_eq!(env.to_string(), "<a: true, b: 2>");
    }
}
