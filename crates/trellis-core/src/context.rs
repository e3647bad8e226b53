//! Render context: the bindings a template starts with

use std::collections::HashMap;

use crate::eval::HelperContext;
use crate::runtime::{HelperFn, NativeFn, Value};

/// A mutable mapping from name to value handed to [`render`](crate::render)
///
/// The built-in registry (`range`, `between`, `until`, `len`, `raw`,
/// `inspect`) is seeded into every render scope automatically; context
/// bindings of the same name override built-ins.
///
/// ```
/// use trellis_core::{render, Context};
///
/// let mut ctx = Context::new();
/// ctx.set("name", "Mark");
/// assert_eq!(render("<p><%= name %></p>", &ctx).unwrap(), "<p>Mark</p>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    bindings: HashMap<String, Value>,
}

impl Context {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from an iterator of bindings
    #[must_use]
    pub fn with<K, V, I>(bindings: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            bindings: bindings
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Bind or override a name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Register a host function callable from templates
    ///
    /// `arity` is the required argument count, or -1 for variadic.
    pub fn set_native(
        &mut self,
        name: &str,
        arity: i8,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> &mut Self {
        self.bindings
            .insert(name.to_string(), Value::NativeFn(NativeFn::new(name, arity, func)));
        self
    }

    /// Register a helper: a host function that also receives a
    /// [`HelperContext`] for rendering an attached template block
    pub fn set_helper(
        &mut self,
        name: &str,
        func: impl Fn(&[Value], &mut HelperContext<'_>) -> Result<Value, String> + 'static,
    ) -> &mut Self {
        self.bindings
            .insert(name.to_string(), Value::Helper(HelperFn::new(name, func)));
        self
    }

    /// Read a binding
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Iterate over all bindings
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_value() {
        let mut ctx = Context::new();
        ctx.set("name", "Mark").set("count", 3);
        assert_eq!(ctx.value("name"), Some(&Value::string("Mark")));
        assert_eq!(ctx.value("count"), Some(&Value::Int(3)));
        assert_eq!(ctx.value("missing"), None);
    }

    #[test]
    fn with_bindings() {
        let ctx = Context::with([("a", 1), ("b", 2)]);
        assert_eq!(ctx.value("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn natives_are_values() {
        let mut ctx = Context::new();
        ctx.set_native("f", 0, |_| Ok(Value::string("hi!")));
        assert!(matches!(ctx.value("f"), Some(Value::NativeFn(_))));
    }
}
