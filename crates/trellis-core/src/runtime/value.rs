//! Runtime values for the trellis evaluator

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Block;
use crate::eval::HelperContext;

use super::HostValue;

/// A scope frame: one level of name → value bindings, shared by
/// reference so function literals can capture their defining chain
pub type Frame = Rc<RefCell<HashMap<String, Value>>>;

/// A runtime value in a trellis template
#[derive(Clone)]
pub enum Value {
    /// Nil (absent) value; renders as the empty string
    Nil,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating-point number
    Float(f64),

    /// String (reference-counted); escaped when emitted
    Str(Rc<String>),

    /// A string already safe for HTML output; never escaped
    SafeHtml(Rc<String>),

    /// Array (reference-counted, mutable)
    Array(Rc<RefCell<Vec<Value>>>),

    /// Hash (reference-counted, mutable); keys are strings, iteration
    /// order is unspecified
    Hash(Rc<RefCell<HashMap<String, Value>>>),

    /// Inclusive integer range produced by the range/between/until
    /// built-ins
    Range(Rc<IntRange>),

    /// User-defined function literal with its captured scope chain
    Function(Rc<TemplateFn>),

    /// Host function registered on the context
    NativeFn(NativeFn),

    /// Host helper: a native function that also receives a
    /// [`HelperContext`] for rendering an attached template block
    Helper(HelperFn),

    /// Opaque host record behind the [`HostValue`] bridge
    Host(Rc<dyn HostValue>),
}

/// An inclusive integer range (both endpoints yielded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    /// First value yielded
    pub start: i64,
    /// Last value yielded (no values when end < start)
    pub end: i64,
}

impl IntRange {
    /// Create a new inclusive range
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// A user-defined function (fn literal) with its captured environment
pub struct TemplateFn {
    /// Parameter names
    pub params: Vec<String>,
    /// Function body
    pub body: Block,
    /// The frame chain in effect when the literal was evaluated
    pub captured: Vec<Frame>,
}

impl fmt::Debug for TemplateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateFn")
            .field("params", &self.params)
            .finish()
    }
}

/// A host function callable from templates
#[derive(Clone)]
pub struct NativeFn {
    /// Function name (as registered on the context)
    pub name: Rc<String>,
    /// Number of parameters (-1 for variadic)
    pub arity: i8,
    /// The host callable
    pub func: Rc<dyn Fn(&[Value]) -> Result<Value, String>>,
}

impl NativeFn {
    /// Create a new native function
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        arity: i8,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: Rc::new(name.into()),
            arity,
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A host helper: receives its arguments plus a [`HelperContext`]
/// exposing the attached template block and the current scope
#[derive(Clone)]
pub struct HelperFn {
    /// Helper name (as registered on the context)
    pub name: Rc<String>,
    /// The host callable
    #[allow(clippy::type_complexity)]
    pub func: Rc<dyn Fn(&[Value], &mut HelperContext<'_>) -> Result<Value, String>>,
}

impl HelperFn {
    /// Create a new helper
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value], &mut HelperContext<'_>) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: Rc::new(name.into()),
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for HelperFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperFn").field("name", &self.name).finish()
    }
}

impl Value {
    /// Returns true if this value is considered "truthy"
    ///
    /// Only `false` and `nil` are falsy; everything else (including 0
    /// and empty collections) is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    /// Returns true if this value is nil
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the type name of this value (for error messages)
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::SafeHtml(_) => "SafeHtml",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::Range(_) => "Range",
            Value::Function(_) => "Function",
            Value::NativeFn(_) => "Function",
            Value::Helper(_) => "Function",
            Value::Host(h) => h.kind(),
        }
    }

    /// Create a string value
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    /// Create a pre-escaped HTML value the emitter will not escape
    #[must_use]
    pub fn safe_html(s: impl Into<String>) -> Self {
        Value::SafeHtml(Rc::new(s.into()))
    }

    /// Create an array from values
    #[must_use]
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    /// Create a hash from string-keyed entries
    #[must_use]
    pub fn hash(entries: HashMap<String, Value>) -> Self {
        Value::Hash(Rc::new(RefCell::new(entries)))
    }

    /// Wrap a host record behind the [`HostValue`] bridge
    #[must_use]
    pub fn host(value: impl HostValue + 'static) -> Self {
        Value::Host(Rc::new(value))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b))
            | (Value::SafeHtml(a), Value::SafeHtml(b))
            | (Value::Str(a), Value::SafeHtml(b))
            | (Value::SafeHtml(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFn(a), Value::NativeFn(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Value::Helper(a), Value::Helper(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::SafeHtml(s) => write!(f, "<safe {s:?}>"),
            Value::Array(l) => write!(f, "{:?}", l.borrow()),
            Value::Hash(m) => write!(f, "{:?}", m.borrow()),
            Value::Range(r) => write!(f, "{}..{}", r.start, r.end),
            Value::Function(func) => write!(f, "<fn({})>", func.params.join(", ")),
            Value::NativeFn(n) => write!(f, "<native fn {}>", n.name),
            Value::Helper(h) => write!(f, "<helper {}>", h.name),
            Value::Host(h) => write!(f, "<{}>", h.kind()),
        }
    }
}

/// The rendered (output) form of a value: nil is empty, strings are
/// bare, collections list their rendered elements
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) | Value::SafeHtml(s) => write!(f, "{s}"),
            Value::Array(l) => {
                write!(f, "[")?;
                for (i, v) in l.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Hash(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Range(r) => write!(f, "{}..{}", r.start, r.end),
            Value::Function(func) => write!(f, "<fn({})>", func.params.join(", ")),
            Value::NativeFn(n) => write!(f, "<native fn {}>", n.name),
            Value::Helper(h) => write!(f, "<helper {}>", h.name),
            Value::Host(h) => write!(f, "<{}>", h.kind()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(entries: HashMap<String, T>) -> Self {
        Value::hash(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<&str, T>> for Value {
    fn from(entries: HashMap<&str, T>) -> Self {
        Value::hash(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn display_renders_output_form() {
        assert_eq!(Value::Nil.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(Value::safe_html("<b>").to_string(), "<b>");
        assert_eq!(
            Value::array(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn equality_compares_contents() {
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_eq!(Value::string("a"), Value::safe_html("a"));
        assert_ne!(Value::Int(1), Value::string("1"));
        assert_eq!(
            Value::array(vec![Value::Int(1)]),
            Value::array(vec![Value::Int(1)])
        );
        assert_ne!(Value::Nil, Value::Bool(false));
    }

    #[test]
    fn from_conversions() {
        assert_eq!(Value::from("x"), Value::string("x"));
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::array(vec![Value::string("a"), Value::string("b")])
        );
    }
}
