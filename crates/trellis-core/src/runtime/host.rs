//! The bridge between templates and native host records
//!
//! Hosts expose records to templates by implementing [`HostValue`];
//! the evaluator speaks only to this trait. A typical implementation
//! maps field names to stored data and method names to behavior:
//!
//! ```
//! use trellis_core::runtime::{HostValue, Value};
//!
//! struct Greeter;
//!
//! impl HostValue for Greeter {
//!     fn kind(&self) -> &'static str {
//!         "Greeter"
//!     }
//!
//!     fn call(&self, method: &str, args: &[Value]) -> Option<Result<Value, String>> {
//!         match method {
//!             "greet" => Some(Ok(Value::string(format!("hi {}!", args[0])))),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

use super::Value;

/// An opaque host record exposed to templates
///
/// All operations default to "not supported"; implementations override
/// what their record can do.
pub trait HostValue {
    /// The record's type name, used in error messages and rendering
    fn kind(&self) -> &'static str;

    /// Look up an exported field (or the result of a zero-argument
    /// method). Returning `None` makes the access evaluate to nil.
    fn field(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Invoke a method. Returning `None` means the method does not
    /// exist; `Some(Err(..))` aborts the render.
    fn call(&self, method: &str, args: &[Value]) -> Option<Result<Value, String>> {
        let _ = (method, args);
        None
    }

    /// Yield (key, value) pairs for `for` iteration. Returning `None`
    /// makes the record non-iterable.
    fn iter(&self) -> Option<Vec<(Value, Value)>> {
        None
    }
}
