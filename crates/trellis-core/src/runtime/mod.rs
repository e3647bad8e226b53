//! Runtime values and the host bridge

mod host;
mod value;

pub use host::HostValue;
pub use value::{Frame, HelperFn, IntRange, NativeFn, TemplateFn, Value};
