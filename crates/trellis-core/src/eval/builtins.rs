//! Built-in functions registered in every render scope

use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::{IntRange, NativeFn, Value};

/// Install the built-in registry into a root frame
pub fn install(frame: &mut HashMap<String, Value>) {
    let builtins = [
        NativeFn::new("range", 2, range),
        NativeFn::new("between", 2, between),
        NativeFn::new("until", 1, until),
        NativeFn::new("len", 1, len),
        NativeFn::new("raw", 1, raw),
        NativeFn::new("inspect", 1, inspect),
    ];
    for builtin in builtins {
        frame.insert((*builtin.name).clone(), Value::NativeFn(builtin));
    }
}

/// `range(a, b)`: integers from a through b, both inclusive
fn range(args: &[Value]) -> Result<Value, String> {
    let start = int_arg(args, 0, "range")?;
    let end = int_arg(args, 1, "range")?;
    Ok(Value::Range(Rc::new(IntRange::new(start, end))))
}

/// `between(a, b)`: the integers strictly between a and b
fn between(args: &[Value]) -> Result<Value, String> {
    let start = int_arg(args, 0, "between")?;
    let end = int_arg(args, 1, "between")?;
    Ok(Value::Range(Rc::new(IntRange::new(start + 1, end - 1))))
}

/// `until(n)`: 0 through n-1
fn until(args: &[Value]) -> Result<Value, String> {
    let end = int_arg(args, 0, "until")?;
    Ok(Value::Range(Rc::new(IntRange::new(0, end - 1))))
}

/// `len(x)`: length of a string (in characters), array, or hash
fn len(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Str(s) | Value::SafeHtml(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::Array(l) => Ok(Value::Int(l.borrow().len() as i64)),
        Value::Hash(m) => Ok(Value::Int(m.borrow().len() as i64)),
        Value::Nil => Ok(Value::Int(0)),
        other => Err(format!("len() cannot measure {}", other.type_name())),
    }
}

/// `raw(x)`: mark the rendering of x as pre-escaped HTML
fn raw(args: &[Value]) -> Result<Value, String> {
    Ok(Value::safe_html(args[0].to_string()))
}

/// `inspect(x)`: debug rendering of any value
fn inspect(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(format!("{:?}", args[0])))
}

fn int_arg(args: &[Value], index: usize, name: &str) -> Result<i64, String> {
    match args.get(index) {
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(format!(
            "{name}() expected an integer, got {}",
            other.type_name()
        )),
        None => Err(format!("{name}() is missing argument {}", index + 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&[Value]) -> Result<Value, String>, args: &[Value]) -> Value {
        f(args).expect("builtin should succeed")
    }

    #[test]
    fn range_is_inclusive() {
        let v = call(range, &[Value::Int(3), Value::Int(5)]);
        assert_eq!(v, Value::Range(Rc::new(IntRange::new(3, 5))));
    }

    #[test]
    fn between_is_exclusive() {
        let v = call(between, &[Value::Int(3), Value::Int(6)]);
        assert_eq!(v, Value::Range(Rc::new(IntRange::new(4, 5))));
    }

    #[test]
    fn until_counts_from_zero() {
        let v = call(until, &[Value::Int(3)]);
        assert_eq!(v, Value::Range(Rc::new(IntRange::new(0, 2))));
    }

    #[test]
    fn len_measures_collections() {
        assert_eq!(call(len, &[Value::string("héllo")]), Value::Int(5));
        assert_eq!(
            call(len, &[Value::array(vec![Value::Int(1), Value::Int(2)])]),
            Value::Int(2)
        );
        assert_eq!(call(len, &[Value::Nil]), Value::Int(0));
    }

    #[test]
    fn len_rejects_numbers() {
        assert!(len(&[Value::Int(3)]).is_err());
    }

    #[test]
    fn raw_marks_safe() {
        let v = call(raw, &[Value::string("<b>")]);
        assert_eq!(v, Value::safe_html("<b>"));
        assert!(matches!(v, Value::SafeHtml(_)));
    }
}
