//! Tree-walk evaluator for trellis templates
//!
//! The evaluator walks an immutable [`Program`] against a mutable scope
//! stack and appends to an output buffer. Literal text is copied
//! verbatim; emitting fences append their result with HTML escaping
//! unless the value is [`Value::SafeHtml`] (pre-escaped) or nil (which
//! emits nothing); silent fences run for effect only.

mod builtins;
mod error;
mod escape;
mod scope;

pub use error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
pub use escape::escape_html;
pub use scope::Scope;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    BinOp, Block, ElseBranch, Expr, ExprKind, Fence, Ident, Item, Literal, Program, Stmt,
    StmtKind, UnaryOp,
};
use crate::context::Context;
use crate::lexer::Span;
use crate::runtime::{HostValue, TemplateFn, Value};

/// The result of evaluating an expression: a plain value, or a `return`
/// propagating outward to its fence, loop, or function boundary
enum Flow {
    Value(Value),
    Return(Value),
}

/// Unwrap an expression's flow into its value, forwarding `return`
macro_rules! try_value {
    ($flow:expr) => {
        match $flow {
            Flow::Value(v) => v,
            Flow::Return(v) => return Ok(Flow::Return(v)),
        }
    };
}

/// The result of evaluating a statement list
struct BlockOutcome {
    /// Output produced by inline emissions (text chunks and nested
    /// emitting fences); already escaped where escaping applies
    inline: String,
    /// The value of a `return` that fired in this list, if any
    ret: Option<Value>,
    /// The value of the last statement
    last: Value,
}

impl BlockOutcome {
    /// The list's overall value: inline emission supersedes the
    /// trailing value; a `return` supersedes the last statement
    fn value(self) -> Value {
        if !self.inline.is_empty() {
            Value::safe_html(self.inline)
        } else if let Some(v) = self.ret {
            v
        } else {
            self.last
        }
    }
}

/// Renders the block attached to a helper call and reads the scope
///
/// Passed to host helpers registered with
/// [`Context::set_helper`](crate::Context::set_helper). `block()` may be
/// called zero, one, or many times.
pub struct HelperContext<'a> {
    ev: &'a mut Evaluator,
    block: Option<&'a Block>,
    helper: &'a str,
    /// Set when the helper asked for a block the call never attached,
    /// so the dispatch site can report the dedicated error kind
    missing_block: bool,
}

impl HelperContext<'_> {
    /// Render the attached template block against the current scope
    pub fn block(&mut self) -> Result<String, String> {
        let Some(block) = self.block else {
            self.missing_block = true;
            return Err(format!("'{}' was called without a block", self.helper));
        };
        let outcome = self.ev.eval_block(block).map_err(|e| e.to_string())?;
        Ok(outcome.value().to_string())
    }

    /// Returns true if the call site attached a block
    #[must_use]
    pub fn has_block(&self) -> bool {
        self.block.is_some()
    }

    /// Read a binding from the current scope
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.ev.scope.get(name)
    }
}

/// The trellis evaluator
pub struct Evaluator {
    scope: Scope,
}

impl Evaluator {
    /// Create an evaluator whose root scope holds the built-in registry
    /// plus the context's bindings
    #[must_use]
    pub fn new(context: &Context) -> Self {
        let mut root = HashMap::new();
        builtins::install(&mut root);
        for (name, value) in context.bindings() {
            root.insert(name.clone(), value.clone());
        }
        Self {
            scope: Scope::with_root(root),
        }
    }

    /// Render a parsed program to a string
    ///
    /// The first error aborts the render; the output accumulated up to
    /// that point rides on the error as [`RuntimeError::partial`].
    pub fn render(&mut self, program: &Program) -> RuntimeResult<String> {
        let mut out = String::new();
        for item in &program.items {
            match item {
                Item::Text(text) => out.push_str(text),
                Item::Fence(fence) => {
                    if let Err(err) = self.eval_fence(fence, &mut out) {
                        return Err(err.with_partial(out));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Evaluate one top-level fence, appending to the output buffer
    fn eval_fence(&mut self, fence: &Fence, out: &mut String) -> RuntimeResult<()> {
        let outcome = self.eval_stmts(&fence.body)?;
        if fence.emitting {
            emit_value(&outcome.value(), out);
        }
        Ok(())
    }

    /// Evaluate a statement list, tracking inline output and `return`
    fn eval_stmts(&mut self, stmts: &[Stmt]) -> RuntimeResult<BlockOutcome> {
        let mut inline = String::new();
        let mut last = Value::Nil;

        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Text(text) => {
                    // Author-written markup: never escaped
                    inline.push_str(text);
                }
                StmtKind::Fence(fence) => {
                    let outcome = self.eval_stmts(&fence.body)?;
                    if fence.emitting {
                        emit_value(&outcome.value(), &mut inline);
                    }
                    last = Value::Nil;
                }
                StmtKind::Let { name, value } => {
                    match self.eval_expr(value)? {
                        Flow::Value(v) => self.scope.declare(&name.name, v),
                        Flow::Return(v) => {
                            return Ok(BlockOutcome {
                                inline,
                                ret: Some(v),
                                last: Value::Nil,
                            })
                        }
                    }
                    last = Value::Nil;
                }
                StmtKind::Assign { name, value } => {
                    match self.eval_expr(value)? {
                        Flow::Value(v) => self.scope.assign(&name.name, v),
                        Flow::Return(v) => {
                            return Ok(BlockOutcome {
                                inline,
                                ret: Some(v),
                                last: Value::Nil,
                            })
                        }
                    }
                    last = Value::Nil;
                }
                StmtKind::Return(value) => {
                    let v = match value {
                        Some(expr) => match self.eval_expr(expr)? {
                            Flow::Value(v) | Flow::Return(v) => v,
                        },
                        None => Value::Nil,
                    };
                    return Ok(BlockOutcome {
                        inline,
                        ret: Some(v),
                        last: Value::Nil,
                    });
                }
                StmtKind::Expr(expr) => match self.eval_expr(expr)? {
                    Flow::Value(v) => last = v,
                    Flow::Return(v) => {
                        return Ok(BlockOutcome {
                            inline,
                            ret: Some(v),
                            last: Value::Nil,
                        })
                    }
                },
            }
        }

        Ok(BlockOutcome {
            inline,
            ret: None,
            last,
        })
    }

    /// Evaluate a braced block in a fresh scope frame
    fn eval_block(&mut self, block: &Block) -> RuntimeResult<BlockOutcome> {
        self.scope.push();
        let outcome = self.eval_stmts(&block.stmts);
        self.scope.pop();
        outcome
    }

    /// Evaluate an expression
    #[allow(clippy::too_many_lines)] // One match arm per expression kind
    fn eval_expr(&mut self, expr: &Expr) -> RuntimeResult<Flow> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Flow::Value(match lit {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(n) => Value::Float(*n),
                Literal::Str(s) => Value::string(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Nil => Value::Nil,
            })),

            // A missing identifier is nil, not an error; calls are the
            // exception and are handled in eval_call
            ExprKind::Ident(ident) => Ok(Flow::Value(
                self.scope.get(&ident.name).unwrap_or(Value::Nil),
            )),

            ExprKind::Array(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                for elem in elems {
                    values.push(try_value!(self.eval_expr(elem)?));
                }
                Ok(Flow::Value(Value::array(values)))
            }

            ExprKind::Hash(pairs) => {
                let mut entries = HashMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    entries.insert(key.clone(), try_value!(self.eval_expr(value)?));
                }
                Ok(Flow::Value(Value::hash(entries)))
            }

            ExprKind::Unary { op, expr: operand } => {
                let value = try_value!(self.eval_expr(operand)?);
                match op {
                    UnaryOp::Not => Ok(Flow::Value(Value::Bool(!value.is_truthy()))),
                    UnaryOp::Neg => match value {
                        Value::Int(i) => Ok(Flow::Value(Value::Int(-i))),
                        Value::Float(n) => Ok(Flow::Value(Value::Float(-n))),
                        other => Err(RuntimeError::new(
                            RuntimeErrorKind::TypeError {
                                expected: "number",
                                got: other.type_name(),
                                operation: "unary -",
                            },
                            operand.span,
                        )),
                    },
                }
            }

            ExprKind::Binary { left, op, right } => self.eval_binary(expr.span, left, *op, right),

            ExprKind::Index { expr: target, index } => {
                let target_value = try_value!(self.eval_expr(target)?);
                let index_value = try_value!(self.eval_expr(index)?);
                Ok(Flow::Value(eval_index(
                    &target_value,
                    &index_value,
                    index.span,
                )?))
            }

            ExprKind::Field { expr: target, field } => {
                let target_value = try_value!(self.eval_expr(target)?);
                match target_value {
                    Value::Hash(m) => Ok(Flow::Value(
                        m.borrow().get(&field.name).cloned().unwrap_or(Value::Nil),
                    )),
                    Value::Host(h) => {
                        Ok(Flow::Value(h.field(&field.name).unwrap_or(Value::Nil)))
                    }
                    Value::Nil => Ok(Flow::Value(Value::Nil)),
                    other => Err(RuntimeError::new(
                        RuntimeErrorKind::TypeError {
                            expected: "hash or host value",
                            got: other.type_name(),
                            operation: "field access",
                        },
                        field.span,
                    )),
                }
            }

            ExprKind::FnLit { params, body } => Ok(Flow::Value(Value::Function(Rc::new(
                TemplateFn {
                    params: params.iter().map(|p| p.name.clone()).collect(),
                    body: body.clone(),
                    captured: self.scope.capture(),
                },
            )))),

            ExprKind::Call {
                callee,
                args,
                block,
            } => self.eval_call(expr.span, callee, args, block.as_ref()),

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_value = try_value!(self.eval_expr(cond)?);
                let outcome = if cond_value.is_truthy() {
                    self.eval_block(then_branch)?
                } else {
                    match else_branch {
                        Some(ElseBranch::Block(block)) => self.eval_block(block)?,
                        Some(ElseBranch::If(nested)) => return self.eval_expr(nested),
                        None => return Ok(Flow::Value(Value::Nil)),
                    }
                };
                let returned = outcome.ret.is_some() && outcome.inline.is_empty();
                let value = outcome.value();
                if returned {
                    Ok(Flow::Return(value))
                } else {
                    Ok(Flow::Value(value))
                }
            }

            ExprKind::For {
                key,
                value,
                iter,
                body,
            } => self.eval_for(key.as_ref(), value, iter, body),
        }
    }

    /// Evaluate a binary operation, short-circuiting `&&` / `||`
    fn eval_binary(
        &mut self,
        span: Span,
        left: &Expr,
        op: BinOp,
        right: &Expr,
    ) -> RuntimeResult<Flow> {
        // Short-circuit forms evaluate the right side conditionally
        match op {
            BinOp::And => {
                let l = try_value!(self.eval_expr(left)?);
                if !l.is_truthy() {
                    return Ok(Flow::Value(Value::Bool(false)));
                }
                let r = try_value!(self.eval_expr(right)?);
                return Ok(Flow::Value(Value::Bool(r.is_truthy())));
            }
            BinOp::Or => {
                let l = try_value!(self.eval_expr(left)?);
                if l.is_truthy() {
                    return Ok(Flow::Value(Value::Bool(true)));
                }
                let r = try_value!(self.eval_expr(right)?);
                return Ok(Flow::Value(Value::Bool(r.is_truthy())));
            }
            _ => {}
        }

        let l = try_value!(self.eval_expr(left)?);
        let r = try_value!(self.eval_expr(right)?);

        let type_error = |operation: &'static str| {
            RuntimeError::new(
                RuntimeErrorKind::TypeError {
                    expected: "compatible operands",
                    got: l.type_name(),
                    operation,
                },
                span,
            )
        };

        let value = match op {
            BinOp::Add => add_values(&l, &r).ok_or_else(|| type_error("+"))?,
            BinOp::Sub => numeric_op(&l, &r, |a, b| a - b, |a, b| a - b)
                .ok_or_else(|| type_error("-"))?,
            BinOp::Mul => numeric_op(&l, &r, |a, b| a * b, |a, b| a * b)
                .ok_or_else(|| type_error("*"))?,
            BinOp::Div => {
                if is_zero(&r) {
                    return Err(RuntimeError::new(RuntimeErrorKind::DivisionByZero, span));
                }
                numeric_op(&l, &r, |a, b| a / b, |a, b| a / b).ok_or_else(|| type_error("/"))?
            }
            BinOp::Eq => Value::Bool(values_equal(&l, &r)),
            BinOp::Ne => Value::Bool(!values_equal(&l, &r)),
            BinOp::Lt => Value::Bool(
                compare_values(&l, &r).ok_or_else(|| type_error("<"))? == Ordering::Less,
            ),
            BinOp::Le => Value::Bool(
                compare_values(&l, &r).ok_or_else(|| type_error("<="))? != Ordering::Greater,
            ),
            BinOp::Gt => Value::Bool(
                compare_values(&l, &r).ok_or_else(|| type_error(">"))? == Ordering::Greater,
            ),
            BinOp::Ge => Value::Bool(
                compare_values(&l, &r).ok_or_else(|| type_error(">="))? != Ordering::Less,
            ),
            BinOp::And | BinOp::Or => unreachable!("short-circuit forms handled above"),
        };
        Ok(Flow::Value(value))
    }

    /// Evaluate a `for` loop over an array, hash, range, or host value
    fn eval_for(
        &mut self,
        key: Option<&Ident>,
        value: &Ident,
        iter: &Expr,
        body: &Block,
    ) -> RuntimeResult<Flow> {
        let iterable = try_value!(self.eval_expr(iter)?);

        let pairs: Vec<(Value, Value)> = match &iterable {
            Value::Array(l) => l
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Int(i as i64), v.clone()))
                .collect(),
            Value::Hash(m) => m
                .borrow()
                .iter()
                .map(|(k, v)| (Value::string(k.clone()), v.clone()))
                .collect(),
            Value::Range(r) => (r.start..=r.end)
                .map(|i| (Value::Int(i - r.start), Value::Int(i)))
                .collect(),
            Value::Host(h) => h.iter().ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::NotIterable(iterable.type_name()),
                    iter.span,
                )
            })?,
            // A missing iterable skips the loop
            Value::Nil => Vec::new(),
            other => {
                return Err(RuntimeError::new(
                    RuntimeErrorKind::NotIterable(other.type_name()),
                    iter.span,
                ))
            }
        };

        // Pieces of loop output in encounter order: inline emissions
        // are already safe, returned values still need escaping
        let mut pieces: Vec<(bool, String)> = Vec::new();

        for (k, v) in pairs {
            self.scope.push();
            if let Some(key_ident) = key {
                self.scope.declare(&key_ident.name, k);
                self.scope.declare(&value.name, v);
            } else {
                self.scope.declare(&value.name, v);
            }
            let outcome = self.eval_stmts(&body.stmts);
            self.scope.pop();
            let outcome = outcome?;

            if !outcome.inline.is_empty() {
                pieces.push((true, outcome.inline));
            } else if let Some(returned) = outcome.ret {
                pieces.push((false, returned.to_string()));
            }
        }

        if pieces.is_empty() {
            return Ok(Flow::Value(Value::Nil));
        }
        let any_safe = pieces.iter().any(|(safe, _)| *safe);
        let result = if any_safe {
            let mut out = String::new();
            for (safe, piece) in pieces {
                if safe {
                    out.push_str(&piece);
                } else {
                    out.push_str(&escape_html(&piece));
                }
            }
            Value::safe_html(out)
        } else {
            Value::string(
                pieces
                    .into_iter()
                    .map(|(_, piece)| piece)
                    .collect::<String>(),
            )
        };
        Ok(Flow::Value(result))
    }

    /// Evaluate a call: resolve the callee, evaluate arguments left to
    /// right, then dispatch
    fn eval_call(
        &mut self,
        span: Span,
        callee: &Expr,
        args: &[Expr],
        block: Option<&Block>,
    ) -> RuntimeResult<Flow> {
        enum Target {
            Callable(Value, String),
            HostMethod(Rc<dyn HostValue>, String),
        }

        let target = match &callee.kind {
            // An unbound name in call position is an error, unlike in
            // value position
            ExprKind::Ident(ident) => match self.scope.get(&ident.name) {
                Some(v) => Target::Callable(v, ident.name.clone()),
                None => {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::UnknownFunction(ident.name.clone()),
                        ident.span,
                    ))
                }
            },
            ExprKind::Field { expr: recv, field } => {
                let receiver = try_value!(self.eval_expr(recv)?);
                match receiver {
                    Value::Host(host) => Target::HostMethod(host, field.name.clone()),
                    Value::Hash(m) => {
                        let found = m.borrow().get(&field.name).cloned();
                        match found {
                            Some(v) => Target::Callable(v, field.name.clone()),
                            None => {
                                return Err(RuntimeError::new(
                                    RuntimeErrorKind::UnknownFunction(field.name.clone()),
                                    field.span,
                                ))
                            }
                        }
                    }
                    other => {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::NotCallable(other.type_name()),
                            field.span,
                        ))
                    }
                }
            }
            _ => {
                let v = try_value!(self.eval_expr(callee)?);
                Target::Callable(v, "anonymous function".to_string())
            }
        };

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(try_value!(self.eval_expr(arg)?));
        }

        match target {
            Target::HostMethod(host, method) => {
                if let Some(result) = host.call(&method, &arg_values) {
                    return result.map(Flow::Value).map_err(|message| {
                        RuntimeError::new(
                            RuntimeErrorKind::HelperFailed {
                                name: method.clone(),
                                message,
                            },
                            span,
                        )
                    });
                }
                // No such method: a field holding a callable still works
                match host.field(&method) {
                    Some(callable) => self.call_value(callable, &method, arg_values, block, span),
                    None => Err(RuntimeError::new(
                        RuntimeErrorKind::UnknownFunction(method),
                        span,
                    )),
                }
            }
            Target::Callable(callable, name) => {
                self.call_value(callable, &name, arg_values, block, span)
            }
        }
    }

    /// Invoke a callable value with already-evaluated arguments
    fn call_value(
        &mut self,
        callable: Value,
        name: &str,
        args: Vec<Value>,
        block: Option<&Block>,
        span: Span,
    ) -> RuntimeResult<Flow> {
        match callable {
            Value::Function(f) => {
                if args.len() != f.params.len() {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ArityMismatch {
                            name: name.to_string(),
                            expected: f.params.len(),
                            got: args.len(),
                        },
                        span,
                    ));
                }
                let saved = self.scope.replace_frames(f.captured.clone());
                self.scope.push();
                for (param, arg) in f.params.iter().zip(args) {
                    self.scope.declare(param.clone(), arg);
                }
                let outcome = self.eval_stmts(&f.body.stmts);
                self.scope.pop();
                self.scope.replace_frames(saved);
                // A function's result is its return value; an implicit
                // trailing value is discarded
                Ok(Flow::Value(outcome?.ret.unwrap_or(Value::Nil)))
            }
            Value::NativeFn(native) => {
                if native.arity >= 0 && args.len() != native.arity as usize {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ArityMismatch {
                            name: (*native.name).clone(),
                            expected: native.arity as usize,
                            got: args.len(),
                        },
                        span,
                    ));
                }
                (native.func)(&args).map(Flow::Value).map_err(|message| {
                    RuntimeError::new(
                        RuntimeErrorKind::HelperFailed {
                            name: (*native.name).clone(),
                            message,
                        },
                        span,
                    )
                })
            }
            Value::Helper(helper) => {
                let func = Rc::clone(&helper.func);
                let helper_name = (*helper.name).clone();
                let mut ctx = HelperContext {
                    ev: self,
                    block,
                    helper: &helper_name,
                    missing_block: false,
                };
                match func(&args, &mut ctx) {
                    Ok(v) => Ok(Flow::Value(v)),
                    Err(message) => {
                        // A failure after an unanswered block request gets
                        // the dedicated kind so callers can tell it apart
                        // from helper logic errors
                        let missing_block = ctx.missing_block;
                        let kind = if missing_block {
                            RuntimeErrorKind::MissingBlock(helper_name)
                        } else {
                            RuntimeErrorKind::HelperFailed {
                                name: helper_name,
                                message,
                            }
                        };
                        Err(RuntimeError::new(kind, span))
                    }
                }
            }
            other => Err(RuntimeError::new(
                RuntimeErrorKind::NotCallable(other.type_name()),
                span,
            )),
        }
    }
}

/// Append a fence result to a buffer: nil emits nothing, safe HTML is
/// copied raw, everything else is rendered and escaped
fn emit_value(value: &Value, out: &mut String) {
    match value {
        Value::Nil => {}
        Value::SafeHtml(s) => out.push_str(s),
        other => out.push_str(&escape_html(&other.to_string())),
    }
}

/// Index into an array (integer only) or hash (key stringified);
/// out-of-range and missing keys are nil
fn eval_index(target: &Value, index: &Value, span: Span) -> RuntimeResult<Value> {
    match target {
        Value::Array(l) => match index {
            Value::Int(i) => {
                if *i < 0 {
                    return Ok(Value::Nil);
                }
                Ok(l.borrow().get(*i as usize).cloned().unwrap_or(Value::Nil))
            }
            other => Err(RuntimeError::new(
                RuntimeErrorKind::InvalidIndexType {
                    target: "Array",
                    got: other.type_name(),
                },
                span,
            )),
        },
        Value::Hash(m) => {
            let key = match index {
                Value::Str(s) | Value::SafeHtml(s) => (**s).clone(),
                Value::Int(_) | Value::Float(_) | Value::Bool(_) => index.to_string(),
                other => {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::InvalidIndexType {
                            target: "Hash",
                            got: other.type_name(),
                        },
                        span,
                    ))
                }
            };
            Ok(m.borrow().get(&key).cloned().unwrap_or(Value::Nil))
        }
        // Indexing into a missing value stays nil
        Value::Nil => Ok(Value::Nil),
        other => Err(RuntimeError::new(
            RuntimeErrorKind::TypeError {
                expected: "array or hash",
                got: other.type_name(),
                operation: "index",
            },
            span,
        )),
    }
}

/// The overloaded `+`: numeric addition with int/float promotion, or
/// string concatenation (numbers stringified); SafeHtml escapes the
/// plain side and keeps its tag
fn add_values(l: &Value, r: &Value) -> Option<Value> {
    use Value::{Float, Int, SafeHtml, Str};
    Some(match (l, r) {
        (Int(a), Int(b)) => Int(a + b),
        (Int(a), Float(b)) => Float(*a as f64 + b),
        (Float(a), Int(b)) => Float(a + *b as f64),
        (Float(a), Float(b)) => Float(a + b),
        (SafeHtml(a), SafeHtml(b)) => Value::safe_html(format!("{a}{b}")),
        (SafeHtml(a), Str(b)) => Value::safe_html(format!("{a}{}", escape_html(b))),
        (Str(a), SafeHtml(b)) => Value::safe_html(format!("{}{b}", escape_html(a))),
        (SafeHtml(a), Int(_) | Float(_)) => Value::safe_html(format!("{a}{r}")),
        (Int(_) | Float(_), SafeHtml(b)) => Value::safe_html(format!("{l}{b}")),
        (Str(a), Str(b)) => Value::string(format!("{a}{b}")),
        (Str(a), Int(_) | Float(_)) => Value::string(format!("{a}{r}")),
        (Int(_) | Float(_), Str(b)) => Value::string(format!("{l}{b}")),
        _ => return None,
    })
}

/// Apply a numeric operator with int/float promotion
fn numeric_op(
    l: &Value,
    r: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Option<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(int_op(*a, *b))),
        (Value::Int(a), Value::Float(b)) => Some(Value::Float(float_op(*a as f64, *b))),
        (Value::Float(a), Value::Int(b)) => Some(Value::Float(float_op(*a, *b as f64))),
        (Value::Float(a), Value::Float(b)) => Some(Value::Float(float_op(*a, *b))),
        _ => None,
    }
}

fn is_zero(v: &Value) -> bool {
    matches!(v, Value::Int(0)) || matches!(v, Value::Float(n) if *n == 0.0)
}

/// Structural equality with int/float promotion
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => l == r,
    }
}

/// Ordering for numerics (promoted) and strings (lexicographic)
fn compare_values(l: &Value, r: &Value) -> Option<Ordering> {
    use Value::{Float, Int, SafeHtml, Str};
    match (l, r) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Str(a) | SafeHtml(a), Str(b) | SafeHtml(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn render(source: &str) -> String {
        render_with(source, &Context::new())
    }

    fn render_with(source: &str, ctx: &Context) -> String {
        let program = Parser::parse(source).expect("template should parse");
        Evaluator::new(ctx)
            .render(&program)
            .expect("render should succeed")
    }

    fn render_err(source: &str, ctx: &Context) -> RuntimeError {
        let program = Parser::parse(source).expect("template should parse");
        Evaluator::new(ctx)
            .render(&program)
            .expect_err("render should fail")
    }

    #[test]
    fn arithmetic() {
        assert_eq!(render("<%= 1 + 2 * 3 %>"), "7");
        assert_eq!(render("<%= 7 / 2 %>"), "3");
        assert_eq!(render("<%= 7.0 / 2 %>"), "3.5");
        assert_eq!(render("<%= 1 + 0.5 %>"), "1.5");
        assert_eq!(render("<%= -(3) %>"), "-3");
    }

    #[test]
    fn division_by_zero_errors() {
        let err = render_err("<%= 1 / 0 %>", &Context::new());
        assert_eq!(err.kind, RuntimeErrorKind::DivisionByZero);
    }

    #[test]
    fn string_concat() {
        assert_eq!(render(r#"<%= "a" + "b" %>"#), "ab");
        assert_eq!(render(r#"<%= "n=" + 3 %>"#), "n=3");
        assert_eq!(render(r#"<%= 3 + "!" %>"#), "3!");
    }

    #[test]
    fn subtracting_strings_errors() {
        let err = render_err(r#"<%= "a" - "b" %>"#, &Context::new());
        assert!(matches!(err.kind, RuntimeErrorKind::TypeError { .. }));
    }

    #[test]
    fn comparisons() {
        assert_eq!(render("<%= 1 < 2 %>"), "true");
        assert_eq!(render("<%= 2 <= 2 %>"), "true");
        assert_eq!(render("<%= 1 >= 2 %>"), "false");
        assert_eq!(render("<%= 1 == 1.0 %>"), "true");
        assert_eq!(render(r#"<%= "abc" < "abd" %>"#), "true");
        assert_eq!(render("<%= nil == nil %>"), "true");
        assert_eq!(render("<%= nil == 0 %>"), "false");
    }

    #[test]
    fn truthiness_and_short_circuit() {
        assert_eq!(render("<%= !false %>"), "true");
        // The right side never runs; an unknown function there would
        // otherwise abort the render
        assert_eq!(render("<%= false && boom() %>"), "false");
        assert_eq!(render("<%= true || boom() %>"), "true");
    }

    #[test]
    fn missing_identifier_is_nil() {
        assert_eq!(render("<p><%= name %></p>"), "<p></p>");
        assert_eq!(render("<%= missing == nil %>"), "true");
    }

    #[test]
    fn missing_function_is_an_error() {
        let err = render_err("<%= boom() %>", &Context::new());
        assert_eq!(
            err.kind,
            RuntimeErrorKind::UnknownFunction("boom".to_string())
        );
    }

    #[test]
    fn indexing() {
        let ctx = Context::new();
        assert_eq!(render_with(r#"<%= ["a", "b"][1] %>"#, &ctx), "b");
        assert_eq!(render_with(r#"<%= ["a", "b"][9] %>"#, &ctx), "");
        assert_eq!(render_with(r#"<%= {a: "A"}["a"] %>"#, &ctx), "A");
        assert_eq!(render_with(r#"<%= {a: "A"}["z"] %>"#, &ctx), "");
    }

    #[test]
    fn array_index_requires_int() {
        let err = render_err(r#"<%= [1]["x"] %>"#, &Context::new());
        assert!(matches!(
            err.kind,
            RuntimeErrorKind::InvalidIndexType { target: "Array", .. }
        ));
    }

    #[test]
    fn hash_field_access() {
        assert_eq!(render(r#"<% let h = {a: "A"} %><%= h.a %>"#), "A");
        assert_eq!(render(r#"<% let h = {a: "A"} %><%= h.z %>"#), "");
    }

    #[test]
    fn let_spans_fences() {
        assert_eq!(render(r#"<% let x = 40 %><%= x + 2 %>"#), "42");
    }

    #[test]
    fn assignment_updates_binding() {
        assert_eq!(render("<% let x = 1; x = 5 %><%= x %>"), "5");
    }

    #[test]
    fn block_scopes_shadow() {
        assert_eq!(
            render("<% let x = 1 %><% if (true) { let x = 2 } %><%= x %>"),
            "1"
        );
    }

    #[test]
    fn if_returns_value() {
        assert_eq!(render(r#"<%= if (true) { return "hi" } %>"#), "hi");
        assert_eq!(
            render(r#"<%= if (false) { return "hi" } else { return "bye" } %>"#),
            "bye"
        );
        assert_eq!(render(r#"<% if (true) { return "hi" } %>"#), "");
    }

    #[test]
    fn else_if_chain() {
        let tpl = r#"<%= if (n == 1) { return "one" } else if (n == 2) { return "two" } else { return "many" } %>"#;
        let mut ctx = Context::new();
        ctx.set("n", Value::Int(2));
        assert_eq!(render_with(tpl, &ctx), "two");
        ctx.set("n", Value::Int(9));
        assert_eq!(render_with(tpl, &ctx), "many");
    }

    #[test]
    fn inline_emission_inside_if() {
        assert_eq!(render("<%= if (true) { %>hi<% } %>"), "hi");
        assert_eq!(
            render("<p><%= if (true) { %>hi<% } else { %>bye<% } %></p>"),
            "<p>hi</p>"
        );
    }

    #[test]
    fn inline_markup_is_not_escaped() {
        assert_eq!(
            render("<%= if (true) { %><b>bold</b><% } %>"),
            "<b>bold</b>"
        );
    }

    #[test]
    fn for_collects_returns() {
        assert_eq!(
            render(r#"<%= for (i, v) in ["a", "b", "c"] { return v } %>"#),
            "abc"
        );
        assert_eq!(
            render(r#"<% for (i, v) in ["a", "b", "c"] { return v } %>"#),
            ""
        );
    }

    #[test]
    fn for_returned_values_are_escaped_on_emit() {
        assert_eq!(
            render(r#"<%= for (v) in ["<b>"] { return v } %>"#),
            "&lt;b&gt;"
        );
    }

    #[test]
    fn for_iterates_ranges() {
        assert_eq!(render("<%= for (v) in range(3, 5) { %><%= v %><% } %>"), "345");
        assert_eq!(render("<%= for (v) in between(3, 6) { %><%= v %><% } %>"), "45");
        assert_eq!(render("<%= for (v) in until(3) { %><%= v %><% } %>"), "012");
    }

    #[test]
    fn for_over_nil_is_empty() {
        assert_eq!(render("<%= for (v) in missing { return v } %>"), "");
    }

    #[test]
    fn for_over_number_errors() {
        let err = render_err("<% for (v) in 5 { return v } %>", &Context::new());
        assert_eq!(err.kind, RuntimeErrorKind::NotIterable("Int"));
    }

    #[test]
    fn loop_variables_are_scoped_to_the_loop() {
        assert_eq!(render("<% for (v) in until(3) { v } %><%= v %>"), "");
    }

    #[test]
    fn user_functions() {
        assert_eq!(
            render("<% let add = fn(x) { return x + 2; }; %><%= add(2) %>"),
            "4"
        );
    }

    #[test]
    fn user_function_without_return_yields_nil() {
        assert_eq!(render("<% let f = fn(x) { x + 2 }; %><%= f(2) %>"), "");
    }

    #[test]
    fn user_function_arity_checked() {
        let err = render_err(
            "<% let f = fn(x, y) { return x }; %><%= f(1) %>",
            &Context::new(),
        );
        assert!(matches!(
            err.kind,
            RuntimeErrorKind::ArityMismatch { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn user_functions_capture_definition_scope() {
        assert_eq!(
            render("<% let base = 10; let f = fn(x) { return base + x } %><%= f(5) %>"),
            "15"
        );
    }

    #[test]
    fn native_function_error_aborts() {
        let mut ctx = Context::new();
        ctx.set_native("f", 0, |_| Err("oops!".to_string()));
        let err = render_err("<p><%= f() %></p>", &ctx);
        assert!(matches!(err.kind, RuntimeErrorKind::HelperFailed { .. }));
    }

    #[test]
    fn errors_carry_partial_output() {
        let err = render_err("<p>before</p><%= boom() %>", &Context::new());
        assert_eq!(err.partial, "<p>before</p>");

        let err = render_err("<%= 1 / 0 %>", &Context::new());
        assert_eq!(err.partial, "");
    }

    #[test]
    fn escaping_applies_to_fence_results_only() {
        assert_eq!(
            render(r#"<p><%= "<script>alert('pwned')</script>" %></p>"#),
            "<p>&lt;script&gt;alert(&#39;pwned&#39;)&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn safe_html_skips_escaping() {
        let mut ctx = Context::new();
        ctx.set("markup", Value::safe_html("<b>ok</b>"));
        assert_eq!(render_with("<%= markup %>", &ctx), "<b>ok</b>");
    }

    #[test]
    fn safe_html_concat_escapes_plain_side() {
        let mut ctx = Context::new();
        ctx.set("markup", Value::safe_html("<b>"));
        assert_eq!(
            render_with(r#"<%= markup + "<i>" %>"#, &ctx),
            "<b>&lt;i&gt;"
        );
    }

    #[test]
    fn raw_builtin_marks_safe() {
        assert_eq!(render(r#"<%= raw("<b>") %>"#), "<b>");
    }

    #[test]
    fn helper_block_protocol() {
        let mut ctx = Context::new();
        ctx.set_helper("f", |_args, h| h.block().map(Value::string));
        assert_eq!(
            render_with("<p><%= f() { %>hello<% } %></p>", &ctx),
            "<p>hello</p>"
        );
    }

    #[test]
    fn helper_block_runs_on_demand() {
        let mut ctx = Context::new();
        ctx.set_helper("twice", |_args, h| {
            let once = h.block()?;
            let again = h.block()?;
            Ok(Value::string(format!("{once}{again}")))
        });
        assert_eq!(render_with("<%= twice() { %>x<% } %>", &ctx), "xx");
    }

    #[test]
    fn helper_without_block_errors_when_asked() {
        let mut ctx = Context::new();
        ctx.set_helper("f", |_args, h| h.block().map(Value::string));
        let err = render_err("<%= f() %>", &ctx);
        assert_eq!(err.kind, RuntimeErrorKind::MissingBlock("f".to_string()));
    }

    #[test]
    fn helper_logic_error_is_not_a_missing_block() {
        let mut ctx = Context::new();
        ctx.set_helper("f", |_args, _h| Err("kaput".to_string()));
        let err = render_err("<%= f() { %>x<% } %>", &ctx);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::HelperFailed {
                name: "f".to_string(),
                message: "kaput".to_string(),
            }
        );
    }

    #[test]
    fn helper_reads_current_scope() {
        let mut ctx = Context::new();
        ctx.set_helper("who", |_args, h| {
            Ok(h.value("name").unwrap_or(Value::Nil))
        });
        assert_eq!(render_with(r#"<% let name = "Mark" %><%= who() %>"#, &ctx), "Mark");
    }

    #[test]
    fn host_record_field_and_method() {
        struct Greeter;
        impl HostValue for Greeter {
            fn kind(&self) -> &'static str {
                "Greeter"
            }
            fn field(&self, name: &str) -> Option<Value> {
                (name == "name").then(|| Value::string("Mark"))
            }
            fn call(&self, method: &str, args: &[Value]) -> Option<Result<Value, String>> {
                (method == "greet").then(|| Ok(Value::string(format!("hi {}!", args[0]))))
            }
        }

        let mut ctx = Context::new();
        ctx.set("g", Value::host(Greeter));
        assert_eq!(render_with("<%= g.name %>", &ctx), "Mark");
        assert_eq!(render_with("<%= g.missing %>", &ctx), "");
        assert_eq!(render_with(r#"<%= g.greet("mark") %>"#, &ctx), "hi mark!");
    }

    #[test]
    fn unknown_host_method_errors() {
        struct Empty;
        impl HostValue for Empty {
            fn kind(&self) -> &'static str {
                "Empty"
            }
        }
        let mut ctx = Context::new();
        ctx.set("e", Value::host(Empty));
        let err = render_err("<%= e.nope() %>", &ctx);
        assert_eq!(
            err.kind,
            RuntimeErrorKind::UnknownFunction("nope".to_string())
        );
    }
}
