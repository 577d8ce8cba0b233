use crate::error::{Error, ErrorRepr};
use crate::form::Form;

use std::fmt::{self, Write};
use std::sync::Arc;

/// The dynamic value domain carried through evaluation.
///
/// Builtins document which variants they accept; handing one a mismatched
/// variant is a fatal evaluation error. `Nil` is not an error: a rule whose
/// token evaluates to `Nil` is cancelled and itself yields `Nil`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Form(Arc<Form>),
    Nil,
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Form(_) => "form",
            Value::Nil => "nil",
        }
    }

    pub(crate) fn as_str(&self, what: &'static str) -> Result<&str, Error> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(type_err(what, "string", other)),
        }
    }

    pub(crate) fn as_int(&self, what: &'static str) -> Result<i64, Error> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(type_err(what, "int", other)),
        }
    }

    pub(crate) fn as_float(&self, what: &'static str) -> Result<f64, Error> {
        match self {
            Value::Float(v) => Ok(*v),
            other => Err(type_err(what, "float", other)),
        }
    }

    /// Numeric accessor: ints widen to `f64`.
    pub(crate) fn as_num(&self, what: &'static str) -> Result<f64, Error> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            other => Err(type_err(what, "number", other)),
        }
    }

    /// Appends the display rendering of `self` to `out`. This is the
    /// formatting rule concatenation uses, so it sits on the generation
    /// hot path and formats integers through a stack buffer.
    pub(crate) fn write_to(&self, out: &mut String) {
        match self {
            Value::Int(v) => out.push_str(itoa::Buffer::new().format(*v)),
            Value::Float(v) => {
                let _ = write!(out, "{}", v);
            }
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Str(s) => out.push_str(s),
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
            Value::Form(form) => {
                let _ = write!(out, "{}", form);
            }
            Value::Nil => out.push_str("<nil>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        self.write_to(&mut buf);
        f.write_str(&buf)
    }
}

fn type_err(what: &'static str, expected: &'static str, got: &Value) -> Error {
    Error(ErrorRepr::Type {
        what,
        expected,
        got: got.type_name(),
    })
}
