use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// The type of error that can occur when compiling a production file or
/// evaluating forms against a scope.
#[derive(Debug, PartialEq)]
pub struct Error(pub(crate) ErrorRepr);

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            ErrorRepr::Grammar(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum ErrorRepr {
    Grammar(peg::error::ParseError<peg::str::LineCol>),
    DuplicateNonterminals(HashSet<String>),
    UnknownNonterminal(String),
    UnknownReference(String),
    UnknownForm(String),
    Type {
        what: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    Arity {
        form: &'static str,
        msg: &'static str,
    },
    BadRange(&'static str),
    Weigh(String),
    Bag { path: PathBuf, detail: String },
    Format(String),
    WeightExhausted(String),
    RecursionLimit(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorRepr::Grammar(e) => e.fmt(f),
            ErrorRepr::DuplicateNonterminals(e) => {
                write!(f, "duplicate nonterminal definitions: {:?}", e)
            }
            ErrorRepr::UnknownNonterminal(e) => write!(f, "unknown nonterminal: {}", e),
            ErrorRepr::UnknownReference(e) => write!(f, "unknown reference: {}", e),
            ErrorRepr::UnknownForm(e) => write!(f, "unknown form name: {}", e),
            ErrorRepr::Type {
                what,
                expected,
                got,
            } => write!(f, "{}: expected {}, got {}", what, expected, got),
            ErrorRepr::Arity { form, msg } => write!(f, "{}: {}", form, msg),
            ErrorRepr::BadRange(form) => write!(f, "{}: lo must be less than hi", form),
            ErrorRepr::Weigh(e) => write!(f, "weigh: {}", e),
            ErrorRepr::Bag { path, detail } => write!(f, "bag {}: {}", path.display(), detail),
            ErrorRepr::Format(e) => write!(f, "sprintf: {}", e),
            ErrorRepr::WeightExhausted(name) => {
                write!(f, "no selectable rule for nonterminal {}", name)
            }
            ErrorRepr::RecursionLimit(n) => {
                write!(f, "nonterminal recursion exceeded {} levels", n)
            }
        }
    }
}
