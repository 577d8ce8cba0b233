use crate::builtin::Builtin;
use crate::value::Value;

use std::fmt;

/// An executable grammar element.
///
/// Every piece of a compiled production file (a literal, a reference, a
/// rule body, a builtin application) is a `Form` carrying a name tag, an
/// operation, and the selection weight fields used when the form is a rule
/// alternative of a nonterminal.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    name: String,
    op: Op,
    weight: f64,
    restraint: f64,
    weighted: bool,
}

/// What a form does when evaluated. Dispatch is a match in the evaluator
/// rather than a stored closure, which keeps forms plain comparable data.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    /// A parsed literal (`##literaltok`): int, float or bool.
    Literal(Value),
    /// A raw bareword in form-argument position (`##formtok`).
    FormTok(String),
    /// An uppercase terminal (`##term`), resolved to its text at compile time.
    Term { name: String, text: String },
    /// A quoted string (`##string`).
    Str(String),
    /// A lowercase identifier in rule position (`##ident`): expands the
    /// nonterminal of that name.
    Ident(String),
    /// A `$name` or `#name` reference (`##ref`).
    Ref(String),
    /// One rule alternative (`##rule`): evaluates its tokens in order and
    /// concatenates the results.
    Rule(Vec<Form>),
    /// Application of a builtin form: arguments are evaluated first.
    Apply(Builtin, Vec<Form>),
    /// Application of a nonterminal by name (`#name`); arguments, if any,
    /// are ignored.
    Expand(String),
}

impl Form {
    pub(crate) fn new(name: impl Into<String>, op: Op) -> Self {
        Form {
            name: name.into(),
            op,
            weight: 0.0,
            restraint: 0.0,
            weighted: false,
        }
    }

    /// The form's name tag, e.g. `##rule`, `##ref`, `bag` or `#json`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn op(&self) -> &Op {
        &self.op
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn restraint(&self) -> f64 {
        self.restraint
    }

    /// Sets the weight only if no explicit weight has been installed.
    pub fn set_default_weight(&mut self, weight: f64) {
        if !self.weighted {
            self.weight = weight;
        }
    }

    /// Installs an explicit weight and restraint, overriding the default.
    pub fn set_weight(&mut self, weight: f64, restraint: f64) {
        self.weight = weight;
        self.restraint = restraint;
        self.weighted = true;
    }

    pub(crate) fn is_weighted(&self) -> bool {
        self.weighted
    }
}

fn join(forms: &[Form], sep: &str) -> String {
    forms
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<String>>()
        .join(sep)
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            _ => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

/// Pretty prints the form as production-file source. Reparsing the output
/// of a whole grammar yields a structurally equal grammar.
impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            Op::Literal(Value::Float(v)) => write!(f, "{:?}", v),
            Op::Literal(v) => write!(f, "{}", v),
            Op::FormTok(s) => f.write_str(s),
            Op::Term { name, .. } => f.write_str(name),
            Op::Str(s) => write_quoted(f, s),
            Op::Ident(name) => f.write_str(name),
            Op::Ref(r) => f.write_str(r),
            Op::Rule(parts) => {
                if self.weighted {
                    write!(f, "(weigh {} {})", self.weight, self.restraint)?;
                    if !parts.is_empty() {
                        f.write_str(" ")?;
                    }
                }
                f.write_str(&join(parts, " "))
            }
            Op::Apply(b, args) => {
                if args.is_empty() {
                    write!(f, "({})", b.as_str())
                } else {
                    write!(f, "({} {})", b.as_str(), join(args, " "))
                }
            }
            Op::Expand(name) => write!(f, "({})", name),
        }
    }
}
