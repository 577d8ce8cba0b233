use crate::error::{Error, ErrorRepr};
use crate::eval::eval;
use crate::form::Form;
use crate::scope::Scope;
use crate::value::Value;

use rand::{Rng, RngCore};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// The builtin forms available to every production file.
///
/// Inside a form application a builtin name always wins over a nonterminal
/// of the same name; the context builder warns about such collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, enum_iterator::Sequence)]
pub enum Builtin {
    Let,
    Letr,
    Global,
    Weigh,
    Bag,
    Range,
    Rangef,
    Ranget,
    Choice,
    Uuid,
    Inc,
    Dec,
    Len,
    Sprintf,
}

impl Builtin {
    /// Iterates every builtin, e.g. to check a grammar's nonterminal names
    /// for collisions.
    pub fn all() -> impl Iterator<Item = Self> {
        enum_iterator::all::<Self>()
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Let => "let",
            Self::Letr => "letr",
            Self::Global => "global",
            Self::Weigh => "weigh",
            Self::Bag => "bag",
            Self::Range => "range",
            Self::Rangef => "rangef",
            Self::Ranget => "ranget",
            Self::Choice => "choice",
            Self::Uuid => "uuid",
            Self::Inc => "inc",
            Self::Dec => "dec",
            Self::Len => "len",
            Self::Sprintf => "sprintf",
        }
    }
}

impl FromStr for Builtin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "let" => Ok(Self::Let),
            "letr" => Ok(Self::Letr),
            "global" => Ok(Self::Global),
            "weigh" => Ok(Self::Weigh),
            "bag" => Ok(Self::Bag),
            "range" => Ok(Self::Range),
            "rangef" => Ok(Self::Rangef),
            "ranget" => Ok(Self::Ranget),
            "choice" => Ok(Self::Choice),
            "uuid" => Ok(Self::Uuid),
            "inc" => Ok(Self::Inc),
            "dec" => Ok(Self::Dec),
            "len" => Ok(Self::Len),
            "sprintf" => Ok(Self::Sprintf),
            _ => Err(Error(ErrorRepr::UnknownForm(s.to_string()))),
        }
    }
}

/// Invoke a builtin. Arguments are evaluated left to right first, except
/// for `letr`, which binds its value arguments unevaluated.
pub(crate) fn apply(b: Builtin, args: &[Form], scope: &mut Scope) -> Result<Value, Error> {
    if b == Builtin::Letr {
        return letr(scope, args);
    }
    let mut vals = Vec::with_capacity(args.len());
    for arg in args {
        vals.push(eval(arg, scope)?);
    }
    match b {
        Builtin::Let => bind(scope, &vals, false, "let"),
        Builtin::Global => bind(scope, &vals, true, "global"),
        Builtin::Weigh => weigh(&vals),
        Builtin::Bag => bag(scope, &vals),
        Builtin::Range => range(scope, &vals),
        Builtin::Rangef => rangef(scope, &vals),
        Builtin::Ranget => ranget(scope, &vals),
        Builtin::Choice => choice(scope, vals),
        Builtin::Uuid => uuid(scope, &vals),
        Builtin::Inc => step(scope, &vals, 1, "inc"),
        Builtin::Dec => step(scope, &vals, -1, "dec"),
        Builtin::Len => len(&vals),
        Builtin::Sprintf => sprintf(&vals),
        Builtin::Letr => unreachable!("handled above"),
    }
}

fn arity(form: &'static str, msg: &'static str) -> Error {
    Error(ErrorRepr::Arity { form, msg })
}

/// Empty string: a side-effecting builtin spliced into a rule body
/// contributes nothing to the concatenation.
fn blank() -> Result<Value, Error> {
    Ok(Value::Str(String::new()))
}

/// `let` / `global`: bind name/value pairs into the chosen layer.
fn bind(scope: &mut Scope, vals: &[Value], global: bool, which: &'static str) -> Result<Value, Error> {
    if vals.len() % 2 != 0 {
        return Err(arity(which, "expects name and value pairs"));
    }
    for pair in vals.chunks(2) {
        let name = pair[0].as_str(which)?;
        scope.set(name, pair[1].clone(), global);
    }
    blank()
}

/// `letr`: like `let`, but the value positions bind the argument forms
/// themselves; a reference that resolves to a bound form re-evaluates it.
fn letr(scope: &mut Scope, args: &[Form]) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(arity("letr", "expects name and value pairs"));
    }
    for pair in args.chunks(2) {
        let name = eval(&pair[0], scope)?;
        let name = name.as_str("letr")?;
        scope.set(name, Value::Form(Arc::new(pair[1].clone())), false);
    }
    blank()
}

/// `weigh`: packages a weight/restraint pair for rule annotation.
fn weigh(vals: &[Value]) -> Result<Value, Error> {
    let [w, r] = vals else {
        return Err(arity("weigh", "expects a weight and a restraint"));
    };
    Ok(Value::List(vec![
        Value::Float(w.as_num("weigh")?),
        Value::Float(r.as_num("weigh")?),
    ]))
}

/// `bag`: a random line's first CSV field from the named file.
fn bag(scope: &mut Scope, vals: &[Value]) -> Result<Value, Error> {
    let [filename] = vals else {
        return Err(arity("bag", "expects a file name"));
    };
    let path = scope.resolve_bag_path(filename.as_str("bag")?);
    let rows = match scope.cached_bag(&path) {
        Some(rows) => rows,
        None => {
            let rows = read_bag(&path)?;
            scope.cache_bag(path, rows)
        }
    };
    if rows.is_empty() {
        return blank();
    }
    let idx = scope.rng().random_range(0..rows.len());
    Ok(Value::Str(
        rows[idx].first().cloned().unwrap_or_default(),
    ))
}

fn read_bag(path: &Path) -> Result<Vec<Vec<String>>, Error> {
    let bag_err = |detail: String| {
        Error(ErrorRepr::Bag {
            path: path.to_path_buf(),
            detail,
        })
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| bag_err(e.to_string()))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| bag_err(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// `range`: a random integer in `[lo, hi)`.
fn range(scope: &mut Scope, vals: &[Value]) -> Result<Value, Error> {
    let [lo, hi] = vals else {
        return Err(arity("range", "expects lo and hi"));
    };
    let (lo, hi) = (lo.as_int("range")?, hi.as_int("range")?);
    if lo >= hi {
        return Err(Error(ErrorRepr::BadRange("range")));
    }
    Ok(Value::Int(scope.rng().random_range(lo..hi)))
}

/// `rangef`: a random float in `[lo, hi)`.
fn rangef(scope: &mut Scope, vals: &[Value]) -> Result<Value, Error> {
    let [lo, hi] = vals else {
        return Err(arity("rangef", "expects lo and hi"));
    };
    let (lo, hi) = (lo.as_float("rangef")?, hi.as_float("rangef")?);
    if lo >= hi {
        return Err(Error(ErrorRepr::BadRange("rangef")));
    }
    Ok(Value::Float(scope.rng().random_range(lo..hi)))
}

/// `ranget`: a random float in `[lo, hi)` truncated to an integer.
/// Endpoints may be ints or floats.
fn ranget(scope: &mut Scope, vals: &[Value]) -> Result<Value, Error> {
    let [lo, hi] = vals else {
        return Err(arity("ranget", "expects lo and hi"));
    };
    let (lo, hi) = (lo.as_num("ranget")?, hi.as_num("ranget")?);
    if lo >= hi {
        return Err(Error(ErrorRepr::BadRange("ranget")));
    }
    Ok(Value::Int(scope.rng().random_range(lo..hi) as i64))
}

/// `choice`: one argument, uniformly.
fn choice(scope: &mut Scope, mut vals: Vec<Value>) -> Result<Value, Error> {
    if vals.is_empty() {
        return Err(arity("choice", "expects at least one argument"));
    }
    let idx = scope.rng().random_range(0..vals.len());
    Ok(vals.swap_remove(idx))
}

/// `uuid`: a fresh random UUID string. The bytes come from the scope RNG,
/// so seeded generation stays reproducible.
fn uuid(scope: &mut Scope, vals: &[Value]) -> Result<Value, Error> {
    if !vals.is_empty() {
        return Err(arity("uuid", "takes no arguments"));
    }
    let mut bytes = [0u8; 16];
    scope.rng().fill_bytes(&mut bytes);
    let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
    Ok(Value::Str(id.to_string()))
}

/// `inc` / `dec`: update a bound integer in place, in whichever layer it
/// was found. Unbound names are a no-op.
fn step(scope: &mut Scope, vals: &[Value], sign: i64, which: &'static str) -> Result<Value, Error> {
    let (name, by) = match vals {
        [name] => (name, 1),
        [name, by] => (name, by.as_int(which)?),
        _ => return Err(arity(which, "expects a name and an optional amount")),
    };
    let name = name.as_str(which)?;
    if let Some((val, global)) = scope.get(name) {
        let val = val.as_int(which)?;
        scope.set(name, Value::Int(val + sign * by), global);
    }
    blank()
}

/// `len`: character count of a string or element count of a list.
fn len(vals: &[Value]) -> Result<Value, Error> {
    let [val] = vals else {
        return Err(arity("len", "expects one argument"));
    };
    match val {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(Error(ErrorRepr::Type {
            what: "len",
            expected: "string or list",
            got: other.type_name(),
        })),
    }
}

/// `sprintf`: C-style formatting over the remaining arguments.
/// Supported verbs: `%d %s %v %f %x %X %o %%`.
fn sprintf(vals: &[Value]) -> Result<Value, Error> {
    let Some((fmt, rest)) = vals.split_first() else {
        return Err(arity("sprintf", "expects a format string"));
    };
    let fmt = fmt.as_str("sprintf")?;
    let mut args = rest.iter();
    let mut out = String::new();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars
            .next()
            .ok_or_else(|| Error(ErrorRepr::Format("dangling % in format string".into())))?;
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = args.next().ok_or_else(|| {
            Error(ErrorRepr::Format(format!("missing argument for %{}", verb)))
        })?;
        format_verb(verb, arg, &mut out)?;
    }
    Ok(Value::Str(out))
}

fn format_verb(verb: char, arg: &Value, out: &mut String) -> Result<(), Error> {
    match verb {
        'd' => out.push_str(itoa::Buffer::new().format(arg.as_int("sprintf")?)),
        's' | 'v' => arg.write_to(out),
        'f' => out.push_str(&format!("{:.6}", arg.as_num("sprintf")?)),
        'x' => out.push_str(&format!("{:x}", arg.as_int("sprintf")?)),
        'X' => out.push_str(&format!("{:X}", arg.as_int("sprintf")?)),
        'o' => out.push_str(&format!("{:o}", arg.as_int("sprintf")?)),
        other => {
            return Err(Error(ErrorRepr::Format(format!(
                "unsupported verb %{}",
                other
            ))))
        }
    }
    Ok(())
}
