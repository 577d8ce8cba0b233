use crate::builtin;
use crate::error::{Error, ErrorRepr};
use crate::form::{Form, Op};
use crate::scope::Scope;
use crate::value::Value;

use rand::Rng;

/// Evaluate a single form against `scope`. Evaluation may mutate the scope
/// (bindings, running weights, counters) and recurse into sub-forms.
pub fn eval(form: &Form, scope: &mut Scope) -> Result<Value, Error> {
    match form.op() {
        Op::Literal(v) => Ok(v.clone()),
        Op::FormTok(s) => Ok(Value::Str(s.clone())),
        Op::Term { text, .. } => Ok(Value::Str(text.clone())),
        Op::Str(s) => Ok(Value::Str(s.clone())),
        Op::Ident(name) => expand(name, scope, ErrorRepr::UnknownNonterminal),
        Op::Expand(name) => expand(name, scope, ErrorRepr::UnknownForm),
        Op::Ref(tok) => deref(tok, scope),
        Op::Rule(parts) => eval_rule(parts, scope),
        Op::Apply(b, args) => builtin::apply(*b, args, scope),
    }
}

/// Expand the nonterminal `name`: pick one of its rules, evaluate it, and
/// cache the result in local scope under the nonterminal's name.
fn expand(
    name: &str,
    scope: &mut Scope,
    missing: fn(String) -> ErrorRepr,
) -> Result<Value, Error> {
    let rules = scope
        .nonterminal(name)
        .ok_or_else(|| Error(missing(name.to_string())))?;
    scope.enter()?;
    let result = eval_forms(name, scope, &rules);
    scope.leave();
    let val = result?;
    scope.set(name, val.clone(), false);
    Ok(val)
}

fn deref(tok: &str, scope: &mut Scope) -> Result<Value, Error> {
    // `$name` resolves the bare name; `#name` resolves with the sigil
    // (positional rule arguments and nonterminal result caches).
    let key = match tok.as_bytes().first() {
        Some(b'$') => &tok[1..],
        _ => tok,
    };
    let val = scope
        .get(key)
        .map(|(v, _)| v)
        .ok_or_else(|| Error(ErrorRepr::UnknownReference(tok.to_string())))?;
    match val {
        // A bound form (`letr`) is re-evaluated on every access.
        Value::Form(form) => eval(&form, scope),
        v => Ok(v),
    }
}

fn eval_rule(parts: &[Form], scope: &mut Scope) -> Result<Value, Error> {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        let val = eval(part, scope)?;
        if val == Value::Nil {
            return Ok(Value::Nil);
        }
        scope.set(format!("#{}", i), val.clone(), false);
        val.write_to(&mut out);
    }
    Ok(Value::Str(out))
}

/// Pick one of `rules` at random, weighted by each rule's static weight
/// plus its running weight in this scope, and evaluate it.
///
/// Choosing a rule subtracts its restraint from its running weight, so a
/// restrained rule is penalised on subsequent selections of `name` until
/// every alternative has been driven below eligibility, at which point the
/// running weights reset. Rules whose static weight is not positive are
/// never eligible; if no alternative is, selection fails.
pub fn eval_forms(name: &str, scope: &mut Scope, rules: &[Form]) -> Result<Value, Error> {
    if rules.is_empty() {
        return Err(Error(ErrorRepr::WeightExhausted(name.to_string())));
    }
    let mut running = scope.running_weights(name, rules.len()).clone();

    let eligible = |running: &[f64]| -> Vec<usize> {
        (0..rules.len())
            .filter(|&i| rules[i].weight() > 0.0 && running[i] + rules[i].weight() >= 0.0)
            .collect()
    };

    let mut remaining = eligible(&running);
    if remaining.is_empty() {
        running.iter_mut().for_each(|w| *w = 0.0);
        remaining = eligible(&running);
        if remaining.is_empty() {
            return Err(Error(ErrorRepr::WeightExhausted(name.to_string())));
        }
    }

    let total: f64 = remaining
        .iter()
        .map(|&i| running[i] + rules[i].weight())
        .sum();
    // With every eligible weight drawn down to zero the draw degenerates
    // to the first eligible rule.
    let mut u = if total > 0.0 {
        scope.rng().random_range(0.0..total)
    } else {
        0.0
    };

    let mut chosen = remaining[remaining.len() - 1];
    for &i in &remaining {
        u -= running[i] + rules[i].weight();
        if u <= 0.0 {
            chosen = i;
            break;
        }
    }

    running[chosen] -= rules[chosen].restraint();
    *scope.running_weights(name, rules.len()) = running;

    eval(&rules[chosen], scope)
}
