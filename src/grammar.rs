use crate::builtin::Builtin;
use crate::error::ErrorRepr;
use crate::form::{Form, Op};
use crate::ir::{self, Production, Token};
use crate::scope::Scope;
use crate::value::Value;
use crate::Error;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Terminal literals predefined for rule and form-argument position.
/// An uppercase name with no entry here evaluates to the empty string.
pub(crate) fn terminal_text(name: &str) -> Option<&'static str> {
    match name {
        "DQ" => Some("\""),
        "NL" => Some("\n"),
        _ => None,
    }
}

/// A compiled production file: the top-level forms and the nonterminal
/// table, each nonterminal mapping to its ordered rule alternatives.
///
/// # Construction
/// `Grammar` is constructed with `from_str` of the production text:
/// - a peg parser converts the text into a token tree (in ir.rs),
/// - nonterminal names are checked for duplicates,
/// - each token becomes a [`Form`]; `weigh` annotations at the head of a
///   rule alternative are evaluated at compile time and installed as that
///   rule's weight and restraint, and every unannotated alternative of a
///   nonterminal with `R` alternatives defaults to weight `1/R`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    pub(crate) global_forms: Vec<Form>,
    pub(crate) nonterminals: HashMap<String, Arc<Vec<Form>>>,
}

impl Grammar {
    pub(crate) fn empty() -> Self {
        Grammar {
            global_forms: Vec::new(),
            nonterminals: HashMap::new(),
        }
    }
}

impl FromStr for Grammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = ir::production_file::bnf(s).map_err(|e| Error(ErrorRepr::Grammar(e)))?;
        Self::try_from(parsed)
    }
}

impl TryFrom<Production> for Grammar {
    type Error = Error;

    fn try_from(prod: Production) -> Result<Self, Self::Error> {
        let names: Vec<&str> = prod.defs.iter().map(|d| d.name.as_str()).collect();
        if let Some(dups) = find_duplicates(&names) {
            return Err(Error(ErrorRepr::DuplicateNonterminals(dups)));
        }

        let global_forms = prod
            .forms
            .into_iter()
            .map(compile_form_app)
            .collect::<Result<Vec<Form>, Error>>()?;

        let mut nonterminals = HashMap::with_capacity(prod.defs.len());
        for def in prod.defs {
            let rules = compile_rules(def.alts)?;
            nonterminals.insert(def.name, Arc::new(rules));
        }

        Ok(Self {
            global_forms,
            nonterminals,
        })
    }
}

fn find_duplicates(names: &[&str]) -> Option<HashSet<String>> {
    let mut set: HashSet<&str> = names.iter().copied().collect();
    let dups: HashSet<String> = names
        .iter()
        .filter(|&&n| !set.remove(n))
        .map(|n| n.to_string())
        .collect();
    (!dups.is_empty()).then_some(dups)
}

fn compile_rules(alts: Vec<Vec<Token>>) -> Result<Vec<Form>, Error> {
    let default = 1.0 / alts.len() as f64;
    let mut rules = Vec::with_capacity(alts.len());
    for alt in alts {
        let mut rule = compile_rule(alt)?;
        rule.set_default_weight(default);
        rules.push(rule);
    }
    Ok(rules)
}

fn compile_rule(mut toks: Vec<Token>) -> Result<Form, Error> {
    // A leading `(weigh w r)` with more tokens after it is an annotation,
    // not part of the rule body.
    let mut explicit = None;
    if toks.len() > 1 {
        if let Token::Form(name, _) = &toks[0] {
            if name == "weigh" {
                let weigh = compile_ruletok(toks.remove(0))?;
                explicit = Some(compile_time_weights(&weigh)?);
            }
        }
    }

    let parts = toks
        .into_iter()
        .map(compile_ruletok)
        .collect::<Result<Vec<Form>, Error>>()?;
    let mut rule = Form::new("##rule", Op::Rule(parts));
    if let Some((weight, restraint)) = explicit {
        rule.set_weight(weight, restraint);
    }
    Ok(rule)
}

/// Evaluates a `weigh` application against a detached empty scope; its
/// arguments must therefore be numeric literals.
fn compile_time_weights(weigh: &Form) -> Result<(f64, f64), Error> {
    let mut scope = Scope::detached();
    match crate::eval::eval(weigh, &mut scope)? {
        Value::List(items) => match items.as_slice() {
            [w, r] => Ok((w.as_num("weigh")?, r.as_num("weigh")?)),
            _ => Err(Error(ErrorRepr::Weigh(
                "must evaluate to a [weight restraint] pair".into(),
            ))),
        },
        other => Err(Error(ErrorRepr::Weigh(format!(
            "must evaluate to a list, got {}",
            other.type_name()
        )))),
    }
}

fn compile_ruletok(tok: Token) -> Result<Form, Error> {
    Ok(match tok {
        Token::Ident(name) => Form::new("##ident", Op::Ident(name)),
        Token::Term(name) => term_form(name),
        Token::Ref(r) => Form::new("##ref", Op::Ref(r)),
        Token::Str(s) => Form::new("##string", Op::Str(s)),
        Token::Form(name, args) => compile_form_arg_app(name, args)?,
        _ => unreachable!("the parser yields no literals in rule position"),
    })
}

fn compile_formarg(tok: Token) -> Result<Form, Error> {
    Ok(match tok {
        Token::Int(v) => Form::new("##literaltok", Op::Literal(Value::Int(v))),
        Token::Float(v) => Form::new("##literaltok", Op::Literal(Value::Float(v))),
        Token::Bool(v) => Form::new("##literaltok", Op::Literal(Value::Bool(v))),
        Token::Str(s) => Form::new("##string", Op::Str(s)),
        Token::Bareword(s) => Form::new("##formtok", Op::FormTok(s)),
        Token::Term(name) => term_form(name),
        Token::Ref(r) => Form::new("##ref", Op::Ref(r)),
        Token::Form(name, args) => compile_form_arg_app(name, args)?,
        Token::Ident(_) => unreachable!("the parser yields no idents in form-argument position"),
    })
}

fn compile_form_app(tok: Token) -> Result<Form, Error> {
    match tok {
        Token::Form(name, args) => compile_form_arg_app(name, args),
        _ => unreachable!("the parser yields only form tokens at top level"),
    }
}

fn compile_form_arg_app(name: String, args: Vec<Token>) -> Result<Form, Error> {
    let args = args
        .into_iter()
        .map(compile_formarg)
        .collect::<Result<Vec<Form>, Error>>()?;
    Ok(match Builtin::from_str(&name) {
        Ok(b) => Form::new(name, Op::Apply(b, args)),
        // Not a builtin: the form expands the nonterminal of that name.
        // Arguments are validated above but play no part in expansion.
        Err(_) => {
            let tag = format!("#{}", name);
            Form::new(tag, Op::Expand(name))
        }
    })
}

fn term_form(name: String) -> Form {
    let text = terminal_text(&name).unwrap_or("").to_string();
    Form::new("##term", Op::Term { name, text })
}

/// Pretty prints the grammar as production-file source: top-level forms
/// first, then nonterminal definitions in name order. Explicit weights are
/// printed back as `(weigh w r)` annotations, so the output reparses to a
/// structurally equal grammar.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        for form in &self.global_forms {
            writeln!(f, "{}", form)?;
        }
        let mut names: Vec<&String> = self.nonterminals.keys().collect();
        names.sort();
        for name in names {
            let alts = self.nonterminals[name]
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<String>>()
                .join(" | ");
            writeln!(f, "{} : {} .", name, alts)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_grammar() {
        let grammar: Grammar = r#"s : "hello" ."#.parse().unwrap();
        assert_eq!(grammar.nonterminals.len(), 1);
        let rules = &grammar.nonterminals["s"];
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name(), "##rule");
        assert_eq!(rules[0].weight(), 1.0);
        assert_eq!(rules[0].restraint(), 0.0);
    }

    #[test]
    fn default_weights_split_across_alternatives() {
        let grammar: Grammar = r#"s : a | b | c | d . a : "a" . b : "b" . c : "c" . d : "d" ."#
            .parse()
            .unwrap();
        let rules = &grammar.nonterminals["s"];
        assert_eq!(rules.len(), 4);
        for rule in rules.iter() {
            assert_eq!(rule.weight(), 0.25);
        }
        let total: f64 = rules.iter().map(|r| r.weight()).sum();
        assert_eq!(total, 1.0);
    }

    #[test]
    fn weigh_annotation_installs_weights_and_is_stripped() {
        let grammar: Grammar = r#"s : (weigh 0.9 0.25) "x" | "y" ."#.parse().unwrap();
        let rules = &grammar.nonterminals["s"];

        assert_eq!(rules[0].weight(), 0.9);
        assert_eq!(rules[0].restraint(), 0.25);
        assert!(rules[0].is_weighted());
        match rules[0].op() {
            Op::Rule(parts) => assert_eq!(parts.len(), 1),
            other => panic!("unexpected op {:?}", other),
        }

        // The unannotated sibling keeps the 1/R default.
        assert_eq!(rules[1].weight(), 0.5);
        assert!(!rules[1].is_weighted());
    }

    #[test]
    fn weigh_accepts_integer_literals() {
        let grammar: Grammar = r#"s : (weigh 1 0) "x" | "y" ."#.parse().unwrap();
        assert_eq!(grammar.nonterminals["s"][0].weight(), 1.0);
    }

    #[test]
    fn lone_weigh_form_is_a_rule_body() {
        // With no tokens after it, `(weigh ...)` is an ordinary builtin
        // application, not an annotation.
        let grammar: Grammar = r#"s : (weigh 0.9 0.1) ."#.parse().unwrap();
        let rules = &grammar.nonterminals["s"];
        assert!(!rules[0].is_weighted());
        match rules[0].op() {
            Op::Rule(parts) => assert_eq!(parts.len(), 1),
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn catches_duplicates() {
        for text in [
            r#"s : "a" . s : "b" ."#,
            r#"s : "a" . t : "c" . s : s ."#,
        ] {
            let result: Error = text.parse::<Grammar>().unwrap_err();
            assert_eq!(
                result,
                Error(ErrorRepr::DuplicateNonterminals(
                    ["s".into()].into_iter().collect()
                ))
            );
        }
    }

    #[test]
    fn literal_form_arguments() {
        let grammar: Grammar = r#"(let a 10 b 0x1f c 012 d 3.14 e true f "s" g -4)"#
            .parse()
            .unwrap();
        let form = &grammar.global_forms[0];
        let args = match form.op() {
            Op::Apply(Builtin::Let, args) => args,
            other => panic!("unexpected op {:?}", other),
        };
        let literals: Vec<&Op> = args.iter().map(|a| a.op()).collect();
        assert_eq!(literals[1], &Op::Literal(Value::Int(10)));
        assert_eq!(literals[3], &Op::Literal(Value::Int(31)));
        assert_eq!(literals[5], &Op::Literal(Value::Int(10)));
        assert_eq!(literals[7], &Op::Literal(Value::Float(3.14)));
        assert_eq!(literals[9], &Op::Literal(Value::Bool(true)));
        assert_eq!(literals[11], &Op::Str("s".into()));
        assert_eq!(literals[13], &Op::Literal(Value::Int(-4)));
        // bareword names in between
        assert_eq!(literals[0], &Op::FormTok("a".into()));
    }

    #[test]
    fn terminals_resolve_at_compile_time() {
        let grammar: Grammar = r#"s : DQ NL ZZ ."#.parse().unwrap();
        let rules = &grammar.nonterminals["s"];
        let parts = match rules[0].op() {
            Op::Rule(parts) => parts,
            other => panic!("unexpected op {:?}", other),
        };
        assert_eq!(
            parts[0].op(),
            &Op::Term {
                name: "DQ".into(),
                text: "\"".into()
            }
        );
        assert_eq!(
            parts[1].op(),
            &Op::Term {
                name: "NL".into(),
                text: "\n".into()
            }
        );
        // unknown terminals evaluate to the empty string
        assert_eq!(
            parts[2].op(),
            &Op::Term {
                name: "ZZ".into(),
                text: String::new()
            }
        );
    }

    #[test]
    fn empty_input_is_an_empty_grammar() {
        let grammar: Grammar = "".parse().unwrap();
        assert!(grammar.nonterminals.is_empty());
        assert!(grammar.global_forms.is_empty());

        let grammar: Grammar = "  \n\t ".parse().unwrap();
        assert!(grammar.nonterminals.is_empty());
    }

    #[test]
    fn rejects_malformed_productions() {
        for text in [
            r#"s : "unterminated ."#,
            r#"s : "bad \q escape" ."#,
            r#"s : a b"#,
            r#"s "no colon" ."#,
            r#"s : ."#,
        ] {
            assert!(text.parse::<Grammar>().is_err(), "accepted {:?}", text);
        }
    }

    #[test]
    fn string_escapes() {
        let grammar: Grammar = "s : \"a\\\"b\\n\\t\\\\c\\u{2603}\" .".parse().unwrap();
        let parts = match grammar.nonterminals["s"][0].op() {
            Op::Rule(parts) => parts,
            other => panic!("unexpected op {:?}", other),
        };
        assert_eq!(parts[0].op(), &Op::Str("a\"b\n\t\\c\u{2603}".into()));
    }

    #[test]
    fn pretty_print_reparses_equal() {
        let text = r#"
            (global sep ", ")
            s : (weigh 0.9 0.5) pair | DQ (uuid) DQ .
            pair : "k" $sep (range 1 100) | (choice a 1 2.5 true) .
        "#;
        let grammar: Grammar = text.parse().unwrap();
        let printed = grammar.to_string();
        let reparsed: Grammar = printed.parse().unwrap();
        assert_eq!(grammar, reparsed);
    }
}
