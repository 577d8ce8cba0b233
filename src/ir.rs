//! Intermediary representation (ir) for a parsed production file.

use peg::parser;

/// Raw token tree produced by the production parser, before compilation
/// into forms.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bareword(String),
    Ident(String),
    Term(String),
    Ref(String),
    Form(String, Vec<Token>),
}

/// One nonterminal definition: `name : tok+ ( "|" tok+ )* .`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Definition {
    pub(crate) name: String,
    pub(crate) alts: Vec<Vec<Token>>,
}

/// A whole production file: top-level forms followed by nonterminal
/// definitions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Production {
    pub(crate) forms: Vec<Token>,
    pub(crate) defs: Vec<Definition>,
}

parser! {
/// Parser for the production language. Parsing is not on the hot path
/// (unlike generating sentences), so the rules favor clarity over speed.
pub(crate) grammar production_file() for str {
    pub rule bnf() -> Production
        = _ fs:(form() ** _) _ ds:(nterminal() ** _) _ {
            Production { forms: fs, defs: ds }
        }

    rule nterminal() -> Definition
        = n:ident() _ ":" _ alts:(rule_alt() ++ (_ "|" _)) _ "." {
            Definition { name: n, alts }
        }

    rule rule_alt() -> Vec<Token>
        = ruletok() ++ _

    rule ruletok() -> Token
        = r:reference() { Token::Ref(r) }
        / t:term() { Token::Term(t) }
        / i:ident() tokend() { Token::Ident(i) }
        / s:string() { Token::Str(s) }
        / form()

    rule form() -> Token
        = "(" _ n:ident() _ args:(formarg() ** _) _ ")" { Token::Form(n, args) }

    rule formarg() -> Token
        = literal()
        / r:reference() { Token::Ref(r) }
        / t:term() { Token::Term(t) }
        / form()
        / b:bareword() { Token::Bareword(b) }

    rule literal() -> Token
        = f:float() { Token::Float(f) }
        / h:hex() { Token::Int(h) }
        / o:oct() { Token::Int(o) }
        / i:int() { Token::Int(i) }
        / s:string() { Token::Str(s) }
        / "true" tokend() { Token::Bool(true) }
        / "false" tokend() { Token::Bool(false) }

    rule float() -> f64
        = n:$("-"? ['0'..='9']+ "." ['0'..='9']+) tokend() {?
            n.parse().or(Err("float literal"))
        }

    rule hex() -> i64
        = "0x" n:$(['0'..='9' | 'a'..='f' | 'A'..='F']+) tokend() {?
            i64::from_str_radix(n, 16).or(Err("hex literal"))
        }

    rule oct() -> i64
        = "0" n:$(['0'..='7']+) tokend() {?
            i64::from_str_radix(n, 8).or(Err("octal literal"))
        }

    rule int() -> i64
        = n:$("-"? ['0'..='9']+) tokend() {?
            n.parse().or(Err("integer literal"))
        }

    rule ident() -> String
        = s:$(['a'..='z' | '0'..='9']+) { s.to_string() }

    rule term() -> String
        = s:$(['A'..='Z'] ['A'..='Z' | '0'..='9']*) tokend() { s.to_string() }

    rule reference() -> String
        = s:$(['$' | '#'] ['a'..='z' | '0'..='9']+) tokend() { s.to_string() }

    rule bareword() -> String
        = s:$([^ ' ' | '\t' | '\r' | '\n' | '(' | ')']+) { s.to_string() }

    rule string() -> String
        = "\"" s:string_inner() "\"" { s }

    rule string_inner() -> String
        = cs:(escape_char() / [^ '"' | '\\'])* { cs.into_iter().collect() }

    rule escape_char() -> char
        = "\\\"" { '"' }
        / "\\\\" { '\\' }
        / "\\n" { '\n' }
        / "\\t" { '\t' }
        / "\\r" { '\r' }
        / "\\0" { '\0' }
        / "\\u{" value:$(['0'..='9' | 'a'..='f' | 'A'..='F']+) "}" {?
              u32::from_str_radix(value, 16)
                  .ok()
                  .and_then(char::from_u32)
                  .ok_or("valid unicode code point")
          }
        / expected!("valid escape sequence")

    // A literal-like token must end where a delimiter (or the input) begins.
    rule tokend() = &[' ' | '\t' | '\r' | '\n' | '(' | ')' | '.' | '|'] / ![_]

    rule _ = [' ' | '\t' | '\r' | '\n']*
}}
