#![doc = include_str!("../README.md")]

mod builtin;
mod error;
mod eval;
mod form;
mod grammar;
mod ir;
mod scope;
mod value;

pub use builtin::Builtin;
pub use error::Error;
pub use eval::{eval, eval_forms};
pub use form::Form;
pub use grammar::Grammar;
pub use scope::Scope;
pub use value::Value;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Compile `text` into a root scope holding the production file's
/// top-level forms and nonterminal table.
pub fn parse(text: &str) -> Result<Scope, Error> {
    let grammar = Grammar::from_str(text)?;
    Ok(Scope::from_grammar(grammar))
}

/// Prepare `root` for sampling: store the bag and production-file paths,
/// seed the RNG (a seed of `0` takes a wall-clock seed), and warn about
/// nonterminals shadowed by builtin names.
///
/// Returns a derived scope ready for the first sample; call
/// [`Scope::rebuild_context`] before each subsequent one.
pub fn build_context(
    root: Scope,
    seed: u64,
    bagdir: Option<PathBuf>,
    prodfile: Option<PathBuf>,
) -> Result<Scope, Error> {
    root.set_paths(bagdir, prodfile);
    let seed = if seed != 0 { seed } else { wall_clock_seed() };
    root.reseed(seed);
    for name in root.nonterminal_names() {
        if Builtin::from_str(&name).is_ok() {
            log::warn!("nonterminal `{}` is shadowed by a builtin form", name);
        }
    }
    root.rebuild_context()
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
