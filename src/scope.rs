use crate::error::{Error, ErrorRepr};
use crate::form::Form;
use crate::grammar::Grammar;
use crate::value::Value;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

const DEFAULT_MAX_DEPTH: usize = 512;

/// Name-resolution environment for evaluation.
///
/// A scope is two layers. The root layer (grammar tables, global bindings,
/// the seeded RNG, bag paths and the bag row cache) is built once per
/// production file and shared by every scope derived from it. The local
/// layer (`let` bindings, `#0 #1 ...` rule-argument injections, cached
/// nonterminal expansions, per-nonterminal running weights) lives for a
/// single sample and starts empty on every
/// [`rebuild_context`](Scope::rebuild_context).
pub struct Scope {
    root: Arc<Root>,
    locals: HashMap<String, Value>,
    weights: HashMap<String, Vec<f64>>,
    depth: usize,
    max_depth: usize,
}

struct Root {
    global_forms: Vec<Form>,
    nonterminals: HashMap<String, Arc<Vec<Form>>>,
    globals: Mutex<HashMap<String, Value>>,
    rng: Mutex<StdRng>,
    paths: RwLock<Paths>,
    bags: RwLock<HashMap<PathBuf, Arc<Vec<Vec<String>>>>>,
}

#[derive(Default)]
struct Paths {
    bagdir: Option<PathBuf>,
    prodfile: Option<PathBuf>,
}

impl Scope {
    pub(crate) fn from_grammar(grammar: Grammar) -> Scope {
        Scope {
            root: Arc::new(Root {
                global_forms: grammar.global_forms,
                nonterminals: grammar.nonterminals,
                globals: Mutex::new(HashMap::new()),
                rng: Mutex::new(StdRng::seed_from_u64(0)),
                paths: RwLock::new(Paths::default()),
                bags: RwLock::new(HashMap::new()),
            }),
            locals: HashMap::new(),
            weights: HashMap::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// A scope with no grammar behind it, for evaluating forms whose
    /// arguments may not touch the environment (compile-time `weigh`).
    pub(crate) fn detached() -> Scope {
        Scope::from_grammar(Grammar::empty())
    }

    /// Resolve `name`, local bindings first, then globals. The flag
    /// reports the layer the value came from (`true` = global).
    pub fn get(&self, name: &str) -> Option<(Value, bool)> {
        if let Some(v) = self.locals.get(name) {
            return Some((v.clone(), false));
        }
        self.globals().get(name).map(|v| (v.clone(), true))
    }

    /// Bind `name` in the local layer, or in the shared global layer when
    /// `global` is set.
    pub fn set(&mut self, name: impl Into<String>, value: Value, global: bool) {
        if global {
            self.globals().insert(name.into(), value);
        } else {
            self.locals.insert(name.into(), value);
        }
    }

    /// The ordered rule alternatives of a nonterminal.
    pub fn nonterminal(&self, name: &str) -> Option<Arc<Vec<Form>>> {
        self.root.nonterminals.get(name).cloned()
    }

    pub(crate) fn nonterminal_names(&self) -> Vec<String> {
        self.root.nonterminals.keys().cloned().collect()
    }

    /// Derive a fresh sample scope: shared root, empty locals, zeroed
    /// running weights. The top-level forms of the production file are
    /// evaluated into the new scope so their bindings are visible to the
    /// sample.
    pub fn rebuild_context(&self) -> Result<Scope, Error> {
        let mut scope = Scope {
            root: self.root.clone(),
            locals: HashMap::new(),
            weights: HashMap::new(),
            depth: 0,
            max_depth: self.max_depth,
        };
        let root = scope.root.clone();
        for form in &root.global_forms {
            crate::eval::eval(form, &mut scope)?;
        }
        Ok(scope)
    }

    /// Caps how deeply nonterminal expansions may nest before evaluation
    /// fails. Guards against unboundedly recursive grammars.
    pub fn set_max_depth(&mut self, limit: usize) {
        self.max_depth = limit;
    }

    pub(crate) fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error(ErrorRepr::RecursionLimit(self.max_depth)));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn running_weights(&mut self, name: &str, len: usize) -> &mut Vec<f64> {
        self.weights
            .entry(name.to_string())
            .or_insert_with(|| vec![0.0; len])
    }

    pub(crate) fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.root.rng.lock().expect("rng lock poisoned")
    }

    pub(crate) fn reseed(&self, seed: u64) {
        *self.rng() = StdRng::seed_from_u64(seed);
    }

    fn globals(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.root.globals.lock().expect("globals lock poisoned")
    }

    pub(crate) fn set_paths(&self, bagdir: Option<PathBuf>, prodfile: Option<PathBuf>) {
        let mut paths = self.root.paths.write().expect("paths lock poisoned");
        paths.bagdir = bagdir;
        paths.prodfile = prodfile;
    }

    /// Resolves a bag file name: absolute paths pass through, relative
    /// ones join the bag directory if set, else the production file's
    /// directory.
    pub(crate) fn resolve_bag_path(&self, filename: &str) -> PathBuf {
        let p = Path::new(filename);
        if p.is_absolute() {
            return p.to_path_buf();
        }
        let paths = self.root.paths.read().expect("paths lock poisoned");
        if let Some(dir) = &paths.bagdir {
            return dir.join(p);
        }
        if let Some(prodfile) = &paths.prodfile {
            if let Some(dir) = prodfile.parent() {
                return dir.join(p);
            }
        }
        p.to_path_buf()
    }

    pub(crate) fn cached_bag(&self, path: &Path) -> Option<Arc<Vec<Vec<String>>>> {
        self.root
            .bags
            .read()
            .expect("bag cache lock poisoned")
            .get(path)
            .cloned()
    }

    /// Inserts parsed rows for `path`, keeping an entry that raced in
    /// first. Double inserts are idempotent: both parse the same file.
    pub(crate) fn cache_bag(&self, path: PathBuf, rows: Vec<Vec<String>>) -> Arc<Vec<Vec<String>>> {
        let rows = Arc::new(rows);
        self.root
            .bags
            .write()
            .expect("bag cache lock poisoned")
            .entry(path)
            .or_insert(rows)
            .clone()
    }
}
