//! Method registry: ordered providers resolved by name, arity and category.
//!
//! Providers are registered in order and the first provider defining a
//! `(name, arity, kind)` triple wins. Registration order is a contract: it is
//! folded into a precomputed map once, when the registry is built, so lookups
//! during rendering never scan providers.

use std::fmt;
use std::sync::Arc;

use quill_ir::Name;
use quill_value::{EvalError, EvalResult, NativeFn, Value};
use rustc_hash::FxHashMap;

use crate::scope::ScopeContext;

/// Context filter body: receives the scope and the piped value plus arguments.
pub type ContextFilterFn = Arc<dyn Fn(&ScopeContext, &[Value]) -> EvalResult + Send + Sync>;

/// Context block body: streams into the scope's output.
pub type ContextBlockFn =
    Arc<dyn Fn(&ScopeContext, &[Value]) -> Result<(), EvalError> + Send + Sync>;

/// Callable category, in resolution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodKind {
    /// `(value, args...) -> value`, no scope access.
    Filter,
    /// `(scope, value, args...) -> value`.
    ContextFilter,
    /// `(scope, value, args...)` writing to the scope's stream.
    ContextBlock,
}

impl MethodKind {
    pub const ALL: [MethodKind; 3] = [
        MethodKind::Filter,
        MethodKind::ContextFilter,
        MethodKind::ContextBlock,
    ];
}

#[derive(Clone)]
pub enum MethodBody {
    Filter(NativeFn),
    ContextFilter(ContextFilterFn),
    ContextBlock(ContextBlockFn),
}

impl MethodBody {
    pub fn kind(&self) -> MethodKind {
        match self {
            MethodBody::Filter(_) => MethodKind::Filter,
            MethodBody::ContextFilter(_) => MethodKind::ContextFilter,
            MethodBody::ContextBlock(_) => MethodKind::ContextBlock,
        }
    }
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodBody::Filter(func) => write!(f, "Filter({func:?})"),
            MethodBody::ContextFilter(_) => f.write_str("ContextFilter"),
            MethodBody::ContextBlock(_) => f.write_str("ContextBlock"),
        }
    }
}

/// One registered method. Arity counts value arguments, excluding the scope.
#[derive(Clone, Debug)]
pub struct MethodDef {
    pub name: Name,
    pub arity: usize,
    pub body: MethodBody,
}

/// An ordered group of methods contributed by one provider.
#[derive(Clone, Debug)]
pub struct ScriptMethods {
    name: Arc<str>,
    defs: Vec<MethodDef>,
}

impl ScriptMethods {
    pub fn new(name: &str) -> Self {
        ScriptMethods {
            name: Arc::from(name),
            defs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defs(&self) -> &[MethodDef] {
        &self.defs
    }

    fn push(mut self, name: &str, arity: usize, body: MethodBody) -> Self {
        self.defs.push(MethodDef {
            name: Name::intern(name),
            arity,
            body,
        });
        self
    }

    #[must_use]
    pub fn filter0(self, name: &str, f: impl Fn() -> EvalResult + Send + Sync + 'static) -> Self {
        self.push(name, 0, MethodBody::Filter(NativeFn::nullary(f)))
    }

    #[must_use]
    pub fn filter1(
        self,
        name: &str,
        f: impl Fn(&Value) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push(name, 1, MethodBody::Filter(NativeFn::unary(f)))
    }

    #[must_use]
    pub fn filter2(
        self,
        name: &str,
        f: impl Fn(&Value, &Value) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push(name, 2, MethodBody::Filter(NativeFn::binary(f)))
    }

    /// Plain filter of any fixed arity.
    #[must_use]
    pub fn filter_n(
        self,
        name: &str,
        arity: usize,
        f: impl Fn(&[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push(name, arity, MethodBody::Filter(NativeFn::variadic(f)))
    }

    #[must_use]
    pub fn context_filter(
        self,
        name: &str,
        arity: usize,
        f: impl Fn(&ScopeContext, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push(name, arity, MethodBody::ContextFilter(Arc::new(f)))
    }

    #[must_use]
    pub fn context_block(
        self,
        name: &str,
        arity: usize,
        f: impl Fn(&ScopeContext, &[Value]) -> Result<(), EvalError> + Send + Sync + 'static,
    ) -> Self {
        self.push(name, arity, MethodBody::ContextBlock(Arc::new(f)))
    }
}

/// A method chosen by lookup, remembering which provider defined it.
#[derive(Clone, Debug)]
pub struct ResolvedMethod {
    pub name: Name,
    pub arity: usize,
    pub body: MethodBody,
    pub provider: Arc<str>,
}

type MethodKey = (Name, usize, MethodKind);

/// Precomputed view over an ordered provider list.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    methods: FxHashMap<MethodKey, ResolvedMethod>,
    /// Every registered arity per name, for diagnostics.
    arities: FxHashMap<Name, Vec<(usize, MethodKind)>>,
}

/// Most candidates listed in a dispatch error.
const MAX_CANDIDATES: usize = 8;

impl MethodRegistry {
    pub fn build<'a>(providers: impl IntoIterator<Item = &'a ScriptMethods>) -> Self {
        let mut registry = MethodRegistry::default();
        for provider in providers {
            for def in &provider.defs {
                let key = (def.name, def.arity, def.body.kind());
                if registry.methods.contains_key(&key) {
                    tracing::trace!(
                        name = %def.name,
                        arity = def.arity,
                        provider = %provider.name,
                        "method shadowed by an earlier provider"
                    );
                    continue;
                }
                registry.methods.insert(
                    key,
                    ResolvedMethod {
                        name: def.name,
                        arity: def.arity,
                        body: def.body.clone(),
                        provider: Arc::clone(&provider.name),
                    },
                );
                registry
                    .arities
                    .entry(def.name)
                    .or_default()
                    .push((def.arity, def.body.kind()));
            }
        }
        registry
    }

    pub fn lookup(&self, name: Name, arity: usize, kind: MethodKind) -> Option<&ResolvedMethod> {
        self.methods.get(&(name, arity, kind))
    }

    /// First match across categories in resolution order.
    pub fn resolve(&self, name: Name, arity: usize) -> Option<&ResolvedMethod> {
        MethodKind::ALL
            .iter()
            .find_map(|kind| self.lookup(name, arity, *kind))
    }

    pub fn contains_name(&self, name: Name) -> bool {
        self.arities.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Near misses for a failed lookup: other arities of the same name first,
    /// then similarly spelled names.
    pub fn candidates(&self, name: Name, arity: usize) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(arities) = self.arities.get(&name) {
            let mut same: Vec<_> = arities.iter().filter(|(a, _)| *a != arity).collect();
            same.sort_unstable();
            same.dedup_by_key(|(a, _)| *a);
            out.extend(same.iter().map(|(a, kind)| format_signature(name, *a, *kind)));
        }

        let wanted = name.as_str().to_ascii_lowercase();
        let mut similar: Vec<(usize, Name)> = self
            .arities
            .keys()
            .filter(|other| **other != name)
            .filter_map(|other| {
                let distance = edit_distance(&wanted, &other.as_str().to_ascii_lowercase());
                (distance <= 2).then_some((distance, *other))
            })
            .collect();
        similar.sort_unstable();
        for (_, other) in similar {
            if let Some(arities) = self.arities.get(&other) {
                out.extend(
                    arities
                        .iter()
                        .map(|(a, kind)| format_signature(other, *a, *kind)),
                );
            }
        }
        out.truncate(MAX_CANDIDATES);
        out
    }
}

fn format_signature(name: Name, arity: usize, kind: MethodKind) -> String {
    match kind {
        MethodKind::Filter => format!("{name}({arity})"),
        MethodKind::ContextFilter => format!("{name}(scope, {arity})"),
        MethodKind::ContextBlock => format!("{name}(scope, {arity}) -> stream"),
    }
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
