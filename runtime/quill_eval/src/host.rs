//! Host types reachable from scripts by name.

use quill_value::NativeFn;
use rustc_hash::FxHashMap;

/// Constructors and namespaced static functions exposed to scripts.
///
/// Static functions are keyed by `Namespace/name`, the same spelling the Lisp
/// reader uses for them.
#[derive(Debug, Default)]
pub struct HostTypes {
    constructors: FxHashMap<String, NativeFn>,
    functions: FxHashMap<String, NativeFn>,
}

impl HostTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_constructor(&mut self, type_name: &str, ctor: NativeFn) {
        self.constructors.insert(type_name.to_owned(), ctor);
    }

    pub fn add_function(&mut self, path: &str, func: NativeFn) {
        self.functions.insert(path.to_owned(), func);
    }

    pub fn constructor(&self, type_name: &str) -> Option<&NativeFn> {
        self.constructors.get(type_name)
    }

    pub fn function(&self, path: &str) -> Option<&NativeFn> {
        self.functions.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty() && self.functions.is_empty()
    }
}
