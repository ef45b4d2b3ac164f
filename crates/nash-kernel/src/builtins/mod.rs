//! Built-in functions.
//!
//! Built-ins are registered in the root scope as function values. They never
//! take part in pipes; invoked from an exec-assignment their return values
//! are bound directly.

mod append;
mod chdir;
mod exit;
mod format;
mod glob;
mod len;
mod split;

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Result, Value};

pub use format::{FormatArg, format_string};
pub(crate) use split::split_fields;

/// A function implemented natively.
#[async_trait(?Send)]
pub trait Builtin {
    fn name(&self) -> &str;

    /// Formal parameters; the last may be variadic.
    fn params(&self) -> Vec<FnParam>;

    /// Run with already evaluated arguments, returning zero or more values.
    async fn call(&self, shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>>;
}

/// Registry of available built-ins.
#[derive(Default)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Rc<dyn Builtin>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builtin: impl Builtin + 'static) {
        let name = builtin.name().to_string();
        self.builtins.insert(name, Rc::new(builtin));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Builtin>> {
        self.builtins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// All names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.builtins.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<dyn Builtin>)> {
        self.builtins.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("builtins", &self.names())
            .finish()
    }
}

/// Register every built-in function.
pub fn register_builtins(registry: &mut BuiltinRegistry) {
    registry.register(len::Len);
    registry.register(append::Append);
    registry.register(split::Split);
    registry.register(format::Format::default());
    registry.register(format::Format::sprint());
    registry.register(format::Print);
    registry.register(chdir::Chdir);
    registry.register(exit::Exit);
    registry.register(glob::Glob);
}
