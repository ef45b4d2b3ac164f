//! Lexical scopes.
//!
//! A scope holds three tables: variables, declared functions and command
//! bindings. Lookups walk the parent chain. Function invocations create a
//! child of the function's closure scope, so scopes form a tree rooted at the
//! shell.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::{FnValue, Value};

pub struct Scope {
    name: String,
    parent: Option<Rc<Scope>>,
    is_fn: bool,
    vars: RefCell<HashMap<String, Value>>,
    fns: RefCell<HashMap<String, FnValue>>,
    binds: RefCell<HashMap<String, FnValue>>,
}

impl Scope {
    /// The outermost scope of a shell.
    pub fn root(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parent: None,
            is_fn: false,
            vars: RefCell::default(),
            fns: RefCell::default(),
            binds: RefCell::default(),
        })
    }

    /// A fresh scope for one function invocation.
    pub fn child(parent: &Rc<Scope>, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parent: Some(Rc::clone(parent)),
            is_fn: true,
            vars: RefCell::default(),
            fns: RefCell::default(),
            binds: RefCell::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True inside a function body, where `return` is allowed.
    pub fn is_fn(&self) -> bool {
        self.is_fn
    }

    pub fn get_var(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone().attached());
        }
        self.parent.as_ref().and_then(|p| p.get_var(name))
    }

    /// Declare `name` in this scope, shadowing any outer binding.
    pub fn declare_var(&self, name: impl Into<String>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), value.detached(self));
    }

    /// Update `name` where it is defined, or declare it here.
    pub fn set_var(&self, name: &str, value: Value) {
        if !self.update_var(name, &value) {
            self.declare_var(name, value);
        }
    }

    fn update_var(&self, name: &str, value: &Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value.clone().detached(self);
            return true;
        }
        match &self.parent {
            Some(parent) => parent.update_var(name, value),
            None => false,
        }
    }

    pub fn get_fn(&self, name: &str) -> Option<FnValue> {
        if let Some(f) = self.fns.borrow().get(name) {
            return Some(f.clone().attached());
        }
        self.parent.as_ref().and_then(|p| p.get_fn(name))
    }

    pub fn set_fn(&self, name: impl Into<String>, f: FnValue) {
        self.fns.borrow_mut().insert(name.into(), f.detached(self));
    }

    pub fn get_bind(&self, cmd: &str) -> Option<FnValue> {
        if let Some(f) = self.binds.borrow().get(cmd) {
            return Some(f.clone().attached());
        }
        self.parent.as_ref().and_then(|p| p.get_bind(cmd))
    }

    pub fn set_bind(&self, cmd: impl Into<String>, f: FnValue) {
        self.binds.borrow_mut().insert(cmd.into(), f.detached(self));
    }

    /// Local variables sorted by name.
    pub fn vars(&self) -> Vec<(String, Value)> {
        let mut vars: Vec<_> = self
            .vars
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().attached()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// Local functions sorted by name.
    pub fn fns(&self) -> Vec<(String, FnValue)> {
        let mut fns: Vec<_> = self
            .fns
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().attached()))
            .collect();
        fns.sort_by(|a, b| a.0.cmp(&b.0));
        fns
    }

    /// Local command bindings sorted by command name.
    pub fn binds(&self) -> Vec<(String, FnValue)> {
        let mut binds: Vec<_> = self
            .binds
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().attached()))
            .collect();
        binds.sort_by(|a, b| a.0.cmp(&b.0));
        binds
    }

    /// Drop every binding. A function stored in an outer scope still owns
    /// its inner closure scope and, through it, that scope's parents, so a
    /// shell clears its root on drop.
    pub fn clear(&self) {
        self.vars.borrow_mut().clear();
        self.fns.borrow_mut().clear();
        self.binds.borrow_mut().clear();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("is_fn", &self.is_fn)
            .field("vars", &self.vars.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
