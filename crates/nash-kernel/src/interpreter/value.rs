//! Runtime values: strings, lists and functions.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::{Block, FnDeclNode, FnParam};
use crate::builtins::Builtin;

use super::scope::Scope;

/// A nash value.
///
/// Lists have value semantics: assigning a list copies it, and indexed
/// assignment mutates only the named variable's copy.
#[derive(Clone)]
pub enum Value {
    Str(String),
    List(Vec<Value>),
    Fn(FnValue),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Fn(_) => "fn",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_fn(&self) -> Option<&FnValue> {
        match self {
            Value::Fn(f) => Some(f),
            _ => None,
        }
    }

    /// Rune count for strings, element count for lists.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Fn(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Source form usable in a `var` statement, as written by `dump`.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Str(s) => crate::ast::format::quote(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_literal).collect();
                format!("({})", inner.join(" "))
            }
            Value::Fn(f) => format!("<fn {}>", f.name()),
        }
    }
}

/// String conversion used by formatting, argv building and the environment.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Fn(func) => write!(f, "<fn {}>", func.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Fn(func) => write!(f, "<fn {}>", func.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<FnValue> for Value {
    fn from(f: FnValue) -> Self {
        Value::Fn(f)
    }
}

/// A callable value.
#[derive(Clone)]
pub enum FnValue {
    User(UserFn),
    Builtin(Rc<dyn Builtin>),
}

impl FnValue {
    pub fn name(&self) -> &str {
        match self {
            FnValue::User(f) => f.name(),
            FnValue::Builtin(b) => b.name(),
        }
    }

    pub fn params(&self) -> Vec<FnParam> {
        match self {
            FnValue::User(f) => f.def.params.clone(),
            FnValue::Builtin(b) => b.params(),
        }
    }

    /// Number of non-variadic parameters.
    pub fn fixed_arity(&self) -> usize {
        self.params().iter().filter(|p| !p.variadic).count()
    }

    pub fn ptr_eq(&self, other: &FnValue) -> bool {
        match (self, other) {
            (FnValue::User(a), FnValue::User(b)) => Rc::ptr_eq(&a.def, &b.def),
            (FnValue::Builtin(a), FnValue::Builtin(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Debug for FnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

/// A user-defined function: a shared declaration plus its closure scope.
#[derive(Clone)]
pub struct UserFn {
    pub def: Rc<FnDef>,
    closure: Closure,
}

pub struct FnDef {
    pub name: String,
    pub params: Vec<FnParam>,
    pub body: Block,
    /// Declaration as written, re-emitted by `dump`.
    pub decl: FnDeclNode,
}

/// A scope never owns itself: a function stored in the scope it closes over
/// keeps a weak handle, and lookups hand out the strong form.
#[derive(Clone)]
enum Closure {
    Strong(Rc<Scope>),
    Weak(Weak<Scope>),
}

impl UserFn {
    pub fn new(def: FnDef, closure: &Rc<Scope>) -> Self {
        Self { def: Rc::new(def), closure: Closure::Strong(Rc::clone(closure)) }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The closure scope, or `None` once nothing else keeps it alive.
    pub fn closure(&self) -> Option<Rc<Scope>> {
        match &self.closure {
            Closure::Strong(scope) => Some(Rc::clone(scope)),
            Closure::Weak(scope) => scope.upgrade(),
        }
    }

    fn detach(&mut self, owner: &Scope) {
        if let Closure::Strong(scope) = &self.closure {
            if std::ptr::eq(Rc::as_ptr(scope), owner) {
                self.closure = Closure::Weak(Rc::downgrade(scope));
            }
        }
    }

    fn attach(&mut self) {
        if let Closure::Weak(scope) = &self.closure {
            if let Some(scope) = scope.upgrade() {
                self.closure = Closure::Strong(scope);
            }
        }
    }
}

impl FnValue {
    /// Form stored inside `owner`: no strong edge back to `owner`.
    pub(crate) fn detached(mut self, owner: &Scope) -> Self {
        if let FnValue::User(f) = &mut self {
            f.detach(owner);
        }
        self
    }

    /// Form handed out of a scope.
    pub(crate) fn attached(mut self) -> Self {
        if let FnValue::User(f) = &mut self {
            f.attach();
        }
        self
    }
}

impl Value {
    pub(crate) fn detached(self, owner: &Scope) -> Self {
        match self {
            Value::Fn(f) => Value::Fn(f.detached(owner)),
            Value::List(items) => {
                Value::List(items.into_iter().map(|v| v.detached(owner)).collect())
            }
            s => s,
        }
    }

    pub(crate) fn attached(self) -> Self {
        match self {
            Value::Fn(f) => Value::Fn(f.attached()),
            Value::List(items) => Value::List(items.into_iter().map(Value::attached).collect()),
            s => s,
        }
    }
}
