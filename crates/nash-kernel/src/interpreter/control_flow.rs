//! Control flow signals for function bodies.
//!
//! `return` unwinds through nested blocks (if/for bodies) up to the
//! enclosing function invocation.

use super::value::Value;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ControlFlow {
    /// Keep executing the next statement.
    #[default]
    Normal,
    /// Leave the current function with these values.
    Return(Vec<Value>),
}

impl ControlFlow {
    pub fn is_normal(&self) -> bool {
        matches!(self, ControlFlow::Normal)
    }

    /// Return values, if this is a return.
    pub fn into_values(self) -> Option<Vec<Value>> {
        match self {
            ControlFlow::Return(values) => Some(values),
            ControlFlow::Normal => None,
        }
    }
}
