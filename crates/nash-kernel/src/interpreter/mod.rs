//! Interpreter core for nash: values, scopes, control flow and errors.
//!
//! The evaluator itself lives on [`crate::Shell`]; this module holds the data
//! it operates on.

mod control_flow;
mod error;
mod scope;
mod value;

pub use control_flow::ControlFlow;
pub use error::{ENOTFOUND, ENOTSTARTED, Error, Result};
pub use scope::Scope;
pub use value::{FnDef, FnValue, UserFn, Value};
