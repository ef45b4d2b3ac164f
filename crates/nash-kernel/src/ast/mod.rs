//! Abstract Syntax Tree types for nash.
//!
//! This module provides:
//! - AST type definitions (`types` module, re-exported at this level)
//! - The pretty printer (`format` module), exposed through `Display`

mod types;
pub mod format;

pub use types::*;
