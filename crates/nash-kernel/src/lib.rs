//! nash-kernel: the core of the nash shell.
//!
//! This crate provides:
//!
//! - **Lexer**: positioned tokens over a logos raw-token layer
//! - **Parser**: recursive descent into the AST in [`ast`]
//! - **Printer**: canonical source form via `Display` on every node
//! - **Shell**: the evaluator, closures, commands, pipes and redirects
//! - **Rfork**: blocks run in a child shell under Linux namespaces
//!
//! ```ignore
//! use nash_kernel::{Shell, ShellConfig};
//!
//! let shell = Shell::new(ShellConfig::from_env());
//! shell.exec("example", r#"var a = (1 2 3); for x in $a { echo $x }"#).await?;
//! ```

pub mod ast;
pub mod builtins;
pub mod config;
pub mod exec;
pub mod import;
pub mod interpreter;
pub mod interrupt;
pub mod lexer;
pub mod parser;
pub mod rfork;
mod shell;

pub use config::ShellConfig;
pub use exec::{OutputBuffer, Sink, Source, Streams};
pub use interpreter::{ENOTFOUND, ENOTSTARTED, Error, Result, Value};
pub use interrupt::Interrupt;
pub use parser::{ParseError, parse};
pub use shell::Shell;
