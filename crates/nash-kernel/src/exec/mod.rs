//! Process runtime: stream wiring, redirects, external commands and pipes.

mod command;
mod pipeline;
pub mod redirect;
pub mod stdio;

pub use stdio::{OutputBuffer, Sink, Source, Streams};

pub(crate) use command::exit_result;
