//! Typed errors raised while evaluating nash code.
//!
//! The evaluator dispatches on the marker predicates (`is_ignore`,
//! `is_interrupted`, `is_not_found`, `is_unfinished`) rather than on message
//! text.

use crate::ast::Pos;
use crate::parser::ParseError;

/// Status reported for a command that could not be found.
pub const ENOTFOUND: i32 = 127;
/// Status reported for a command that could not be started.
pub const ENOTSTARTED: i32 = 255;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Evaluation failure; the message already carries `file:line:col:`.
    #[error("{message}")]
    Eval { message: String },

    /// Evaluation failure not yet tied to a source position. The evaluator
    /// locates it at the statement that triggered it.
    #[error("{0}")]
    Message(String),

    /// Command lookup failed.
    #[error("{message}")]
    NotFound { name: String, message: String },

    /// A command ran and exited with a non-zero status, or failed to start.
    #[error("{message}")]
    Exited { status: i32, message: String },

    /// A failure suppressed by the `-cmd` prefix.
    #[error("{0}")]
    Ignore(Box<Error>),

    /// A loop stopped by SIGINT.
    #[error("{0}")]
    Interrupted(String),

    /// `exit(n)` unwinding to the host.
    #[error("exit status {0}")]
    Exit(i32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Per-stage messages of a failed pipeline.
    #[error("{}", .0.join("|"))]
    Pipeline(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// An evaluation error located at `pos` inside `file`.
    pub fn eval(file: &str, pos: Pos, message: impl AsRef<str>) -> Self {
        Error::Eval {
            message: format!("{}:{}:{}: {}", file, pos.line(), pos.column(), message.as_ref()),
        }
    }

    /// An evaluation error without a source position.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Attach a position to an unlocated message; other errors pass through.
    pub fn locate(self, file: &str, pos: Pos) -> Self {
        match self {
            Error::Message(message) => Error::eval(file, pos, message),
            other => other,
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Error::NotFound {
            message: format!("{name}: command not found"),
            name,
        }
    }

    pub fn is_unfinished(&self) -> bool {
        matches!(self, Error::Parse(e) if e.is_unfinished())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, Error::Ignore(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted(_))
    }

    /// Failures of the executed command itself, as opposed to evaluation
    /// errors around it.
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Exited { .. } | Error::Pipeline(_)
        )
    }

    /// The status the process should exit with when this error reaches the
    /// top level.
    pub fn exit_status(&self) -> i32 {
        match self {
            Error::Exit(code) => *code,
            _ => 1,
        }
    }

    /// The shell-visible status for a failed command.
    pub fn command_status(&self) -> i32 {
        match self {
            Error::NotFound { .. } => ENOTFOUND,
            Error::Exited { status, .. } => *status,
            Error::Ignore(inner) => inner.command_status(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_prefix() {
        let err = Error::eval("script.sh", Pos::new(3, 7), "Variable $x not set");
        assert_eq!(err.to_string(), "script.sh:3:7: Variable $x not set");
    }

    #[test]
    fn test_locate_once() {
        let err = Error::msg("len expects one argument").locate("a.sh", Pos::new(1, 2));
        assert_eq!(err.to_string(), "a.sh:1:2: len expects one argument");
        let again = err.locate("b.sh", Pos::new(9, 9));
        assert_eq!(again.to_string(), "a.sh:1:2: len expects one argument");
    }

    #[test]
    fn test_pipeline_joins_stages() {
        let err = Error::Pipeline(vec!["success".into(), "exit status 1".into()]);
        assert_eq!(err.to_string(), "success|exit status 1");
    }

    #[test]
    fn test_markers() {
        let ignored = Error::Ignore(Box::new(Error::not_found("nope")));
        assert!(ignored.is_ignore());
        assert_eq!(ignored.command_status(), ENOTFOUND);
        assert!(Error::Interrupted("loop interrupted".into()).is_interrupted());
        assert!(Error::not_found("x").is_not_found());
        assert_eq!(Error::Exit(3).exit_status(), 3);
        assert_eq!(Error::msg("boom").exit_status(), 1);
    }

    #[test]
    fn test_unfinished_from_parser() {
        let err = Error::from(ParseError::UnfinishedBlock("t:1:1: open".into()));
        assert!(err.is_unfinished());
        assert!(!Error::from(ParseError::Syntax("t:1:1: bad".into())).is_unfinished());
    }
}
