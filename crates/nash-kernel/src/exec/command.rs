//! Command preparation: argument evaluation, lookup and process spawning.

use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::Shell;
use crate::ast::CommandNode;
use crate::interpreter::{ENOTSTARTED, Error, FnValue, Result, Value};

use super::redirect::Redirect;
use super::stdio::Streams;

/// What a command name resolved to.
pub(crate) enum Target {
    External(PathBuf),
    /// A function bound to the command name with `bindfn`.
    Bind(FnValue),
    /// Neither a program nor a bind; the stage fails as not found.
    Missing,
}

/// A command with its arguments and redirect locations evaluated.
pub(crate) struct Prepared {
    pub name: String,
    pub ignore: bool,
    pub args: Vec<Value>,
    pub redirects: Vec<Redirect>,
    pub target: Target,
}

impl Shell {
    pub(crate) async fn prepare_command(&self, node: &CommandNode) -> Result<Prepared> {
        let (name, ignore) = match node.name.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => (rest.to_string(), true),
            _ => (node.name.clone(), false),
        };

        let args = self.eval_args(&node.args).await?;

        let mut redirects = Vec::with_capacity(node.redirects.len());
        for r in &node.redirects {
            let location = match &r.location {
                Some(expr) => Some(self.eval_expr(expr).await?),
                None => None,
            };
            redirects.push(Redirect { map: r.map, location });
        }

        let target = match self.resolve_command(&name) {
            Ok(path) => {
                debug!(command = %name, path = %path.display(), "resolved");
                Target::External(path)
            }
            Err(e) if e.is_not_found() => match self.scope().get_bind(&name) {
                Some(f) => {
                    debug!(command = %name, function = f.name(), "bind");
                    Target::Bind(f)
                }
                None => Target::Missing,
            },
            Err(e) => return Err(e),
        };

        Ok(Prepared { name, ignore, args, redirects, target })
    }

    /// Find the executable for `name`, searching the shell's `PATH` when the
    /// name has no slash.
    pub(crate) fn resolve_command(&self, name: &str) -> Result<PathBuf> {
        if name.contains('/') {
            let path = PathBuf::from(name);
            return if path.is_file() { Ok(path) } else { Err(Error::not_found(name)) };
        }

        let search = self
            .get_var("PATH")
            .map(|v| v.to_string())
            .unwrap_or_default();
        search
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| Path::new(dir).join(name))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(|| Error::not_found(name))
    }

    /// The environment passed to children, built from exported variables.
    pub(crate) fn environ(&self) -> Vec<(String, String)> {
        self.exported()
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Str(s) => Some((name, s)),
                Value::List(_) => Some((name, format!("({value})"))),
                Value::Fn(_) => None,
            })
            .collect()
    }

    /// Start an external program wired to `streams`.
    pub(crate) fn spawn_external(
        &self,
        prepared: &Prepared,
        path: &Path,
        streams: &Streams,
        copies: &mut Vec<JoinHandle<std::io::Result<()>>>,
    ) -> Result<Child> {
        let argv = to_argv(&prepared.name, &prepared.args)?;
        let not_started = |e: std::io::Error| Error::Exited {
            status: ENOTSTARTED,
            message: format!("{}: {e}", prepared.name),
        };

        let mut command = tokio::process::Command::new(path);
        command
            .arg0(&prepared.name)
            .args(argv)
            .env_clear()
            .envs(self.environ())
            .stdin(streams.stdin.to_stdio().map_err(not_started)?)
            .stdout(streams.stdout.to_stdio(copies).map_err(not_started)?)
            .stderr(streams.stderr.to_stdio(copies).map_err(not_started)?);

        debug!(command = %prepared.name, "spawn");
        // The command holds the parent's copies of the pipe ends until dropped.
        let child = command.spawn().map_err(not_started);
        drop(command);
        child
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn to_argv(name: &str, args: &[Value]) -> Result<Vec<String>> {
    args.iter()
        .map(|arg| match arg {
            Value::Str(s) => Ok(s.clone()),
            Value::List(_) => Ok(arg.to_string()),
            Value::Fn(f) => Err(Error::msg(format!(
                "{name}: function {} cannot be passed as a command argument",
                f.name()
            ))),
        })
        .collect()
}

/// Map a wait status to the shell status and the error for non-zero exits.
pub(crate) fn exit_result(status: ExitStatus) -> Result<()> {
    let code = match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    };
    if code == 0 {
        Ok(())
    } else {
        Err(Error::Exited {
            status: code,
            message: format!("exit status {code}"),
        })
    }
}
