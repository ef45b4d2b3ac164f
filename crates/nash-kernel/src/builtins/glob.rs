//! glob: filesystem paths matching a pattern.

use async_trait::async_trait;
use tracing::warn;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Error, Result, Value};

use super::Builtin;

pub struct Glob;

#[async_trait(?Send)]
impl Builtin for Glob {
    fn name(&self) -> &str {
        "glob"
    }

    fn params(&self) -> Vec<FnParam> {
        vec![FnParam::new("pattern", false)]
    }

    async fn call(&self, _shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        let [pattern] = args.as_slice() else {
            return Err(Error::msg("glob expects 1 string argument (the pattern)"));
        };
        let Some(pattern) = pattern.as_str() else {
            return Err(Error::msg(format!(
                "glob expects a pattern string, but a {} was provided",
                pattern.type_name()
            )));
        };

        let paths = ::glob::glob(pattern)
            .map_err(|e| Error::msg(format!("glob: invalid pattern {pattern:?}: {e}")))?;

        let mut matches = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => matches.push(Value::Str(path.to_string_lossy().into_owned())),
                Err(e) => warn!("glob: skipping unreadable path: {e}"),
            }
        }
        Ok(vec![Value::List(matches)])
    }
}
