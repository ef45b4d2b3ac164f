//! chdir: change the process working directory.

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Error, Result, Value};

use super::Builtin;

pub struct Chdir;

#[async_trait(?Send)]
impl Builtin for Chdir {
    fn name(&self) -> &str {
        "chdir"
    }

    fn params(&self) -> Vec<FnParam> {
        vec![FnParam::new("dir", false)]
    }

    async fn call(&self, shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        let [dir] = args.as_slice() else {
            return Err(Error::msg("chdir expects one argument"));
        };
        let Some(dir) = dir.as_str() else {
            return Err(Error::msg(format!(
                "chdir expects a string, but a {} was provided",
                dir.type_name()
            )));
        };
        shell.change_dir(dir)?;
        Ok(Vec::new())
    }
}
