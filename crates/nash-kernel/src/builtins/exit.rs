//! exit: stop the shell with a status.
//!
//! The library never terminates the process; the status unwinds as
//! [`Error::Exit`] to the host.

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Error, Result, Value};

use super::Builtin;

pub struct Exit;

#[async_trait(?Send)]
impl Builtin for Exit {
    fn name(&self) -> &str {
        "exit"
    }

    fn params(&self) -> Vec<FnParam> {
        vec![FnParam::new("status", false)]
    }

    async fn call(&self, _shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        let [status] = args.as_slice() else {
            return Err(Error::msg("exit expects one argument"));
        };
        let Some(status) = status.as_str() else {
            return Err(Error::msg(format!(
                "exit expects a status string, but a {} was provided",
                status.type_name()
            )));
        };
        match status.trim().parse::<i32>() {
            Ok(code) => Err(Error::Exit(code)),
            Err(e) => Err(Error::msg(format!("exit: converting status '{status}' to int: {e}"))),
        }
    }
}
