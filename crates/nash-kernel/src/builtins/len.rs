//! len: rune count of a string, element count of a list.

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Error, Result, Value};

use super::Builtin;

pub struct Len;

#[async_trait(?Send)]
impl Builtin for Len {
    fn name(&self) -> &str {
        "len"
    }

    fn params(&self) -> Vec<FnParam> {
        vec![FnParam::new("value", false)]
    }

    async fn call(&self, _shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        let [value] = args.as_slice() else {
            return Err(Error::msg("len expects one argument"));
        };
        match value.len() {
            Some(n) => Ok(vec![Value::Str(n.to_string())]),
            None => Err(Error::msg(format!(
                "len expects a list or string, but a {} was provided",
                value.type_name()
            ))),
        }
    }
}
