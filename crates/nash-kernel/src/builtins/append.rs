//! append: a new list with values added at the end.

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Error, Result, Value};

use super::Builtin;

pub struct Append;

#[async_trait(?Send)]
impl Builtin for Append {
    fn name(&self) -> &str {
        "append"
    }

    fn params(&self) -> Vec<FnParam> {
        vec![FnParam::new("list", false), FnParam::new("values", true)]
    }

    async fn call(&self, _shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        if args.len() < 2 {
            return Err(Error::msg("append expects at least two arguments"));
        }
        let mut args = args.into_iter();
        let Some(Value::List(mut items)) = args.next() else {
            return Err(Error::msg("append expects a list as first argument"));
        };
        items.extend(args);
        Ok(vec![Value::List(items)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShellConfig;

    #[tokio::test]
    async fn test_append_copies_list() {
        let shell = Shell::new(ShellConfig::default());
        let list = Value::list(["a"]);
        let got = Append
            .call(&shell, vec![list.clone(), Value::str("b"), Value::list(["c"])])
            .await
            .unwrap();
        let expected = Value::List(vec![Value::str("a"), Value::str("b"), Value::list(["c"])]);
        assert_eq!(got, vec![expected]);
        assert_eq!(list, Value::list(["a"]));
    }

    #[tokio::test]
    async fn test_append_errors() {
        let shell = Shell::new(ShellConfig::default());
        let err = Append.call(&shell, vec![Value::list(["a"])]).await.unwrap_err();
        assert_eq!(err.to_string(), "append expects at least two arguments");

        let err = Append
            .call(&shell, vec![Value::str("a"), Value::str("b")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "append expects a list as first argument");
    }
}
