//! split: break a string into a list.
//!
//! The separator is a substring, a list of single characters, or a function
//! called once per character that returns `"0"` where the string splits.
//! With a list or function separator empty fields are dropped.

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::interpreter::{Error, FnValue, Result, Value};

use super::Builtin;

pub struct Split;

#[async_trait(?Send)]
impl Builtin for Split {
    fn name(&self) -> &str {
        "split"
    }

    fn params(&self) -> Vec<FnParam> {
        vec![FnParam::new("content", false), FnParam::new("sep", false)]
    }

    async fn call(&self, shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        let [content, sep] = args.as_slice() else {
            return Err(Error::msg("split expects 2 arguments"));
        };
        let Some(content) = content.as_str() else {
            return Err(Error::msg("split: first argument must be a string"));
        };

        let fields = match sep {
            Value::Str(sep) => split_str(content, sep),
            Value::List(seps) => {
                let chars: Vec<char> = seps
                    .iter()
                    .filter_map(|v| v.as_str().and_then(|s| s.chars().next()))
                    .collect();
                split_fields(content, |c| chars.contains(&c))
            }
            Value::Fn(f) => split_by_fn(shell, content, f).await?,
        };

        Ok(vec![Value::list(fields)])
    }
}

fn split_str(content: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return content.chars().map(String::from).collect();
    }
    content.split(sep).map(String::from).collect()
}

/// Split around runs of characters matching `is_sep`, dropping empty fields.
pub(crate) fn split_fields(content: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    content
        .split(is_sep)
        .filter(|field| !field.is_empty())
        .map(String::from)
        .collect()
}

async fn split_by_fn(shell: &Shell, content: &str, f: &FnValue) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();

    for c in content.chars() {
        let results = shell.call_fn(f, vec![Value::Str(c.to_string())]).await?;
        let splits = matches!(results.as_slice(), [Value::Str(s)] if s == "0");
        if splits {
            if !current.is_empty() {
                fields.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }

    Ok(fields)
}
