//! `format`, `sprint` and `print`: C-style formatting of values.
//!
//! Handles `%[flags][width][.precision]verb` specifiers with the verbs
//! `s`, `v`, `d`, `q`, `x`, `X` and `%%`. Backslash escapes are resolved by
//! the scanner inside quoted strings, not here.

use async_trait::async_trait;

use crate::Shell;
use crate::ast::FnParam;
use crate::ast::format::quote;
use crate::interpreter::{Error, Result, Value};

use super::Builtin;

/// Values that can be consumed by a format verb.
pub trait FormatArg {
    fn as_format_string(&self) -> String;
    fn as_format_int(&self) -> Option<i64>;
}

impl FormatArg for Value {
    fn as_format_string(&self) -> String {
        self.to_string()
    }

    fn as_format_int(&self) -> Option<i64> {
        self.as_str().and_then(|s| s.trim().parse().ok())
    }
}

/// Parsed `%[flags][width][.precision]verb`.
struct FormatSpec {
    left_align: bool,
    zero_pad: bool,
    width: Option<usize>,
    precision: Option<usize>,
    verb: char,
}

/// Format `format` with `args`.
///
/// A verb without a matching argument renders as `%!s(MISSING)`; a `%d`
/// whose argument is not an integer renders as `%!d(string=…)`.
pub fn format_string<A: FormatArg>(format: &str, args: &[A]) -> String {
    let mut output = String::new();
    let mut arg_index = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }
        match parse_specifier(&mut chars) {
            Some(spec) => {
                apply_specifier(&spec, args.get(arg_index), &mut output);
                arg_index += 1;
            }
            None => output.push('%'),
        }
    }

    output
}

/// Parse a specifier after its `%`. Returns `None` for `%%` and for a
/// trailing lone `%`.
fn parse_specifier(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<FormatSpec> {
    if chars.peek() == Some(&'%') {
        chars.next();
        return None;
    }

    let mut spec = FormatSpec {
        left_align: false,
        zero_pad: false,
        width: None,
        precision: None,
        verb: 's',
    };

    loop {
        match chars.peek() {
            Some('-') => spec.left_align = true,
            Some('0') => spec.zero_pad = true,
            _ => break,
        }
        chars.next();
    }

    spec.width = take_number(chars);

    if chars.peek() == Some(&'.') {
        chars.next();
        spec.precision = Some(take_number(chars).unwrap_or(0));
    }

    spec.verb = chars.next()?;
    Some(spec)
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits.parse().ok()
}

fn apply_specifier<A: FormatArg>(spec: &FormatSpec, arg: Option<&A>, output: &mut String) {
    let Some(arg) = arg else {
        output.push_str(&format!("%!{}(MISSING)", spec.verb));
        return;
    };

    match spec.verb {
        's' | 'v' => {
            let mut s = arg.as_format_string();
            if let Some(precision) = spec.precision {
                s = s.chars().take(precision).collect();
            }
            pad(spec, &s, output);
        }
        'q' => pad(spec, &quote(&arg.as_format_string()), output),
        'd' => match arg.as_format_int() {
            Some(n) => pad_int(spec, &n.to_string(), n < 0, output),
            None => output.push_str(&format!("%!d(string={})", arg.as_format_string())),
        },
        'x' | 'X' => {
            let raw = match arg.as_format_int() {
                Some(n) if spec.verb == 'x' => format!("{n:x}"),
                Some(n) => format!("{n:X}"),
                None => hex_bytes(&arg.as_format_string(), spec.verb == 'X'),
            };
            pad_int(spec, &raw, false, output);
        }
        other => output.push_str(&format!("%!{other}(string={})", arg.as_format_string())),
    }
}

fn hex_bytes(s: &str, upper: bool) -> String {
    s.bytes()
        .map(|b| if upper { format!("{b:02X}") } else { format!("{b:02x}") })
        .collect()
}

fn pad(spec: &FormatSpec, val: &str, output: &mut String) {
    let len = val.chars().count();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    if spec.left_align {
        output.push_str(val);
        output.extend(std::iter::repeat_n(' ', fill));
    } else {
        let pad_char = if spec.zero_pad { '0' } else { ' ' };
        output.extend(std::iter::repeat_n(pad_char, fill));
        output.push_str(val);
    }
}

fn pad_int(spec: &FormatSpec, raw: &str, negative: bool, output: &mut String) {
    let fill = spec.width.unwrap_or(0).saturating_sub(raw.len());
    if spec.left_align {
        output.push_str(raw);
        output.extend(std::iter::repeat_n(' ', fill));
    } else if spec.zero_pad {
        let digits = if negative {
            output.push('-');
            &raw[1..]
        } else {
            raw
        };
        output.extend(std::iter::repeat_n('0', fill));
        output.push_str(digits);
    } else {
        output.extend(std::iter::repeat_n(' ', fill));
        output.push_str(raw);
    }
}

fn format_args(name: &str, args: &[Value]) -> Result<String> {
    let Some((fmt, rest)) = args.split_first() else {
        return Err(Error::msg(format!("{name} expects at least 1 argument")));
    };
    Ok(format_string(&fmt.to_string(), rest))
}

fn format_params() -> Vec<FnParam> {
    vec![FnParam::new("fmt", false), FnParam::new("args", true)]
}

/// `format(fmt, args...)`, also registered as `sprint`.
pub struct Format {
    name: &'static str,
}

impl Format {
    pub fn sprint() -> Self {
        Self { name: "sprint" }
    }
}

impl Default for Format {
    fn default() -> Self {
        Self { name: "format" }
    }
}

#[async_trait(?Send)]
impl Builtin for Format {
    fn name(&self) -> &str {
        self.name
    }

    fn params(&self) -> Vec<FnParam> {
        format_params()
    }

    async fn call(&self, _shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        Ok(vec![Value::Str(format_args(self.name, &args)?)])
    }
}

/// `print(fmt, args...)`: like `format`, written to stdout.
pub struct Print;

#[async_trait(?Send)]
impl Builtin for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn params(&self) -> Vec<FnParam> {
        format_params()
    }

    async fn call(&self, shell: &Shell, args: Vec<Value>) -> Result<Vec<Value>> {
        let text = format_args("print", &args)?;
        shell.write_stdout(text.as_bytes())?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strs(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| Value::str(*s)).collect()
    }

    #[rstest]
    #[case("%s %s", &["hello", "world"], "hello world")]
    #[case("%d items", &["42"], "42 items")]
    #[case("%-6s|", &["hi"], "hi    |")]
    #[case("%6s|", &["hi"], "    hi|")]
    #[case("%05d", &["42"], "00042")]
    #[case("%05d", &["-42"], "-0042")]
    #[case("%x", &["255"], "ff")]
    #[case("%x", &["hi"], "6869")]
    #[case("%q", &["a\"b"], "\"a\\\"b\"")]
    #[case("%.2s", &["abcdef"], "ab")]
    #[case("100%%", &[], "100%")]
    #[case("%v", &["v"], "v")]
    fn test_format_string(#[case] fmt: &str, #[case] args: &[&str], #[case] expected: &str) {
        assert_eq!(format_string(fmt, &strs(args)), expected);
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(format_string("%s-%s", &strs(&["a"])), "a-%!s(MISSING)");
    }

    #[test]
    fn test_bad_int() {
        assert_eq!(format_string("%d", &strs(&["x"])), "%!d(string=x)");
    }

    #[test]
    fn test_list_argument_is_space_joined() {
        let args = vec![Value::list(["a", "b"])];
        assert_eq!(format_string("[%s]", &args), "[a b]");
    }

    #[test]
    fn test_no_backslash_processing() {
        assert_eq!(format_string("a\\nb", &strs(&[])), "a\\nb");
    }
}
