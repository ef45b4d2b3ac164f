//! Scanner for nash source code.
//!
//! Tokenizing happens in two layers. A logos-generated lexer splits the
//! source into raw tokens (quoted strings, variables, punctuation and bare
//! words). The [`Scanner`] then walks those lazily, attaches line/column
//! positions, and classifies bare words by context: keywords, identifiers,
//! integers, `=`, `==`, `...` and plain arguments.
//!
//! # Context sensitivity
//!
//! A bare word such as `a=1` is a single argument in `echo a=1`, but an
//! assignment at the start of a statement. The scanner tracks whether it is
//! positioned at a statement start (after a newline outside parentheses,
//! `;`, `{`, `}`, `|`, `,`, `var` or `setenv`) and only splits `name=value`
//! words there.

use std::collections::VecDeque;
use std::fmt;

use logos::{Logos, Span};

/// Line and column of a token (both 1-based, columns count characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    Eof,
    Comment,
    Newline,
    Semicolon,

    Ident,
    /// `$name`; the token value holds the name without `$`.
    Variable,
    /// Double-quoted string; the value holds the unescaped content.
    String,
    Number,
    /// Bare argument that is neither an identifier nor a number.
    Arg,

    // Keywords
    Var,
    Fn,
    Return,
    If,
    Else,
    For,
    In,
    Import,
    Setenv,
    Rfork,
    Cd,
    BindFn,
    Dump,
    Builtin,

    // Operators
    Assign,
    AssignCmd,
    Equal,
    NotEqual,
    Plus,
    Pipe,
    Gt,
    LBrack,
    RBrack,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dotdotdot,
}

impl TokenKind {
    /// Keyword for a bare word, if it is one.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "var" => TokenKind::Var,
            "fn" => TokenKind::Fn,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "import" => TokenKind::Import,
            "setenv" => TokenKind::Setenv,
            "rfork" => TokenKind::Rfork,
            "cd" => TokenKind::Cd,
            "bindfn" => TokenKind::BindFn,
            "dump" => TokenKind::Dump,
            "builtin" => TokenKind::Builtin,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Fn
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Import
                | TokenKind::Setenv
                | TokenKind::Rfork
                | TokenKind::Cd
                | TokenKind::BindFn
                | TokenKind::Dump
                | TokenKind::Builtin
        )
    }

    /// Tokens that can stand as a bare word in argument position.
    pub fn is_word(self) -> bool {
        matches!(self, TokenKind::Ident | TokenKind::Number | TokenKind::Arg) || self.is_keyword()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
            TokenKind::Comment => "COMMENT",
            TokenKind::Newline => "newline",
            TokenKind::Semicolon => ";",
            TokenKind::Ident => "IDENT",
            TokenKind::Variable => "VARIABLE",
            TokenKind::String => "STRING",
            TokenKind::Number => "NUMBER",
            TokenKind::Arg => "ARG",
            TokenKind::Var => "var",
            TokenKind::Fn => "fn",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Import => "import",
            TokenKind::Setenv => "setenv",
            TokenKind::Rfork => "rfork",
            TokenKind::Cd => "cd",
            TokenKind::BindFn => "bindfn",
            TokenKind::Dump => "dump",
            TokenKind::Builtin => "builtin",
            TokenKind::Assign => "=",
            TokenKind::AssignCmd => "<=",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Plus => "+",
            TokenKind::Pipe => "|",
            TokenKind::Gt => ">",
            TokenKind::LBrack => "[",
            TokenKind::RBrack => "]",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dotdotdot => "...",
        };
        f.write_str(s)
    }
}

/// A classified token with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal value. For `Illegal` tokens this is the full diagnostic.
    pub value: String,
    pub pos: Position,
    /// True when no whitespace separates this token from the previous one.
    pub adjacent: bool,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Illegal => write!(f, "{}", self.value),
            TokenKind::String => write!(f, "\"{}\"", self.value),
            TokenKind::Variable => write!(f, "${}", self.value),
            TokenKind::Newline => write!(f, "newline"),
            _ => write!(f, "{}", self.value),
        }
    }
}

/// Raw lexer errors, turned into `Illegal` tokens by the scanner.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r]+")]
enum RawToken {
    #[token("\n")]
    Newline,

    #[token(";")]
    Semicolon,

    #[regex(r"#[^\n]*", |lex| lex.slice().to_string(), allow_greedy = true)]
    Comment(String),

    #[token("\"", lex_quoted)]
    Quoted(String),

    #[regex(r"\$[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[regex(r"[\p{L}\p{N}_\-/:.=%@]+", |lex| lex.slice().to_string())]
    Word(String),

    #[token("<=")]
    AssignCmd,

    #[token("!=")]
    NotEqual,

    #[token("+")]
    Plus,

    #[token("|")]
    Pipe,

    #[token(">")]
    Gt,

    #[token("[")]
    LBrack,

    #[token("]")]
    RBrack,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,
}

/// Scan a double-quoted string after its opening quote.
fn lex_quoted(lex: &mut logos::Lexer<RawToken>) -> Result<String, LexError> {
    let rest = lex.remainder();
    let mut out = String::new();
    let mut chars = rest.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                lex.bump(i + 1);
                return Ok(out);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c => out.push(c),
        }
    }

    lex.bump(rest.len());
    Err(LexError::UnterminatedString)
}

fn is_ident(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_number(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

/// Lazy token stream over a source text.
///
/// The iterator yields exactly one `Eof` token at the end. After an
/// `Illegal` token the stream ends.
pub struct Scanner<'src> {
    name: String,
    source: &'src str,
    raw: logos::SpannedIter<'src, RawToken>,
    pending: VecDeque<Token>,
    line_starts: Vec<usize>,
    prev_end: Option<usize>,
    at_start: bool,
    paren_depth: usize,
    finished: bool,
}

impl<'src> Scanner<'src> {
    pub fn new(name: impl Into<String>, source: &'src str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));

        Self {
            name: name.into(),
            source,
            raw: RawToken::lexer(source).spanned(),
            pending: VecDeque::new(),
            line_starts,
            prev_end: None,
            at_start: true,
            paren_depth: 0,
            finished: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn pos_at(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts.get(line.saturating_sub(1)).copied().unwrap_or(0);
        let column = self.source.get(start..offset).map_or(0, |s| s.chars().count()) + 1;
        Position::new(line.max(1), column)
    }

    fn push(&mut self, kind: TokenKind, value: impl Into<String>, offset: usize, adjacent: bool) {
        let pos = self.pos_at(offset);
        self.pending.push_back(Token {
            kind,
            value: value.into(),
            pos,
            adjacent,
        });
    }

    fn illegal(&mut self, offset: usize, message: impl fmt::Display) {
        let pos = self.pos_at(offset);
        let value = format!("{}:{}:{}: {}", self.name, pos.line, pos.column, message);
        self.pending.push_back(Token {
            kind: TokenKind::Illegal,
            value,
            pos,
            adjacent: false,
        });
        self.finished = true;
    }

    /// Split a bare word into classified tokens.
    fn push_word(&mut self, word: &str, offset: usize, adjacent: bool, at_start: bool) {
        match word {
            "=" => return self.push(TokenKind::Assign, word, offset, adjacent),
            "==" => return self.push(TokenKind::Equal, word, offset, adjacent),
            "..." => return self.push(TokenKind::Dotdotdot, word, offset, adjacent),
            _ => {}
        }

        if let Some(prefix) = word.strip_suffix("...") {
            self.push_word(prefix, offset, adjacent, at_start);
            self.push(TokenKind::Dotdotdot, "...", offset + prefix.len(), true);
            return;
        }

        if at_start {
            if let Some((name, rest)) = word.split_once('=') {
                if is_ident(name) && !rest.starts_with('=') {
                    self.push(TokenKind::Ident, name, offset, adjacent);
                    self.push(TokenKind::Assign, "=", offset + name.len(), true);
                    if !rest.is_empty() {
                        self.push_word(rest, offset + name.len() + 1, true, false);
                    }
                    return;
                }
            }
        }

        let kind = if let Some(keyword) = TokenKind::keyword(word) {
            keyword
        } else if is_number(word) {
            TokenKind::Number
        } else if is_ident(word) {
            TokenKind::Ident
        } else {
            TokenKind::Arg
        };
        self.push(kind, word, offset, adjacent);
    }

    fn scan_one(&mut self, result: Result<RawToken, LexError>, span: Span) {
        let adjacent = self.prev_end == Some(span.start);
        self.prev_end = Some(span.end);
        let at_start = self.at_start;
        self.at_start = false;

        let token = match result {
            Ok(token) => token,
            Err(LexError::UnterminatedString) => {
                return self.illegal(span.start, "Quoted string not finished");
            }
            Err(LexError::UnexpectedCharacter) => {
                let found = self.source.get(span.clone()).unwrap_or_default().to_string();
                return self.illegal(span.start, format!("Unexpected character {found:?}"));
            }
        };

        match token {
            RawToken::Newline => {
                self.push(TokenKind::Newline, "\n", span.start, adjacent);
                self.at_start = self.paren_depth == 0 || at_start;
            }
            RawToken::Semicolon => {
                self.push(TokenKind::Semicolon, ";", span.start, adjacent);
                self.at_start = true;
            }
            RawToken::Comment(text) => {
                self.push(TokenKind::Comment, text, span.start, adjacent);
                self.at_start = at_start;
            }
            RawToken::Quoted(text) => self.push(TokenKind::String, text, span.start, adjacent),
            RawToken::Variable(name) => self.push(TokenKind::Variable, name, span.start, adjacent),
            RawToken::Word(word) => {
                self.push_word(&word, span.start, adjacent, at_start);
                if matches!(word.as_str(), "var" | "setenv") {
                    self.at_start = true;
                }
            }
            RawToken::AssignCmd => self.push(TokenKind::AssignCmd, "<=", span.start, adjacent),
            RawToken::NotEqual => self.push(TokenKind::NotEqual, "!=", span.start, adjacent),
            RawToken::Plus => self.push(TokenKind::Plus, "+", span.start, adjacent),
            RawToken::Pipe => {
                self.push(TokenKind::Pipe, "|", span.start, adjacent);
                self.at_start = true;
            }
            RawToken::Gt => self.push(TokenKind::Gt, ">", span.start, adjacent),
            RawToken::LBrack => self.push(TokenKind::LBrack, "[", span.start, adjacent),
            RawToken::RBrack => self.push(TokenKind::RBrack, "]", span.start, adjacent),
            RawToken::LParen => {
                self.paren_depth += 1;
                self.push(TokenKind::LParen, "(", span.start, adjacent);
            }
            RawToken::RParen => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                self.push(TokenKind::RParen, ")", span.start, adjacent);
            }
            RawToken::LBrace => {
                self.push(TokenKind::LBrace, "{", span.start, adjacent);
                self.at_start = true;
            }
            RawToken::RBrace => {
                self.push(TokenKind::RBrace, "}", span.start, adjacent);
                self.at_start = true;
            }
            RawToken::Comma => {
                self.push(TokenKind::Comma, ",", span.start, adjacent);
                self.at_start = at_start || self.paren_depth == 0;
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.finished {
                return None;
            }
            match self.raw.next() {
                Some((result, span)) => self.scan_one(result, span),
                None => {
                    let end = self.source.len();
                    self.push(TokenKind::Eof, "", end, false);
                    self.finished = true;
                }
            }
        }
    }
}

/// Scan a whole source into a vector of tokens (including the final `Eof`
/// or `Illegal` token).
pub fn tokenize(name: &str, source: &str) -> Vec<Token> {
    Scanner::new(name, source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize("test", source).into_iter().map(|t| t.kind).collect()
    }

    fn values(source: &str) -> Vec<std::string::String> {
        tokenize("test", source).into_iter().map(|t| t.value).collect()
    }

    use TokenKind::*;

    #[rstest]
    #[case::empty("", vec![Eof])]
    #[case::command("echo hello", vec![Ident, Ident, Eof])]
    #[case::flag_arg("ls -la /tmp", vec![Ident, Arg, Arg, Eof])]
    #[case::string("echo \"hello world\"", vec![Ident, String, Eof])]
    #[case::variable("echo $HOME", vec![Ident, Variable, Eof])]
    #[case::assignment("a = \"1\"", vec![Ident, Assign, String, Eof])]
    #[case::tight_assignment("a=1", vec![Ident, Assign, Number, Eof])]
    #[case::tight_assignment_string("a=\"x\"", vec![Ident, Assign, String, Eof])]
    #[case::arg_with_equals("echo a=1", vec![Ident, Arg, Eof])]
    #[case::exec_assign("var out <= ls", vec![Var, Ident, AssignCmd, Ident, Eof])]
    #[case::multi_target("a, b <= ls", vec![Ident, Comma, Ident, AssignCmd, Ident, Eof])]
    #[case::if_equal("if $a == \"b\" {", vec![If, Variable, Equal, String, LBrace, Eof])]
    #[case::if_not_equal("if $a != $b {", vec![If, Variable, NotEqual, Variable, LBrace, Eof])]
    #[case::pipe("ls | wc -l", vec![Ident, Pipe, Ident, Arg, Eof])]
    #[case::redirect_map("cmd >[2=1]", vec![Ident, Gt, LBrack, Arg, RBrack, Eof])]
    #[case::redirect_suppress("cmd >[2=]", vec![Ident, Gt, LBrack, Arg, RBrack, Eof])]
    #[case::redirect_file("cmd > /tmp/out", vec![Ident, Gt, Arg, Eof])]
    #[case::variadic_param("fn p(args...) {", vec![Fn, Ident, LParen, Ident, Dotdotdot, RParen, LBrace, Eof])]
    #[case::spread("p($a...)", vec![Ident, LParen, Variable, Dotdotdot, RParen, Eof])]
    #[case::index("echo $l[0]", vec![Ident, Variable, LBrack, Number, RBrack, Eof])]
    #[case::concat("echo $a+\"b\"", vec![Ident, Variable, Plus, String, Eof])]
    #[case::list("var a = (1 2 3)", vec![Var, Ident, Assign, LParen, Number, Number, Number, RParen, Eof])]
    #[case::semicolons("a; b", vec![Ident, Semicolon, Ident, Eof])]
    #[case::comment("# hello\nls", vec![Comment, Newline, Ident, Eof])]
    #[case::keywords(
        "import setenv rfork cd bindfn dump builtin return else in for",
        vec![Import, Setenv, Rfork, Cd, BindFn, Dump, Builtin, Return, Else, In, For, Eof]
    )]
    fn test_token_kinds(#[case] source: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize("test", r#""a\"b\\c\td\ne\rf""#);
        assert_eq!(tokens[0].kind, String);
        assert_eq!(tokens[0].value, "a\"b\\c\td\ne\rf");
    }

    #[test]
    fn test_unknown_escape_kept() {
        let tokens = tokenize("test", r#""a\qb""#);
        assert_eq!(tokens[0].value, "a\\qb");
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = tokenize("file.sh", "echo \"hello");
        let last = tokens.last().cloned();
        let last = last.unwrap_or_else(|| panic!("no tokens"));
        assert_eq!(last.kind, Illegal);
        assert_eq!(last.value, "file.sh:1:6: Quoted string not finished");
    }

    #[test]
    fn test_illegal_character_stops_stream() {
        let tokens = tokenize("x", "echo ^ foo");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, Illegal);
        assert!(tokens[1].value.starts_with("x:1:6: Unexpected character"));
    }

    #[test]
    fn test_split_only_at_statement_start() {
        assert_eq!(values("a=b; echo c=d"), vec!["a", "=", "b", ";", "echo", "c=d", ""]);
    }

    #[test]
    fn test_split_after_var_keyword() {
        assert_eq!(kinds("var a=1"), vec![Var, Ident, Assign, Number, Eof]);
    }

    #[test]
    fn test_no_split_inside_parens_newline() {
        assert_eq!(
            kinds("(echo\n a=b\n)"),
            vec![LParen, Ident, Newline, Arg, Newline, RParen, Eof]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("t", "echo a\n  ls $HOME");
        let positions: Vec<_> = tokens.iter().map(|t| (t.pos.line, t.pos.column)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 6), (1, 7), (2, 3), (2, 6), (2, 11)]);
    }

    #[test]
    fn test_positions_count_characters() {
        let tokens = tokenize("t", "echo \"ção\" x");
        assert_eq!(tokens[2].pos, Position::new(1, 12));
    }

    #[test]
    fn test_adjacency() {
        let tokens = tokenize("t", "f(a) g (b)");
        assert!(tokens[1].adjacent);
        assert!(!tokens[5].adjacent);
    }

    #[test]
    fn test_unicode_words() {
        let tokens = tokenize("t", "echo olá $ação");
        assert_eq!(tokens[1].kind, Ident);
        assert_eq!(tokens[1].value, "olá");
        assert_eq!(tokens[2].kind, Variable);
        assert_eq!(tokens[2].value, "ação");
    }

    #[test]
    fn test_shebang_comment() {
        let tokens = tokenize("t", "#!/usr/bin/env nash\necho");
        assert_eq!(tokens[0].kind, Comment);
        assert_eq!(tokens[0].value, "#!/usr/bin/env nash");
    }

    #[test]
    fn test_single_eof() {
        let tokens = tokenize("t", "echo\n");
        assert_eq!(tokens.iter().filter(|t| t.kind == Eof).count(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn scanner_always_terminates(src in "\\PC{0,64}") {
                let tokens = tokenize("p", &src);
                let last = tokens.last().map(|t| t.kind);
                prop_assert!(matches!(last, Some(Eof) | Some(Illegal)));
            }

            #[test]
            fn quoted_strings_roundtrip(text in "[a-zA-Z0-9 \\t\\n\"\\\\]{0,32}") {
                let mut quoted = std::string::String::from("\"");
                for c in text.chars() {
                    match c {
                        '"' => quoted.push_str("\\\""),
                        '\\' => quoted.push_str("\\\\"),
                        '\t' => quoted.push_str("\\t"),
                        '\n' => quoted.push_str("\\n"),
                        c => quoted.push(c),
                    }
                }
                quoted.push('"');
                let tokens = tokenize("p", &quoted);
                prop_assert_eq!(tokens[0].kind, String);
                prop_assert_eq!(&tokens[0].value, &text);
            }
        }
    }
}
