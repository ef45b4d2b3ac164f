//! Pretty printer.
//!
//! Every node implements `Display`, producing source that parses back to an
//! equal tree. Layout follows a few rules:
//!
//! - nested blocks are indented with one tab per level;
//! - a blank line separates statements of different kinds and follows every
//!   function declaration;
//! - a leading `#!` comment is followed by a blank line;
//! - runs of assignments align their `=` on the longest left-hand side;
//! - commands and pipes written in the parenthesized form stay parenthesized,
//!   and break over several lines once they reach 50 columns.

use std::fmt;

use super::types::*;

const MULTILINE_WIDTH: usize = 50;

/// Quote a string value, escaping what the scanner would unescape.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn indent(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("\t{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_body(f: &mut fmt::Formatter<'_>, header: &str, block: &Block) -> fmt::Result {
    if block.is_empty() {
        write!(f, "{header} {{\n}}")
    } else {
        write!(f, "{header} {{\n{}\n}}", indent(&block.to_string()))
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn names_string(declare: bool, names: &[NameNode]) -> String {
    let lhs = join(names, ", ");
    if declare { format!("var {lhs}") } else { lhs }
}

/// `=` columns for runs of consecutive assignments.
fn assignment_widths(nodes: &[Node]) -> Vec<usize> {
    let mut widths = vec![0; nodes.len()];
    let mut i = 0;
    while i < nodes.len() {
        if !matches!(nodes[i], Node::Assignment(_)) {
            i += 1;
            continue;
        }
        let start = i;
        let mut width = 0;
        while let Some(Node::Assignment(a)) = nodes.get(i) {
            width = width.max(names_string(a.declare, &a.names).chars().count() + 1);
            i += 1;
        }
        for w in &mut widths[start..i] {
            *w = width;
        }
    }
    widths
}

fn format_assignment(node: &AssignmentNode, width: usize) -> String {
    let lhs = names_string(node.declare, &node.names);
    let len = lhs.chars().count();
    let values = join(&node.values, ", ");
    if width > len + 1 {
        format!("{lhs}{}= {values}", " ".repeat(width - len))
    } else {
        format!("{lhs} = {values}")
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = &self.nodes;
        let widths = assignment_widths(nodes);
        let mut parts = Vec::with_capacity(nodes.len());

        for (i, node) in nodes.iter().enumerate() {
            let mut text = match node {
                Node::Assignment(a) => format_assignment(a, widths[i]),
                other => other.to_string(),
            };

            let blank_after = match (node, nodes.get(i + 1)) {
                (Node::Comment(c), _) if i == 0 && c.text.starts_with("#!") => true,
                (Node::Comment(c), Some(Node::Comment(next))) => {
                    next.pos.line() > c.pos.line() + 1
                }
                (Node::Comment(_), _) => false,
                (_, Some(next)) => {
                    node.kind() != next.kind() || node.kind() == NodeKind::FnDecl
                }
                (_, None) => false,
            };
            if blank_after {
                text.push('\n');
            }
            parts.push(text);
        }

        f.write_str(&parts.join("\n"))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Import(n) => write!(f, "import {}", n.path),
            Node::Setenv(n) => match &n.assign {
                Some(assign) => write!(f, "setenv {assign}"),
                None => write!(f, "setenv {}", n.name),
            },
            Node::Assignment(n) => n.fmt(f),
            Node::ExecAssign(n) => n.fmt(f),
            Node::Command(n) => n.fmt(f),
            Node::Pipe(n) => n.fmt(f),
            Node::Rfork(n) => write_body(f, &format!("rfork {}", n.flags), &n.body),
            Node::Cd(n) => match &n.dir {
                Some(dir) => write!(f, "cd {dir}"),
                None => f.write_str("cd"),
            },
            Node::If(n) => n.fmt(f),
            Node::For(n) => n.fmt(f),
            Node::FnDecl(n) => n.fmt(f),
            Node::FnInv(n) => n.fmt(f),
            Node::Return(n) => {
                if n.values.is_empty() {
                    f.write_str("return")
                } else {
                    write!(f, "return {}", join(&n.values, ", "))
                }
            }
            Node::BindFn(n) => write!(f, "bindfn {} {}", n.fn_name, n.cmd_name),
            Node::Dump(n) => match &n.file {
                Some(file) => write!(f, "dump {file}"),
                None => f.write_str("dump"),
            },
            Node::Builtin(n) => write!(f, "builtin {}", n.stmt),
            Node::Comment(n) => f.write_str(&n.text),
        }
    }
}

impl fmt::Display for NameNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            Some(index) => write!(f, "{}[{}]", self.ident, index),
            None => f.write_str(&self.ident),
        }
    }
}

impl fmt::Display for AssignmentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_assignment(self, 0))
    }
}

impl fmt::Display for ExecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecSource::Command(c) => c.fmt(f),
            ExecSource::Pipe(p) => p.fmt(f),
            ExecSource::FnInv(inv) => inv.fmt(f),
        }
    }
}

impl fmt::Display for ExecAssignNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <= {}", names_string(self.declare, &self.names), self.source)
    }
}

impl CommandNode {
    /// Name, arguments and redirects, with each flag kept next to its value.
    fn groups(&self) -> Vec<String> {
        let words: Vec<String> = self
            .args
            .iter()
            .map(|a| a.to_string())
            .chain(self.redirects.iter().map(|r| r.to_string()))
            .collect();

        let mut groups = vec![self.name.clone()];
        let mut iter = words.into_iter().peekable();
        while let Some(word) = iter.next() {
            let pairs_with_next = word.starts_with('-')
                && iter.peek().is_some_and(|next| !next.starts_with('-'));
            if pairs_with_next {
                let value = iter.next().unwrap_or_default();
                groups.push(format!("{word} {value}"));
            } else {
                groups.push(word);
            }
        }
        groups
    }

    fn single_line(&self) -> String {
        self.groups().join(" ")
    }

    fn multi_lines(&self) -> String {
        let groups = self.groups();
        let mut out = String::new();
        for (i, group) in groups.iter().enumerate() {
            if i == 0 {
                out.push('\t');
            } else {
                out.push_str("\n\t\t");
            }
            out.push_str(group);
        }
        out
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.single_line();
        if !self.multi {
            return f.write_str(&line);
        }
        if line.chars().count() < MULTILINE_WIDTH {
            write!(f, "({line})")
        } else {
            write!(f, "(\n{}\n)", self.multi_lines())
        }
    }
}

impl fmt::Display for PipeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self
            .commands
            .iter()
            .map(|c| c.single_line())
            .collect::<Vec<_>>()
            .join(" | ");
        if !self.multi {
            return f.write_str(&line);
        }
        if line.chars().count() < MULTILINE_WIDTH {
            return write!(f, "({line})");
        }
        let body = self
            .commands
            .iter()
            .map(|c| c.multi_lines())
            .collect::<Vec<_>>()
            .join(" |\n");
        write!(f, "(\n{body}\n)")
    }
}

impl fmt::Display for RedirectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = match self.map {
            None => ">".to_string(),
            Some(RedirectMap { left, right }) => match right {
                RedirectRight::Fd(r) => format!(">[{left}={r}]"),
                RedirectRight::NoValue => format!(">[{left}]"),
                RedirectRight::Suppress => format!(">[{left}=]"),
            },
        };
        if let Some(location) = &self.location {
            out.push(' ');
            out.push_str(&location.to_string());
        }
        f.write_str(&out)
    }
}

impl fmt::Display for IfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = format!("if {} {} {}", self.lvalue, self.op.as_str(), self.rvalue);
        write_body(f, &header, &self.then_block)?;

        if let Some(else_block) = &self.else_block {
            if self.else_if {
                write!(f, " else {else_block}")?;
            } else {
                f.write_str(" ")?;
                write_body(f, "else", else_block)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ForNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = match (&self.ident, &self.in_expr) {
            (Some(ident), Some(expr)) => format!("for {ident} in {expr}"),
            _ => "for".to_string(),
        };
        write_body(f, &header, &self.body)
    }
}

impl fmt::Display for FnDeclNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = join(&self.params, ", ");
        let header = match &self.name {
            Some(name) => format!("fn {name}({params})"),
            None => format!("fn({params})"),
        };
        write_body(f, &header, &self.body)
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Name(name) => f.write_str(name),
            Callee::Var(name) => write!(f, "${name}"),
        }
    }
}

impl fmt::Display for FnInvNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.callee, join(&self.args, ", "))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::String(s) => {
                if s.quoted {
                    f.write_str(&quote(&s.value))
                } else {
                    f.write_str(&s.value)
                }
            }
            Expr::Int(i) => f.write_str(&i.value),
            Expr::Var(v) => v.fmt(f),
            Expr::List(l) => write!(f, "({})", join(&l.elems, " ")),
            Expr::Concat(c) => f.write_str(&join(&c.parts, "+")),
            Expr::Index(i) => write!(f, "{}[{}]", i.var, i.index),
            Expr::FnInv(inv) => inv.fmt(f),
            Expr::Spread(s) => write!(f, "{}...", s.expr),
        }
    }
}

impl fmt::Display for VarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name)
    }
}
