//! Abstract Syntax Tree types for nash.
//!
//! These types represent parsed nash source code. The parser produces a
//! [`Tree`], which the shell then evaluates. Every node carries the position
//! of its first token; positions are ignored by `==` so that trees parsed
//! from differently formatted sources compare equal.

use std::fmt;

use crate::lexer::Position;

/// Node position.
///
/// `Pos` values always compare equal, which keeps derived `PartialEq` on
/// nodes structural. Compare [`Pos::line`] and [`Pos::column`] directly when
/// positions matter.
#[derive(Debug, Clone, Copy, Default, Hash)]
pub struct Pos(pub Position);

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Pos(Position::new(line, column))
    }

    pub fn line(&self) -> usize {
        self.0.line
    }

    pub fn column(&self) -> usize {
        self.0.column
    }
}

impl PartialEq for Pos {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Pos {}

impl From<Position> for Pos {
    fn from(p: Position) -> Self {
        Pos(p)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed source file.
///
/// Equality compares the syntax only; the label is ignored.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Label used in diagnostics (usually the file name).
    pub name: String,
    pub root: Block,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Eq for Tree {}

impl Tree {
    pub fn new(name: impl Into<String>, root: Block) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }
}

/// An ordered sequence of statements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub pos: Pos,
    pub nodes: Vec<Node>,
}

impl Block {
    pub fn new(pos: Pos, nodes: Vec<Node>) -> Self {
        Self { pos, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Import(ImportNode),
    Setenv(SetenvNode),
    Assignment(AssignmentNode),
    ExecAssign(ExecAssignNode),
    Command(CommandNode),
    Pipe(PipeNode),
    Rfork(RforkNode),
    Cd(CdNode),
    If(IfNode),
    For(ForNode),
    FnDecl(FnDeclNode),
    FnInv(FnInvNode),
    Return(ReturnNode),
    BindFn(BindFnNode),
    Dump(DumpNode),
    Builtin(BuiltinNode),
    Comment(CommentNode),
}

/// Statement discriminant, used by the printer to decide on blank lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Import,
    Setenv,
    Assignment,
    ExecAssign,
    Command,
    Pipe,
    Rfork,
    Cd,
    If,
    For,
    FnDecl,
    FnInv,
    Return,
    BindFn,
    Dump,
    Builtin,
    Comment,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Import(_) => NodeKind::Import,
            Node::Setenv(_) => NodeKind::Setenv,
            Node::Assignment(_) => NodeKind::Assignment,
            Node::ExecAssign(_) => NodeKind::ExecAssign,
            Node::Command(_) => NodeKind::Command,
            Node::Pipe(_) => NodeKind::Pipe,
            Node::Rfork(_) => NodeKind::Rfork,
            Node::Cd(_) => NodeKind::Cd,
            Node::If(_) => NodeKind::If,
            Node::For(_) => NodeKind::For,
            Node::FnDecl(_) => NodeKind::FnDecl,
            Node::FnInv(_) => NodeKind::FnInv,
            Node::Return(_) => NodeKind::Return,
            Node::BindFn(_) => NodeKind::BindFn,
            Node::Dump(_) => NodeKind::Dump,
            Node::Builtin(_) => NodeKind::Builtin,
            Node::Comment(_) => NodeKind::Comment,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            Node::Import(n) => n.pos,
            Node::Setenv(n) => n.pos,
            Node::Assignment(n) => n.pos,
            Node::ExecAssign(n) => n.pos,
            Node::Command(n) => n.pos,
            Node::Pipe(n) => n.pos,
            Node::Rfork(n) => n.pos,
            Node::Cd(n) => n.pos,
            Node::If(n) => n.pos,
            Node::For(n) => n.pos,
            Node::FnDecl(n) => n.pos,
            Node::FnInv(n) => n.pos,
            Node::Return(n) => n.pos,
            Node::BindFn(n) => n.pos,
            Node::Dump(n) => n.pos,
            Node::Builtin(n) => n.pos,
            Node::Comment(n) => n.pos,
        }
    }
}

/// `import path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNode {
    pub pos: Pos,
    pub path: Expr,
}

/// `setenv NAME`, optionally with an inline assignment or exec-assignment
/// (`setenv NAME = value`, `setenv NAME <= cmd`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetenvNode {
    pub pos: Pos,
    pub name: String,
    pub assign: Option<Box<Node>>,
}

/// An assignment target: `name` or `name[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameNode {
    pub pos: Pos,
    pub ident: String,
    pub index: Option<Expr>,
}

impl NameNode {
    pub fn new(pos: Pos, ident: impl Into<String>) -> Self {
        Self {
            pos,
            ident: ident.into(),
            index: None,
        }
    }
}

/// `a, b = x, y` or `var a = x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNode {
    pub pos: Pos,
    /// True for `var` declarations.
    pub declare: bool,
    pub names: Vec<NameNode>,
    pub values: Vec<Expr>,
}

/// Right-hand side of an exec-assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecSource {
    Command(CommandNode),
    Pipe(PipeNode),
    FnInv(FnInvNode),
}

/// `out <= cmd`, `out, status <= cmd`, `out, err, status <= cmd`,
/// or `a, b <= fn()` for functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecAssignNode {
    pub pos: Pos,
    pub declare: bool,
    pub names: Vec<NameNode>,
    pub source: ExecSource,
}

/// An external command (or a bind to a function).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNode {
    pub pos: Pos,
    /// Command name as written, including a leading `-` ignore marker.
    pub name: String,
    pub args: Vec<Expr>,
    pub redirects: Vec<RedirectNode>,
    /// Written in the parenthesized multi-line form.
    pub multi: bool,
}

impl CommandNode {
    pub fn new(pos: Pos, name: impl Into<String>) -> Self {
        Self {
            pos,
            name: name.into(),
            args: Vec::new(),
            redirects: Vec::new(),
            multi: false,
        }
    }
}

/// `a | b | c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeNode {
    pub pos: Pos,
    pub commands: Vec<CommandNode>,
    pub multi: bool,
}

/// Right-hand side of a redirect map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectRight {
    /// `>[l=r]`
    Fd(u32),
    /// `>[l]`, requires a location.
    NoValue,
    /// `>[l=]`, discards the descriptor.
    Suppress,
}

/// Descriptor remapping written between `>[` and `]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectMap {
    pub left: u32,
    pub right: RedirectRight,
}

/// `> location`, `>[l=r]`, `>[l] location`, `>[l=]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectNode {
    pub pos: Pos,
    pub map: Option<RedirectMap>,
    pub location: Option<Expr>,
}

/// `rfork FLAGS { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RforkNode {
    pub pos: Pos,
    pub flags: String,
    pub body: Block,
}

/// `cd [dir]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdNode {
    pub pos: Pos,
    pub dir: Option<Expr>,
}

/// Comparison operator of an `if`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
        }
    }
}

/// `if l op r { ... } else { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfNode {
    pub pos: Pos,
    pub lvalue: Expr,
    pub op: Comparison,
    pub rvalue: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
    /// The else block holds a single chained `if`.
    pub else_if: bool,
}

/// `for { ... }` or `for x in expr { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForNode {
    pub pos: Pos,
    pub ident: Option<String>,
    pub in_expr: Option<Expr>,
    pub body: Block,
}

/// A formal parameter; only the last one may be variadic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnParam {
    pub name: String,
    pub variadic: bool,
}

impl FnParam {
    pub fn new(name: impl Into<String>, variadic: bool) -> Self {
        Self {
            name: name.into(),
            variadic,
        }
    }
}

impl fmt::Display for FnParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variadic {
            write!(f, "{}...", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// `fn name(a, b...) { ... }`; anonymous when `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnDeclNode {
    pub pos: Pos,
    pub name: Option<String>,
    pub params: Vec<FnParam>,
    pub body: Block,
}

/// What a function invocation calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// `name(...)`
    Name(String),
    /// `$var(...)`
    Var(String),
}

/// `name(args)` or `$var(args)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnInvNode {
    pub pos: Pos,
    pub callee: Callee,
    pub args: Vec<Expr>,
}

/// `return`, `return expr` or `return a, b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnNode {
    pub pos: Pos,
    pub values: Vec<Expr>,
}

/// `bindfn fn cmd`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindFnNode {
    pub pos: Pos,
    pub fn_name: String,
    pub cmd_name: String,
}

/// `dump [file]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpNode {
    pub pos: Pos,
    pub file: Option<Expr>,
}

/// `builtin stmt`, invoking `stmt` without consulting binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinNode {
    pub pos: Pos,
    pub stmt: Box<Node>,
}

/// `# text`, kept for the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub pos: Pos,
    pub text: String,
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    String(StringExpr),
    Int(IntExpr),
    Var(VarExpr),
    List(ListExpr),
    Concat(ConcatExpr),
    Index(IndexExpr),
    FnInv(FnInvNode),
    /// `expr...`, spreading a list in place.
    Spread(SpreadExpr),
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::String(e) => e.pos,
            Expr::Int(e) => e.pos,
            Expr::Var(e) => e.pos,
            Expr::List(e) => e.pos,
            Expr::Concat(e) => e.pos,
            Expr::Index(e) => e.pos,
            Expr::FnInv(e) => e.pos,
            Expr::Spread(e) => e.pos,
        }
    }

    /// Unquoted string literal.
    pub fn word(pos: Pos, value: impl Into<String>) -> Self {
        Expr::String(StringExpr {
            pos,
            value: value.into(),
            quoted: false,
        })
    }

    /// Quoted string literal.
    pub fn quoted(pos: Pos, value: impl Into<String>) -> Self {
        Expr::String(StringExpr {
            pos,
            value: value.into(),
            quoted: true,
        })
    }

    pub fn var(pos: Pos, name: impl Into<String>) -> Self {
        Expr::Var(VarExpr {
            pos,
            name: name.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringExpr {
    pub pos: Pos,
    pub value: String,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntExpr {
    pub pos: Pos,
    /// Digits as written.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarExpr {
    pub pos: Pos,
    /// Name without the leading `$`.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListExpr {
    pub pos: Pos,
    pub elems: Vec<Expr>,
}

/// `a+b+c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatExpr {
    pub pos: Pos,
    pub parts: Vec<Expr>,
}

/// `$var[index]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexExpr {
    pub pos: Pos,
    pub var: VarExpr,
    pub index: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadExpr {
    pub pos: Pos,
    pub expr: Box<Expr>,
}
