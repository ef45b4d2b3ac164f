//! Parser for nash source code.
//!
//! Transforms the token stream from the [`Scanner`] into a [`Tree`].
//! Recursive descent with a small lookahead buffer; statements are
//! dispatched on their first token.
//!
//! Two failure kinds are distinguishable from plain syntax errors so that an
//! interactive front end can keep reading: an open `{` at end of input
//! ([`ParseError::UnfinishedBlock`]) and an open `(` at end of input
//! ([`ParseError::UnfinishedList`]).

use std::collections::VecDeque;

use crate::ast::*;
use crate::lexer::{Position, Scanner, Token, TokenKind};

/// A parse failure. Messages are prefixed with `file:line:column:`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    UnfinishedBlock(String),
    #[error("{0}")]
    UnfinishedList(String),
}

impl ParseError {
    /// True when more input could complete the source.
    pub fn is_unfinished(&self) -> bool {
        matches!(self, ParseError::UnfinishedBlock(_) | ParseError::UnfinishedList(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax(m) | ParseError::UnfinishedBlock(m) | ParseError::UnfinishedList(m) => m,
        }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Parse a complete source text.
pub fn parse(name: &str, source: &str) -> Result<Tree, ParseError> {
    Parser::new(name, source).parse()
}

/// Where a command is being parsed; parenthesized commands may span lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandMode {
    Line,
    Multi,
}

pub struct Parser<'src> {
    name: String,
    scanner: Scanner<'src>,
    lookahead: VecDeque<Token>,
    last_pos: Position,
}

impl<'src> Parser<'src> {
    pub fn new(name: impl Into<String>, source: &'src str) -> Self {
        let name = name.into();
        Self {
            scanner: Scanner::new(name.clone(), source),
            name,
            lookahead: VecDeque::new(),
            last_pos: Position::new(1, 1),
        }
    }

    /// Parse the whole input into a tree.
    pub fn parse(mut self) -> Result<Tree, ParseError> {
        let root = self.block(0)?;
        Ok(Tree::new(self.name, root))
    }

    // ── token plumbing ──────────────────────────────────────────────────

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() <= n {
            match self.scanner.next() {
                Some(token) => {
                    self.last_pos = token.pos;
                    self.lookahead.push_back(token);
                }
                None => {
                    let eof = Token {
                        kind: TokenKind::Eof,
                        value: String::new(),
                        pos: self.last_pos,
                        adjacent: false,
                    };
                    self.lookahead.push_back(eof);
                }
            }
        }
    }

    fn peek(&mut self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&mut self, n: usize) -> &Token {
        self.fill(n);
        &self.lookahead[n]
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&mut self, n: usize) -> TokenKind {
        self.peek_at(n).kind
    }

    fn next(&mut self) -> Token {
        self.fill(0);
        match self.lookahead.pop_front() {
            Some(token) => token,
            None => Token {
                kind: TokenKind::Eof,
                value: String::new(),
                pos: self.last_pos,
                adjacent: false,
            },
        }
    }

    fn error(&self, pos: Position, message: impl AsRef<str>) -> ParseError {
        ParseError::Syntax(format!(
            "{}:{}:{}: {}",
            self.name,
            pos.line,
            pos.column,
            message.as_ref()
        ))
    }

    fn unexpected(&self, token: &Token, expecting: &str) -> ParseError {
        match token.kind {
            TokenKind::Illegal => ParseError::Syntax(token.value.clone()),
            TokenKind::Eof => self.error(token.pos, format!("Unexpected EOF. Expecting {expecting}")),
            _ => self.error(
                token.pos,
                format!("Unexpected token {}. Expecting {expecting}", describe(token)),
            ),
        }
    }

    fn unfinished_block(&self, token: &Token) -> ParseError {
        if token.kind == TokenKind::Illegal {
            return ParseError::Syntax(token.value.clone());
        }
        ParseError::UnfinishedBlock(format!(
            "{}:{}:{}: Statement's block '{{' not finished",
            self.name, token.pos.line, token.pos.column
        ))
    }

    fn unfinished_list(&self, token: &Token) -> ParseError {
        if token.kind == TokenKind::Illegal {
            return ParseError::Syntax(token.value.clone());
        }
        ParseError::UnfinishedList(format!(
            "{}:{}:{}: List not finished",
            self.name, token.pos.line, token.pos.column
        ))
    }

    fn expect(&mut self, kind: TokenKind, expecting: &str) -> PResult<Token> {
        let token = self.next();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.unexpected(&token, expecting))
        }
    }

    /// Skip newlines and comments inside parenthesized constructs.
    fn skip_layout(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Comment) {
            self.next();
        }
    }

    /// Consume an open paren's closing `)`, reporting EOF as unfinished.
    fn close_paren(&mut self, expecting: &str) -> PResult<()> {
        let token = self.next();
        match token.kind {
            TokenKind::RParen => Ok(()),
            TokenKind::Eof | TokenKind::Illegal => Err(self.unfinished_list(&token)),
            _ => Err(self.unexpected(&token, expecting)),
        }
    }

    // ── blocks and statements ───────────────────────────────────────────

    fn block(&mut self, depth: usize) -> PResult<Block> {
        let pos = self.peek().pos.into();
        let mut nodes = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.next();
                }
                TokenKind::Eof | TokenKind::Illegal if depth > 0 => {
                    let token = self.next();
                    return Err(self.unfinished_block(&token));
                }
                TokenKind::Eof => return Ok(Block::new(pos, nodes)),
                TokenKind::RBrace if depth > 0 => {
                    self.next();
                    return Ok(Block::new(pos, nodes));
                }
                _ => {
                    let node = self.statement()?;
                    nodes.push(node);
                    self.statement_end()?;
                }
            }
        }
    }

    fn statement_end(&mut self) -> PResult<()> {
        match self.peek_kind() {
            TokenKind::Newline
            | TokenKind::Semicolon
            | TokenKind::RBrace
            | TokenKind::Eof
            | TokenKind::Comment => Ok(()),
            _ => {
                let token = self.next();
                Err(self.unexpected(&token, "end of statement"))
            }
        }
    }

    /// `{ ... }`
    fn braced_block(&mut self) -> PResult<Block> {
        let token = self.next();
        match token.kind {
            TokenKind::LBrace => self.block(1),
            TokenKind::Eof => Err(self.unfinished_block(&token)),
            _ => Err(self.unexpected(&token, "'{'")),
        }
    }

    fn statement(&mut self) -> PResult<Node> {
        let kind = self.peek_kind();
        match kind {
            TokenKind::Comment => {
                let token = self.next();
                Ok(Node::Comment(CommentNode {
                    pos: token.pos.into(),
                    text: token.value,
                }))
            }
            TokenKind::Import => self.import(),
            TokenKind::Setenv => self.setenv(),
            TokenKind::Var => self.var_decl(),
            TokenKind::Rfork => self.rfork(),
            TokenKind::Cd => self.cd().map(Node::Cd),
            TokenKind::If => self.if_stmt().map(Node::If),
            TokenKind::For => self.for_stmt(),
            TokenKind::Fn => self.fn_decl().map(Node::FnDecl),
            TokenKind::Return => self.return_stmt(),
            TokenKind::BindFn => self.bindfn(),
            TokenKind::Dump => self.dump(),
            TokenKind::Builtin => self.builtin(),
            TokenKind::LParen => self.multi_command().map(|source| match source {
                ExecSource::Pipe(p) => Node::Pipe(p),
                ExecSource::Command(c) => Node::Command(c),
                ExecSource::FnInv(inv) => Node::FnInv(inv),
            }),
            TokenKind::Variable => {
                if self.peek_kind_at(1) == TokenKind::LParen && self.peek_at(1).adjacent {
                    self.fn_inv().map(Node::FnInv)
                } else {
                    let token = self.next();
                    Err(self.unexpected(&token, "statement"))
                }
            }
            TokenKind::Ident => self.ident_statement(),
            TokenKind::Arg | TokenKind::Number => self.command_or_pipe(CommandMode::Line),
            _ => {
                let token = self.next();
                Err(self.unexpected(&token, "statement"))
            }
        }
    }

    /// A statement starting with an identifier: assignment, exec-assignment,
    /// function invocation or command.
    fn ident_statement(&mut self) -> PResult<Node> {
        let next = self.peek_kind_at(1);
        let next_adjacent = self.peek_at(1).adjacent;
        match next {
            TokenKind::Assign | TokenKind::Comma | TokenKind::AssignCmd => self.assignment(false),
            TokenKind::LBrack if next_adjacent => self.assignment(false),
            TokenKind::LParen if next_adjacent => self.fn_inv().map(Node::FnInv),
            _ => self.command_or_pipe(CommandMode::Line),
        }
    }

    fn import(&mut self) -> PResult<Node> {
        let token = self.next();
        if is_statement_end(self.peek_kind()) {
            let next = self.next();
            return Err(self.unexpected(&next, "import path"));
        }
        let path = self.arg_expr()?;
        Ok(Node::Import(ImportNode {
            pos: token.pos.into(),
            path,
        }))
    }

    fn setenv(&mut self) -> PResult<Node> {
        let token = self.next();
        let name_token = self.peek().clone();
        if name_token.kind != TokenKind::Ident {
            self.next();
            return Err(self.unexpected(&name_token, "variable name"));
        }

        let assign = match self.peek_kind_at(1) {
            TokenKind::Assign | TokenKind::AssignCmd => Some(Box::new(self.assignment(false)?)),
            _ => {
                self.next();
                None
            }
        };

        Ok(Node::Setenv(SetenvNode {
            pos: token.pos.into(),
            name: name_token.value,
            assign,
        }))
    }

    fn var_decl(&mut self) -> PResult<Node> {
        self.next();
        self.assignment(true)
    }

    fn names(&mut self) -> PResult<Vec<NameNode>> {
        let mut names = Vec::new();
        loop {
            let token = self.next();
            if token.kind != TokenKind::Ident {
                return Err(self.unexpected(&token, "variable name"));
            }
            let mut name = NameNode::new(token.pos.into(), token.value);
            if self.peek_kind() == TokenKind::LBrack && self.peek().adjacent {
                self.next();
                name.index = Some(self.index_expr()?);
                self.expect(TokenKind::RBrack, "']'")?;
            }
            names.push(name);

            if self.peek_kind() == TokenKind::Comma {
                self.next();
                continue;
            }
            return Ok(names);
        }
    }

    fn assignment(&mut self, declare: bool) -> PResult<Node> {
        let pos: Pos = self.peek().pos.into();
        let names = self.names()?;
        let op = self.next();

        match op.kind {
            TokenKind::Assign => {
                let mut values = vec![self.value_expr()?];
                while self.peek_kind() == TokenKind::Comma {
                    self.next();
                    values.push(self.value_expr()?);
                }
                if values.len() != names.len() && !(names.len() > 1 && values.len() == 1) {
                    return Err(self.error(
                        pos.0,
                        format!(
                            "Assignment has {} variables but {} values",
                            names.len(),
                            values.len()
                        ),
                    ));
                }
                Ok(Node::Assignment(AssignmentNode {
                    pos,
                    declare,
                    names,
                    values,
                }))
            }
            TokenKind::AssignCmd => {
                let source = self.exec_source()?;
                if !matches!(source, ExecSource::FnInv(_)) && names.len() > 3 {
                    return Err(self.error(
                        pos.0,
                        format!(
                            "Exec assignment expects 1, 2 or 3 variables but got {}",
                            names.len()
                        ),
                    ));
                }
                Ok(Node::ExecAssign(ExecAssignNode {
                    pos,
                    declare,
                    names,
                    source,
                }))
            }
            _ => Err(self.unexpected(&op, "'=' or '<='")),
        }
    }

    fn exec_source(&mut self) -> PResult<ExecSource> {
        let kind = self.peek_kind();
        let callable = matches!(kind, TokenKind::Ident | TokenKind::Variable)
            && self.peek_kind_at(1) == TokenKind::LParen
            && self.peek_at(1).adjacent;

        if callable {
            return self.fn_inv().map(ExecSource::FnInv);
        }
        match kind {
            TokenKind::LParen => self.multi_command(),
            k if k.is_word() => match self.command_or_pipe(CommandMode::Line)? {
                Node::Command(c) => Ok(ExecSource::Command(c)),
                Node::Pipe(p) => Ok(ExecSource::Pipe(p)),
                other => Err(self.error(other.pos().0, "Invalid exec-assignment source")),
            },
            _ => {
                let token = self.next();
                Err(self.unexpected(&token, "command or function invocation"))
            }
        }
    }

    // ── commands ────────────────────────────────────────────────────────

    fn command_or_pipe(&mut self, mode: CommandMode) -> PResult<Node> {
        let first = self.command(mode)?;
        if self.peek_kind() != TokenKind::Pipe {
            return Ok(Node::Command(first));
        }

        let pos = first.pos;
        let mut commands = vec![first];
        while self.peek_kind() == TokenKind::Pipe {
            self.next();
            self.skip_layout();
            commands.push(self.command(mode)?);
        }
        Ok(Node::Pipe(PipeNode {
            pos,
            commands,
            multi: mode == CommandMode::Multi,
        }))
    }

    fn command(&mut self, mode: CommandMode) -> PResult<CommandNode> {
        let token = self.next();
        if !token.kind.is_word() {
            return Err(self.unexpected(&token, "command name"));
        }

        let mut cmd = CommandNode::new(token.pos.into(), token.value);
        cmd.multi = mode == CommandMode::Multi;

        loop {
            if mode == CommandMode::Multi {
                self.skip_layout();
            }
            match self.peek_kind() {
                TokenKind::Gt => cmd.redirects.push(self.redirect()?),
                kind if is_statement_end(kind) || kind == TokenKind::Pipe || kind == TokenKind::RParen => {
                    return Ok(cmd);
                }
                _ => cmd.args.push(self.arg_expr()?),
            }
        }
    }

    /// `( cmd args... [| cmd args...] )` spanning several lines.
    fn multi_command(&mut self) -> PResult<ExecSource> {
        self.next();
        self.skip_layout();
        if self.peek_kind() == TokenKind::Eof {
            let token = self.next();
            return Err(self.unfinished_list(&token));
        }
        let node = self.command_or_pipe(CommandMode::Multi)?;
        self.skip_layout();
        self.close_paren("')'")?;
        match node {
            Node::Command(c) => Ok(ExecSource::Command(c)),
            Node::Pipe(p) => Ok(ExecSource::Pipe(p)),
            other => Err(self.error(other.pos().0, "Invalid multi-line command")),
        }
    }

    fn redirect(&mut self) -> PResult<RedirectNode> {
        let gt = self.next();
        let mut node = RedirectNode {
            pos: gt.pos.into(),
            map: None,
            location: None,
        };

        if self.peek_kind() == TokenKind::LBrack && self.peek().adjacent {
            self.next();
            let spec = self.next();
            if !matches!(spec.kind, TokenKind::Number | TokenKind::Arg) {
                return Err(self.unexpected(&spec, "redirect map"));
            }
            node.map = Some(self.redirect_map(&spec)?);
            self.expect(TokenKind::RBrack, "']'")?;
        }

        let kind = self.peek_kind();
        if !is_statement_end(kind) && !matches!(kind, TokenKind::Pipe | TokenKind::Gt | TokenKind::RParen) {
            node.location = Some(self.arg_expr()?);
        }

        match (&node.map, &node.location) {
            (None, None) => Err(self.error(gt.pos, "Missing redirect location")),
            (Some(RedirectMap { right: RedirectRight::NoValue, .. }), None) => {
                Err(self.error(gt.pos, "Redirect map without location"))
            }
            _ => Ok(node),
        }
    }

    fn redirect_map(&self, spec: &Token) -> PResult<RedirectMap> {
        let invalid = || self.error(spec.pos, format!("Invalid redirect map '{}'", spec.value));
        let parse_fd = |s: &str| s.parse::<u32>().map_err(|_| invalid());

        match spec.value.split_once('=') {
            None => Ok(RedirectMap {
                left: parse_fd(&spec.value)?,
                right: RedirectRight::NoValue,
            }),
            Some((left, "")) => Ok(RedirectMap {
                left: parse_fd(left)?,
                right: RedirectRight::Suppress,
            }),
            Some((left, right)) => Ok(RedirectMap {
                left: parse_fd(left)?,
                right: RedirectRight::Fd(parse_fd(right)?),
            }),
        }
    }

    // ── compound statements ─────────────────────────────────────────────

    fn rfork(&mut self) -> PResult<Node> {
        let token = self.next();
        let flags = self.next();
        if !matches!(flags.kind, TokenKind::Ident | TokenKind::Arg) {
            return Err(self.unexpected(&flags, "rfork flags"));
        }
        let body = self.braced_block()?;
        Ok(Node::Rfork(RforkNode {
            pos: token.pos.into(),
            flags: flags.value,
            body,
        }))
    }

    fn cd(&mut self) -> PResult<CdNode> {
        let token = self.next();
        let dir = if is_statement_end(self.peek_kind()) {
            None
        } else {
            Some(self.arg_expr()?)
        };
        Ok(CdNode {
            pos: token.pos.into(),
            dir,
        })
    }

    fn if_stmt(&mut self) -> PResult<IfNode> {
        let token = self.next();
        let lvalue = self.arg_expr()?;
        let op_token = self.next();
        let op = match op_token.kind {
            TokenKind::Equal => Comparison::Equal,
            TokenKind::NotEqual => Comparison::NotEqual,
            _ => return Err(self.unexpected(&op_token, "'==' or '!='")),
        };
        let rvalue = self.arg_expr()?;
        let then_block = self.braced_block()?;

        let mut node = IfNode {
            pos: token.pos.into(),
            lvalue,
            op,
            rvalue,
            then_block,
            else_block: None,
            else_if: false,
        };

        if self.peek_kind() == TokenKind::Else {
            self.next();
            if self.peek_kind() == TokenKind::If {
                let pos = self.peek().pos.into();
                let chained = self.if_stmt()?;
                node.else_block = Some(Block::new(pos, vec![Node::If(chained)]));
                node.else_if = true;
            } else {
                node.else_block = Some(self.braced_block()?);
            }
        }
        Ok(node)
    }

    fn for_stmt(&mut self) -> PResult<Node> {
        let token = self.next();
        let mut node = ForNode {
            pos: token.pos.into(),
            ident: None,
            in_expr: None,
            body: Block::default(),
        };

        if self.peek_kind() != TokenKind::LBrace {
            let ident = self.next();
            if ident.kind != TokenKind::Ident {
                return Err(self.unexpected(&ident, "identifier"));
            }
            self.expect(TokenKind::In, "'in'")?;
            node.ident = Some(ident.value);
            node.in_expr = Some(self.arg_expr()?);
        }

        node.body = self.braced_block()?;
        Ok(Node::For(node))
    }

    fn fn_decl(&mut self) -> PResult<FnDeclNode> {
        let token = self.next();
        let name = if self.peek_kind() == TokenKind::Ident {
            Some(self.next().value)
        } else {
            None
        };

        let open = self.next();
        if open.kind != TokenKind::LParen {
            return Err(self.unexpected(&open, "'('"));
        }

        let mut params: Vec<FnParam> = Vec::new();
        loop {
            self.skip_layout();
            match self.peek_kind() {
                TokenKind::RParen => {
                    self.next();
                    break;
                }
                TokenKind::Comma if !params.is_empty() => {
                    self.next();
                }
                TokenKind::Eof => {
                    let eof = self.next();
                    return Err(self.unfinished_list(&eof));
                }
                TokenKind::Ident => {
                    let param = self.next();
                    if let Some(last) = params.last() {
                        if last.variadic {
                            return Err(self.error(
                                param.pos,
                                format!("Vararg '{}...' isn't the last argument", last.name),
                            ));
                        }
                    }
                    let variadic = self.peek_kind() == TokenKind::Dotdotdot;
                    if variadic {
                        self.next();
                    }
                    params.push(FnParam::new(param.value, variadic));
                }
                _ => {
                    let bad = self.next();
                    return Err(self.unexpected(&bad, "parameter name"));
                }
            }
        }

        let body = self.braced_block()?;
        Ok(FnDeclNode {
            pos: token.pos.into(),
            name,
            params,
            body,
        })
    }

    fn fn_inv(&mut self) -> PResult<FnInvNode> {
        let token = self.next();
        let callee = match token.kind {
            TokenKind::Variable => Callee::Var(token.value),
            _ => Callee::Name(token.value),
        };
        self.expect(TokenKind::LParen, "'('")?;

        let mut args = Vec::new();
        loop {
            self.skip_layout();
            match self.peek_kind() {
                TokenKind::RParen => {
                    self.next();
                    break;
                }
                TokenKind::Eof | TokenKind::Illegal => {
                    let eof = self.next();
                    return Err(self.unfinished_list(&eof));
                }
                TokenKind::Comma if !args.is_empty() => {
                    self.next();
                }
                _ => args.push(self.value_expr()?),
            }
        }

        Ok(FnInvNode {
            pos: token.pos.into(),
            callee,
            args,
        })
    }

    fn return_stmt(&mut self) -> PResult<Node> {
        let token = self.next();
        let mut values = Vec::new();
        if !is_statement_end(self.peek_kind()) {
            values.push(self.value_expr()?);
            while self.peek_kind() == TokenKind::Comma {
                self.next();
                values.push(self.value_expr()?);
            }
        }
        Ok(Node::Return(ReturnNode {
            pos: token.pos.into(),
            values,
        }))
    }

    fn bindfn(&mut self) -> PResult<Node> {
        let token = self.next();
        let fn_name = self.next();
        if fn_name.kind != TokenKind::Ident {
            return Err(self.unexpected(&fn_name, "function name"));
        }
        let cmd_name = self.next();
        if !cmd_name.kind.is_word() {
            return Err(self.unexpected(&cmd_name, "command name"));
        }
        Ok(Node::BindFn(BindFnNode {
            pos: token.pos.into(),
            fn_name: fn_name.value,
            cmd_name: cmd_name.value,
        }))
    }

    fn dump(&mut self) -> PResult<Node> {
        let token = self.next();
        let file = if is_statement_end(self.peek_kind()) {
            None
        } else {
            Some(self.arg_expr()?)
        };
        Ok(Node::Dump(DumpNode {
            pos: token.pos.into(),
            file,
        }))
    }

    fn builtin(&mut self) -> PResult<Node> {
        let token = self.next();
        if self.peek_kind() != TokenKind::Cd {
            let bad = self.next();
            return Err(self.error(
                bad.pos,
                format!("'builtin' only supports 'cd', found {}", describe(&bad)),
            ));
        }
        let cd = self.cd()?;
        Ok(Node::Builtin(BuiltinNode {
            pos: token.pos.into(),
            stmt: Box::new(Node::Cd(cd)),
        }))
    }

    // ── expressions ─────────────────────────────────────────────────────

    /// Right-hand side of `=`, function argument or return value.
    fn value_expr(&mut self) -> PResult<Expr> {
        if is_statement_end(self.peek_kind()) {
            let token = self.next();
            return Err(self.unexpected(&token, "expression"));
        }
        self.arg_expr()
    }

    /// A single argument: primary expression with optional spread and
    /// `+` concatenation.
    fn arg_expr(&mut self) -> PResult<Expr> {
        let first = self.spread_expr()?;
        if self.peek_kind() != TokenKind::Plus {
            return Ok(first);
        }

        let pos = first.pos();
        let mut parts = vec![first];
        while self.peek_kind() == TokenKind::Plus {
            self.next();
            parts.push(self.primary_expr()?);
        }
        Ok(Expr::Concat(ConcatExpr { pos, parts }))
    }

    fn spread_expr(&mut self) -> PResult<Expr> {
        let expr = self.primary_expr()?;
        if self.peek_kind() == TokenKind::Dotdotdot && self.peek().adjacent {
            self.next();
            return Ok(Expr::Spread(SpreadExpr {
                pos: expr.pos(),
                expr: Box::new(expr),
            }));
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> PResult<Expr> {
        let kind = self.peek_kind();
        let callable = matches!(kind, TokenKind::Ident | TokenKind::Variable)
            && self.peek_kind_at(1) == TokenKind::LParen
            && self.peek_at(1).adjacent;
        if callable {
            return self.fn_inv().map(Expr::FnInv);
        }

        let token = self.next();
        let pos: Pos = token.pos.into();
        match token.kind {
            TokenKind::String => Ok(Expr::quoted(pos, token.value)),
            TokenKind::Number => Ok(Expr::Int(IntExpr {
                pos,
                value: token.value,
            })),
            TokenKind::Variable => {
                let var = VarExpr {
                    pos,
                    name: token.value,
                };
                if self.peek_kind() == TokenKind::LBrack && self.peek().adjacent {
                    self.next();
                    let index = self.index_expr()?;
                    self.expect(TokenKind::RBrack, "']'")?;
                    return Ok(Expr::Index(IndexExpr {
                        pos,
                        var,
                        index: Box::new(index),
                    }));
                }
                Ok(Expr::Var(var))
            }
            TokenKind::LParen => self.list_expr(pos),
            TokenKind::Assign | TokenKind::Equal | TokenKind::Dotdotdot => {
                Ok(Expr::word(pos, token.value))
            }
            k if k.is_word() => Ok(Expr::word(pos, token.value)),
            _ => Err(self.unexpected(&token, "argument")),
        }
    }

    fn index_expr(&mut self) -> PResult<Expr> {
        let token = self.next();
        let pos = token.pos.into();
        match token.kind {
            TokenKind::Number => Ok(Expr::Int(IntExpr {
                pos,
                value: token.value,
            })),
            TokenKind::Variable => Ok(Expr::var(pos, token.value)),
            _ => Err(self.unexpected(&token, "index (number or variable)")),
        }
    }

    /// `( elem elem ... )`, the opening paren already consumed.
    fn list_expr(&mut self, pos: Pos) -> PResult<Expr> {
        let mut elems = Vec::new();
        loop {
            self.skip_layout();
            match self.peek_kind() {
                TokenKind::RParen => {
                    self.next();
                    return Ok(Expr::List(ListExpr { pos, elems }));
                }
                TokenKind::Eof | TokenKind::Illegal => {
                    let token = self.next();
                    return Err(self.unfinished_list(&token));
                }
                _ => elems.push(self.arg_expr()?),
            }
        }
    }
}

fn is_statement_end(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Newline
            | TokenKind::Semicolon
            | TokenKind::RBrace
            | TokenKind::Eof
            | TokenKind::Comment
            | TokenKind::Illegal
    )
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Newline => "newline".to_string(),
        TokenKind::Eof => "EOF".to_string(),
        TokenKind::String => format!("\"{}\"", token.value),
        TokenKind::Variable => format!("${}", token.value),
        _ => format!("'{}'", token.value),
    }
}
