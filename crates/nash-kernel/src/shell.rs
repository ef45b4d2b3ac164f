//! The shell: evaluator and host API.
//!
//! A [`Shell`] owns the root scope, the exported environment, the current
//! standard streams and the interrupt flag. Statements run sequentially on
//! one task; the only concurrency is external processes and the tasks that
//! copy their output into buffers.
//!
//! ```ignore
//! let shell = Shell::new(ShellConfig::from_env());
//! shell.exec("inline", "echo hello").await?;
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ast::{
    AssignmentNode, BindFnNode, Block, Callee, CdNode, CommandNode, Comparison, DumpNode, ExecAssignNode,
    ExecSource, Expr, FnDeclNode, FnInvNode, ForNode, IfNode, ImportNode, IndexExpr, NameNode,
    Node, Pos, SetenvNode,
};
use crate::builtins::{BuiltinRegistry, register_builtins, split_fields};
use crate::config::ShellConfig;
use crate::exec::{OutputBuffer, Sink, Source, Streams};
use crate::interpreter::{ControlFlow, Error, FnDef, FnValue, Result, Scope, UserFn, Value};
use crate::interrupt::Interrupt;
use crate::{import, parser};

type Eval<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a>>;

const DEFAULT_PROMPT: &str = "λ> ";

const DEFAULT_CD: &str = r#"fn nash_builtin_cd(path) {
	if $path == "" {
		path = $HOME
	}

	chdir($path)
}

bindfn nash_builtin_cd cd
"#;

/// A nash interpreter instance.
pub struct Shell {
    name: String,
    /// File being executed, used to locate errors and relative imports.
    filename: RefCell<String>,
    root: Rc<Scope>,
    /// Innermost scope; function calls swap it for the call's scope.
    scope: RefCell<Rc<Scope>>,
    /// Exported variables, as they were when `setenv` ran.
    env: RefCell<BTreeMap<String, Value>>,
    streams: RefCell<Streams>,
    interrupt: Arc<Interrupt>,
    lambdas: Cell<usize>,
    builtins: BuiltinRegistry,
    config: ShellConfig,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        let root = Scope::root(config.name.clone());
        let mut builtins = BuiltinRegistry::new();
        register_builtins(&mut builtins);

        let shell = Self {
            name: config.name.clone(),
            filename: RefCell::new(config.name.clone()),
            scope: RefCell::new(Rc::clone(&root)),
            root,
            env: RefCell::default(),
            streams: RefCell::default(),
            interrupt: Interrupt::new(),
            lambdas: Cell::new(0),
            builtins,
            config,
        };
        shell.bootstrap();
        shell
    }

    fn bootstrap(&self) {
        for (name, value) in &self.config.env {
            self.export(name, Value::str(value.as_str()));
        }

        let defaults = [
            ("PID", std::process::id().to_string()),
            ("SHELL", self.config.nashd_path.display().to_string()),
            ("NASHPATH", self.config.nashpath.display().to_string()),
            ("NASHROOT", self.config.nashroot.display().to_string()),
            (
                "PWD",
                std::env::current_dir()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            ),
        ];
        for (name, value) in defaults {
            if self.root.get_var(name).is_none() {
                self.export(name, Value::str(value));
            }
        }
        if self.root.get_var("PROMPT").is_none() {
            self.root.declare_var("PROMPT", Value::str(DEFAULT_PROMPT));
        }

        for (name, builtin) in self.builtins.iter() {
            self.root
                .declare_var(name, Value::Fn(FnValue::Builtin(Rc::clone(builtin))));
        }

        if self.config.default_cd {
            if let Err(e) = self.install_default_cd() {
                warn!("failed to install the default cd: {e}");
            }
        }
    }

    fn install_default_cd(&self) -> Result<()> {
        let tree = parser::parse("nash_builtin_cd", DEFAULT_CD)?;
        for node in &tree.root.nodes {
            match node {
                Node::FnDecl(decl) => {
                    self.declare_fn(decl);
                }
                Node::BindFn(bind) => self.bind_fn(bind)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// Label of the source currently executing.
    pub fn filename(&self) -> String {
        self.filename.borrow().clone()
    }

    /// Parse and run `source`; `name` labels errors.
    pub async fn exec(&self, name: &str, source: &str) -> Result<()> {
        let tree = parser::parse(name, source)?;
        let saved = self.filename.replace(name.to_string());
        let result = self.exec_block(&tree.root).await;
        self.filename.replace(saved);
        result.map(|_| ())
    }

    /// Run a script file with `ARGS` bound to the path followed by `args`.
    pub async fn exec_file(&self, path: impl AsRef<Path>, args: &[String]) -> Result<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::msg(format!("{}: {e}", path.display())))?;
        let label = path.display().to_string();

        let mut argv = vec![Value::str(label.as_str())];
        argv.extend(args.iter().map(|a| Value::str(a.as_str())));
        self.root.declare_var("ARGS", Value::List(argv));

        self.exec(&label, &source).await
    }

    pub fn set_stdin(&self, source: Source) {
        self.streams.borrow_mut().stdin = source;
    }

    pub fn set_stdout(&self, sink: Sink) {
        self.streams.borrow_mut().stdout = sink;
    }

    pub fn set_stderr(&self, sink: Sink) {
        self.streams.borrow_mut().stderr = sink;
    }

    pub fn streams(&self) -> Streams {
        self.streams.borrow().clone()
    }

    pub(crate) fn replace_streams(&self, streams: Streams) -> Streams {
        self.streams.replace(streams)
    }

    /// Look `name` up from the innermost scope.
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.scope().get_var(name)
    }

    /// Set `name` in the root scope.
    pub fn set_var(&self, name: &str, value: Value) {
        self.root.declare_var(name, value);
    }

    /// Exported variables, sorted by name.
    pub fn exported(&self) -> Vec<(String, Value)> {
        self.env
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn export(&self, name: &str, value: Value) {
        self.root.declare_var(name, value.clone());
        self.env.borrow_mut().insert(name.to_string(), value);
    }

    /// Interrupt the running loop, as SIGINT would.
    pub fn trigger_ctrlc(&self) {
        self.interrupt.trigger();
    }

    /// Interrupt state shared with signal listeners.
    pub fn interrupt_handle(&self) -> Arc<Interrupt> {
        Arc::clone(&self.interrupt)
    }

    pub fn write_stdout(&self, bytes: &[u8]) -> Result<()> {
        let sink = self.streams.borrow().stdout.clone();
        sink.write_all(bytes)?;
        Ok(())
    }

    pub fn write_stderr(&self, bytes: &[u8]) -> Result<()> {
        let sink = self.streams.borrow().stderr.clone();
        sink.write_all(bytes)?;
        Ok(())
    }

    /// Change the process working directory, updating `PWD` and `OLDPWD`.
    pub fn change_dir(&self, dir: &str) -> Result<()> {
        let old = std::env::current_dir().map(|d| d.display().to_string()).ok();
        std::env::set_current_dir(dir).map_err(|e| Error::msg(format!("chdir {dir}: {e}")))?;
        let new = std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|_| dir.to_string());
        if let Some(old) = old {
            self.export("OLDPWD", Value::str(old));
        }
        self.export("PWD", Value::str(new));
        Ok(())
    }

    pub(crate) fn scope(&self) -> Rc<Scope> {
        Rc::clone(&self.scope.borrow())
    }

    pub(crate) fn set_status(&self, status: i32) {
        self.scope().declare_var("status", Value::str(status.to_string()));
    }

    pub(crate) fn locate(&self, err: Error, pos: Pos) -> Error {
        err.locate(&self.filename.borrow(), pos)
    }

    fn error(&self, pos: Pos, message: impl AsRef<str>) -> Error {
        Error::eval(&self.filename.borrow(), pos, message)
    }

    /// Run the statements of `block` in the current scope.
    pub(crate) fn exec_block<'a>(&'a self, block: &'a Block) -> Eval<'a, ControlFlow> {
        Box::pin(async move {
            for node in &block.nodes {
                match self.exec_node(node).await {
                    Ok(ControlFlow::Normal) => {}
                    Ok(flow) => return Ok(flow),
                    Err(e) if e.is_ignore() => debug!("ignored: {e}"),
                    Err(e) => return Err(e),
                }
            }
            Ok(ControlFlow::Normal)
        })
    }

    fn exec_node<'a>(&'a self, node: &'a Node) -> Eval<'a, ControlFlow> {
        Box::pin(async move {
            match node {
                Node::Import(n) => self.exec_import(n).await?,
                Node::Setenv(n) => self.exec_setenv(n).await?,
                Node::Assignment(n) => self.exec_assignment(n).await?,
                Node::ExecAssign(n) => self.exec_exec_assign(n).await?,
                Node::Command(n) => {
                    let streams = self.streams();
                    self.exec_pipeline(std::slice::from_ref(n), streams).await?
                }
                Node::Pipe(n) => {
                    let streams = self.streams();
                    self.exec_pipeline(&n.commands, streams).await?
                }
                Node::Rfork(n) => self.exec_rfork(n).await?,
                Node::Cd(n) => self.exec_cd(n, false).await?,
                Node::If(n) => return self.exec_if(n).await,
                Node::For(n) => return self.exec_for(n).await,
                Node::FnDecl(n) => {
                    self.declare_fn(n);
                }
                Node::FnInv(n) => {
                    self.call_inv(n).await?;
                }
                Node::Return(n) => {
                    if !self.scope().is_fn() {
                        return Err(self.error(
                            n.pos,
                            "Unexpected return outside of function declaration.",
                        ));
                    }
                    let values = self.eval_args(&n.values).await?;
                    return Ok(ControlFlow::Return(values));
                }
                Node::BindFn(n) => self.bind_fn(n)?,
                Node::Dump(n) => self.exec_dump(n).await?,
                Node::Builtin(n) => match n.stmt.as_ref() {
                    Node::Cd(cd) => self.exec_cd(cd, true).await?,
                    other => {
                        return Err(self.error(
                            n.pos,
                            format!("'builtin' does not support {}", other.to_string().trim()),
                        ));
                    }
                },
                Node::Comment(_) => {}
            }
            Ok(ControlFlow::Normal)
        })
    }

    async fn exec_import(&self, node: &ImportNode) -> Result<()> {
        let name = match self.eval_expr(&node.path).await? {
            Value::Str(s) => s,
            other => {
                return Err(self.error(
                    node.pos,
                    format!("Invalid type on import: {}", other.type_name()),
                ));
            }
        };

        let importer = self.filename();
        let path = import::resolve(
            &name,
            Some(Path::new(&importer)),
            &self.config.nashpath,
            &self.config.nashroot,
        )
        .map_err(|msg| self.error(node.pos, msg))?;

        let source = std::fs::read_to_string(&path)
            .map_err(|e| self.error(node.pos, format!("{}: {e}", path.display())))?;
        self.exec(&path.display().to_string(), &source).await
    }

    async fn exec_setenv(&self, node: &SetenvNode) -> Result<()> {
        if let Some(assign) = &node.assign {
            self.exec_node(assign).await?;
        }
        let Some(value) = self.get_var(&node.name) else {
            return Err(self.error(
                node.pos,
                format!("Variable '{}' not set on shell", node.name),
            ));
        };
        debug!(name = %node.name, "setenv");
        self.env.borrow_mut().insert(node.name.clone(), value);
        Ok(())
    }

    async fn exec_assignment(&self, node: &AssignmentNode) -> Result<()> {
        let mut values = Vec::with_capacity(node.values.len());
        for expr in &node.values {
            values.push(self.eval_expr(expr).await?);
        }

        if node.names.len() == values.len() {
            for (name, value) in node.names.iter().zip(values) {
                self.assign_name(name, value, node.declare).await?;
            }
            return Ok(());
        }

        match values.as_slice() {
            [Value::List(items)] if items.len() == node.names.len() => {
                for (name, value) in node.names.iter().zip(items.clone()) {
                    self.assign_name(name, value, node.declare).await?;
                }
                Ok(())
            }
            [value] => Err(self.error(
                node.pos,
                format!(
                    "Assignment has {} variables but the value {} has {} elements",
                    node.names.len(),
                    value.type_name(),
                    value.len().unwrap_or(1)
                ),
            )),
            _ => Err(self.error(
                node.pos,
                format!(
                    "Assignment has {} variables but {} values",
                    node.names.len(),
                    values.len()
                ),
            )),
        }
    }

    async fn assign_name(&self, name: &NameNode, value: Value, declare: bool) -> Result<()> {
        if name.ident == "_" {
            return Ok(());
        }
        let scope = self.scope();

        let Some(index) = &name.index else {
            if declare {
                scope.declare_var(name.ident.as_str(), value);
            } else {
                scope.set_var(&name.ident, value);
            }
            return Ok(());
        };

        let Some(current) = scope.get_var(&name.ident) else {
            return Err(self.error(name.pos, format!("Variable ${} not set", name.ident)));
        };
        let Value::List(mut items) = current else {
            return Err(self.error(
                name.pos,
                format!(
                    "Indexed assignment requires a list, but ${} is a {}",
                    name.ident,
                    current.type_name()
                ),
            ));
        };
        let i = self.eval_index(index, &name.ident, items.len()).await?;
        items[i] = value;
        scope.set_var(&name.ident, Value::List(items));
        Ok(())
    }

    async fn exec_exec_assign(&self, node: &ExecAssignNode) -> Result<()> {
        match &node.source {
            ExecSource::FnInv(inv) => {
                let values = self.call_inv(inv).await?;
                self.bind_fn_results(node, values).await
            }
            ExecSource::Command(cmd) => {
                self.capture(node, std::slice::from_ref(cmd)).await
            }
            ExecSource::Pipe(pipe) => self.capture(node, &pipe.commands).await,
        }
    }

    async fn bind_fn_results(&self, node: &ExecAssignNode, values: Vec<Value>) -> Result<()> {
        if values.is_empty() {
            return Err(self.error(
                node.pos,
                "Invalid assignment from function that does not return values",
            ));
        }

        let values = match (node.names.len(), values.len()) {
            (1, 1) => values,
            (1, _) => vec![Value::List(values)],
            (n, m) if n == m => values,
            (n, 1) => match values.into_iter().next() {
                Some(Value::List(items)) if items.len() == n => items,
                _ => {
                    return Err(self.error(
                        node.pos,
                        format!("Function returned 1 value but assignment expects {n}"),
                    ));
                }
            },
            (n, m) => {
                return Err(self.error(
                    node.pos,
                    format!("Function returned {m} values but assignment expects {n}"),
                ));
            }
        };

        for (name, value) in node.names.iter().zip(values) {
            self.assign_name(name, value, node.declare).await?;
        }
        Ok(())
    }

    async fn capture(&self, node: &ExecAssignNode, commands: &[CommandNode]) -> Result<()> {
        let stdout = OutputBuffer::new();
        let stderr = OutputBuffer::new();
        let mut streams = self.streams();
        streams.stdout = Sink::Buffer(stdout.clone());
        if node.names.len() == 3 {
            streams.stderr = Sink::Buffer(stderr.clone());
        }

        let result = self.exec_pipeline(commands, streams).await;
        let failure = match result {
            Ok(()) => None,
            Err(e) if e.is_command_failure() || e.is_ignore() => Some(e),
            Err(e) => return Err(e),
        };
        // The pipeline has already recorded its last stage's status.
        let status = self
            .get_var("status")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "0".to_string());

        let out = self.split_ifs(trim_newline(stdout.contents()));
        let mut values = vec![out];
        match node.names.len() {
            1 => {}
            2 => values.push(Value::Str(status)),
            _ => {
                values.push(Value::str(trim_newline(stderr.contents())));
                values.push(Value::Str(status));
            }
        }
        for (name, value) in node.names.iter().zip(values) {
            self.assign_name(name, value, node.declare).await?;
        }

        match failure {
            Some(e) if node.names.len() == 1 => Err(e),
            _ => Ok(()),
        }
    }

    fn split_ifs(&self, output: String) -> Value {
        let seps: Option<Vec<char>> = match self.get_var("IFS") {
            Some(Value::List(items)) => items
                .iter()
                .map(|v| v.as_str().and_then(|s| s.chars().next()))
                .collect(),
            _ => None,
        };
        match seps {
            Some(seps) if !seps.is_empty() => {
                Value::list(split_fields(&output, |c| seps.contains(&c)))
            }
            _ => Value::Str(output),
        }
    }

    async fn exec_cd(&self, node: &CdNode, builtin: bool) -> Result<()> {
        let dir = match &node.dir {
            Some(expr) => match self.eval_expr(expr).await? {
                Value::Str(s) => s,
                other => {
                    return Err(self.error(
                        node.pos,
                        format!("cd expects a string, but a {} was provided", other.type_name()),
                    ));
                }
            },
            None => String::new(),
        };

        if !builtin {
            if let Some(f) = self.scope().get_bind("cd") {
                self.call_fn(&f, vec![Value::Str(dir)])
                    .await
                    .map_err(|e| self.locate(e, node.pos))?;
                return Ok(());
            }
        }

        let target = if dir.is_empty() {
            match self.get_var("HOME") {
                Some(Value::Str(home)) if !home.is_empty() => home,
                _ => return Err(self.error(node.pos, "cd: HOME not set")),
            }
        } else {
            dir
        };
        self.change_dir(&target).map_err(|e| self.locate(e, node.pos))
    }

    async fn exec_if(&self, node: &IfNode) -> Result<ControlFlow> {
        let lvalue = self.eval_expr(&node.lvalue).await?;
        let rvalue = self.eval_expr(&node.rvalue).await?;
        let (Value::Str(l), Value::Str(r)) = (&lvalue, &rvalue) else {
            return Err(self.error(
                node.pos,
                format!(
                    "if only compares strings, got {} {} {}",
                    lvalue.type_name(),
                    node.op.as_str(),
                    rvalue.type_name()
                ),
            ));
        };

        let holds = match node.op {
            Comparison::Equal => l == r,
            Comparison::NotEqual => l != r,
        };
        if holds {
            self.exec_block(&node.then_block).await
        } else if let Some(else_block) = &node.else_block {
            self.exec_block(else_block).await
        } else {
            Ok(ControlFlow::Normal)
        }
    }

    async fn exec_for(&self, node: &ForNode) -> Result<ControlFlow> {
        let _looping = self.interrupt.enter_loop();

        let (Some(ident), Some(expr)) = (&node.ident, &node.in_expr) else {
            loop {
                self.check_interrupt().await?;
                if let flow @ ControlFlow::Return(_) = self.exec_block(&node.body).await? {
                    return Ok(flow);
                }
            }
        };

        let items = match self.eval_expr(expr).await? {
            Value::List(items) => items,
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            Value::Fn(f) => {
                return Err(self.error(
                    node.pos,
                    format!("Invalid type for for loop: function {}", f.name()),
                ));
            }
        };

        for item in items {
            self.check_interrupt().await?;
            self.scope().declare_var(ident.as_str(), item);
            if let flow @ ControlFlow::Return(_) = self.exec_block(&node.body).await? {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Normal)
    }

    async fn check_interrupt(&self) -> Result<()> {
        tokio::task::yield_now().await;
        if self.interrupt.take() {
            return Err(Error::Interrupted("loop interrupted".to_string()));
        }
        Ok(())
    }

    /// Declare a function in the current scope, naming anonymous ones.
    fn declare_fn(&self, decl: &FnDeclNode) -> FnValue {
        let name = match &decl.name {
            Some(name) => name.clone(),
            None => {
                let n = self.lambdas.get();
                self.lambdas.set(n + 1);
                format!("lambda {n}")
            }
        };
        let scope = self.scope();
        let def = FnDef {
            name: name.clone(),
            params: decl.params.clone(),
            body: decl.body.clone(),
            decl: decl.clone(),
        };
        let f = FnValue::User(UserFn::new(def, &scope));
        scope.set_fn(name.as_str(), f.clone());
        scope.declare_var(name, Value::Fn(f.clone()));
        f
    }

    fn bind_fn(&self, node: &BindFnNode) -> Result<()> {
        let scope = self.scope();
        let f = scope
            .get_fn(&node.fn_name)
            .or_else(|| match scope.get_var(&node.fn_name) {
                Some(Value::Fn(f)) => Some(f),
                _ => None,
            })
            .ok_or_else(|| self.error(node.pos, format!("No such function '{}'", node.fn_name)))?;
        scope.set_bind(node.cmd_name.as_str(), f);
        Ok(())
    }

    async fn exec_dump(&self, node: &DumpNode) -> Result<()> {
        let mut out = String::new();
        for (name, value) in self.root.vars() {
            if !matches!(value, Value::Fn(_)) {
                out.push_str(&format!("var {name} = {}\n", value.to_literal()));
            }
        }
        for name in self.env.borrow().keys() {
            out.push_str(&format!("setenv {name}\n"));
        }
        for (_, f) in self.root.fns() {
            if let FnValue::User(user) = f {
                if user.def.decl.name.is_some() {
                    out.push_str(&format!("{}\n", user.def.decl));
                }
            }
        }
        for (cmd, f) in self.root.binds() {
            out.push_str(&format!("bindfn {} {cmd}\n", f.name()));
        }

        match &node.file {
            None => self.write_stdout(out.as_bytes()),
            Some(expr) => match self.eval_expr(expr).await? {
                Value::Str(path) => std::fs::write(&path, out)
                    .map_err(|e| self.error(node.pos, format!("dump {path}: {e}"))),
                other => Err(self.error(
                    node.pos,
                    format!("dump expects a file name, but a {} was provided", other.type_name()),
                )),
            },
        }
    }

    /// Evaluate and call a function invocation.
    async fn call_inv(&self, node: &FnInvNode) -> Result<Vec<Value>> {
        let f = self.lookup_fn(node)?;
        let args = self.eval_args(&node.args).await?;
        self.call_fn(&f, args).await.map_err(|e| self.locate(e, node.pos))
    }

    fn lookup_fn(&self, node: &FnInvNode) -> Result<FnValue> {
        match &node.callee {
            Callee::Name(name) => {
                if let Some(b) = self.builtins.get(name) {
                    return Ok(FnValue::Builtin(b));
                }
                let scope = self.scope();
                if let Some(f) = scope.get_fn(name) {
                    return Ok(f);
                }
                match scope.get_var(name) {
                    Some(Value::Fn(f)) => Ok(f),
                    _ => Err(self.error(node.pos, format!("no such function '{name}'"))),
                }
            }
            Callee::Var(var) => match self.get_var(var) {
                Some(Value::Fn(f)) => Ok(f),
                Some(other) => Err(self.error(
                    node.pos,
                    format!("Variable ${var} is a {}, not a function", other.type_name()),
                )),
                None => Err(self.error(node.pos, format!("Variable ${var} not set"))),
            },
        }
    }

    /// Call `f` with evaluated arguments.
    pub fn call_fn<'a>(&'a self, f: &'a FnValue, args: Vec<Value>) -> Eval<'a, Vec<Value>> {
        Box::pin(async move {
            let params = f.params();
            let variadic = params.last().is_some_and(|p| p.variadic);
            let fixed = f.fixed_arity();
            let arity_ok = if variadic { args.len() >= fixed } else { args.len() == fixed };
            if !arity_ok {
                return Err(Error::msg(format!(
                    "Wrong number of arguments for function {}. Expected {} but found {}",
                    f.name(),
                    fixed,
                    args.len()
                )));
            }

            let user = match f {
                FnValue::Builtin(b) => return b.call(self, args).await,
                FnValue::User(user) => user,
            };

            let closure = user
                .closure()
                .ok_or_else(|| Error::msg(format!("closure of {} is gone", user.name())))?;
            let scope = Scope::child(&closure, user.name());
            let mut args = args.into_iter();
            for param in &params {
                if param.variadic {
                    scope.declare_var(param.name.as_str(), Value::List(args.by_ref().collect()));
                } else if let Some(arg) = args.next() {
                    scope.declare_var(param.name.as_str(), arg);
                }
            }

            debug!(function = %user.name(), "call");
            let saved = self.scope.replace(scope);
            let result = self.exec_block(&user.def.body).await;
            self.scope.replace(saved);

            Ok(result?.into_values().unwrap_or_default())
        })
    }

    /// Evaluate call or command arguments, spreading `x...`.
    pub(crate) async fn eval_args(&self, exprs: &[Expr]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::Spread(spread) => match self.eval_expr(&spread.expr).await? {
                    Value::List(items) => values.extend(items),
                    other => {
                        return Err(self.error(
                            spread.pos,
                            format!("Cannot spread a {}", other.type_name()),
                        ));
                    }
                },
                _ => values.push(self.eval_expr(expr).await?),
            }
        }
        Ok(values)
    }

    pub(crate) fn eval_expr<'a>(&'a self, expr: &'a Expr) -> Eval<'a, Value> {
        Box::pin(async move {
            match expr {
                Expr::String(s) => Ok(Value::Str(s.value.clone())),
                Expr::Int(i) => Ok(Value::Str(i.value.clone())),
                Expr::Var(v) => self
                    .get_var(&v.name)
                    .ok_or_else(|| self.error(v.pos, format!("Variable ${} not set", v.name))),
                Expr::Index(index) => self.eval_indexed(index).await,
                Expr::Concat(concat) => {
                    let mut out = String::new();
                    for part in &concat.parts {
                        match self.eval_expr(part).await? {
                            Value::Str(s) => out.push_str(&s),
                            other => {
                                return Err(self.error(
                                    part.pos(),
                                    format!("Impossible to concat a {}: {part}", other.type_name()),
                                ));
                            }
                        }
                    }
                    Ok(Value::Str(out))
                }
                Expr::List(list) => Ok(Value::List(self.eval_args(&list.elems).await?)),
                Expr::FnInv(inv) => {
                    let mut values = self.call_inv(inv).await?;
                    match values.len() {
                        0 => Err(self.error(
                            inv.pos,
                            format!("Function {inv} used as value but returns nothing"),
                        )),
                        1 => Ok(values.remove(0)),
                        _ => Ok(Value::List(values)),
                    }
                }
                Expr::Spread(spread) => self.eval_expr(&spread.expr).await,
            }
        })
    }

    async fn eval_indexed(&self, node: &IndexExpr) -> Result<Value> {
        let Some(value) = self.get_var(&node.var.name) else {
            return Err(self.error(node.pos, format!("Variable ${} not set", node.var.name)));
        };
        match value {
            Value::List(mut items) => {
                let i = self.eval_index(&node.index, &node.var.name, items.len()).await?;
                Ok(items.swap_remove(i))
            }
            Value::Str(s) => {
                let len = s.chars().count();
                let i = self.eval_index(&node.index, &node.var.name, len).await?;
                Ok(Value::Str(s.chars().nth(i).map(String::from).unwrap_or_default()))
            }
            Value::Fn(_) => Err(self.error(
                node.pos,
                format!("Variable ${} is a function and cannot be indexed", node.var.name),
            )),
        }
    }

    /// Evaluate an index and check it against `len`.
    async fn eval_index(&self, index: &Expr, var: &str, len: usize) -> Result<usize> {
        let pos = index.pos();
        let raw = match index {
            Expr::Int(i) => i.value.clone(),
            Expr::Var(_) => match self.eval_expr(index).await? {
                Value::Str(s) => s,
                other => {
                    return Err(self.error(
                        pos,
                        format!("Invalid index type: {}", other.type_name()),
                    ));
                }
            },
            other => return Err(self.error(pos, format!("Invalid index: {other}"))),
        };
        let i: i64 = raw
            .trim()
            .parse()
            .map_err(|_| self.error(pos, format!("Invalid index '{raw}': not an integer")))?;
        match usize::try_from(i) {
            Ok(i) if i < len => Ok(i),
            _ => Err(self.error(
                pos,
                format!("Index out of bounds. len(${var}) == {len}, but given {i}"),
            )),
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.root.clear();
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("name", &self.name)
            .field("filename", &self.filename.borrow())
            .field("builtins", &self.builtins)
            .finish()
    }
}

fn trim_newline(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
    }
    s
}
