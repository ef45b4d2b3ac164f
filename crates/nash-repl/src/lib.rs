//! nash command-line front end.
//!
//! Runs a script file, a `-c` string, the interactive loop, or (with
//! `--nashd`) the server side of `rfork`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tracing::debug;

use nash_kernel::{Error, Shell, ShellConfig, interrupt, rfork};

const CONTINUATION_PROMPT: &str = ">>> ";

#[derive(Debug, Parser)]
#[command(name = "nash", version, about = "nash shell")]
pub struct Cli {
    /// Execute the given script and exit.
    #[arg(short = 'c', value_name = "SCRIPT")]
    pub command: Option<String>,

    /// Log evaluator internals to stderr.
    #[arg(long)]
    pub debug: bool,

    /// Skip NASHPATH/init.
    #[arg(long)]
    pub noinit: bool,

    /// Serve an rfork parent on this socket.
    #[arg(long, value_name = "PATH", hide = true)]
    pub nashd: Option<PathBuf>,

    /// Script to run.
    pub file: Option<PathBuf>,

    /// Arguments for the script, bound to ARGS after the script path.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        self.command.is_none() && self.file.is_none() && self.nashd.is_none()
    }
}

/// Run nash as described by `cli`, returning the process exit status.
pub fn run(cli: Cli) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<i32> {
    let config = ShellConfig::from_env()
        .with_debug(cli.debug)
        .with_interactive(cli.is_interactive());

    if let Some(socket) = &cli.nashd {
        let shell = Shell::new(config.with_name("nashd"));
        rfork::serve(&shell, socket)
            .await
            .with_context(|| format!("nashd on {}", socket.display()))?;
        return Ok(0);
    }

    for problem in config.validate_dirs() {
        eprintln!("{problem}");
    }

    let shell = Shell::new(config);
    let _sigint = interrupt::listen(shell.interrupt_handle()).context("Failed to listen for SIGINT")?;

    if !cli.noinit {
        if let Err(e) = load_init(&shell).await {
            if let Error::Exit(code) = e {
                return Ok(code);
            }
            eprintln!("Failed to load init: {e}");
        }
    }

    let result = if let Some(script) = &cli.command {
        shell.exec("<cmdline>", script).await
    } else if let Some(file) = &cli.file {
        shell.exec_file(file, &cli.args).await
    } else {
        return interactive(&shell).await;
    };
    Ok(report(result))
}

/// Exit status for a finished script, printing errors to stderr.
pub fn report(result: nash_kernel::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(Error::Exit(code)) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_status()
        }
    }
}

async fn load_init(shell: &Shell) -> nash_kernel::Result<()> {
    let base = shell.config().nashpath.join("init");
    let mut with_ext = base.clone().into_os_string();
    with_ext.push(".sh");

    for path in [base, PathBuf::from(with_ext)] {
        if path.is_file() {
            debug!(path = %path.display(), "loading init");
            let source = std::fs::read_to_string(&path)?;
            return shell.exec(&path.display().to_string(), &source).await;
        }
    }
    Ok(())
}

/// What the interactive loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Statement finished; show the main prompt.
    Ready,
    /// Input is incomplete; show the continuation prompt.
    More,
    Exit(i32),
}

/// Accumulates input until it forms complete statements.
#[derive(Debug, Default)]
pub struct Repl {
    buffer: String,
}

impl Repl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(&self, shell: &Shell) -> String {
        if self.buffer.is_empty() {
            shell
                .get_var("PROMPT")
                .map(|p| p.to_string())
                .unwrap_or_else(|| "λ> ".to_string())
        } else {
            CONTINUATION_PROMPT.to_string()
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub async fn feed(&mut self, shell: &Shell, line: &str) -> Step {
        self.buffer.push_str(line);
        self.buffer.push('\n');

        let result = shell.exec("<interactive>", &self.buffer).await;
        match result {
            Err(e) if e.is_unfinished() => return Step::More,
            Err(Error::Exit(code)) => {
                self.buffer.clear();
                return Step::Exit(code);
            }
            Err(e) => {
                let _ = shell.write_stderr(format!("ERROR: {e}\n").as_bytes());
            }
            Ok(()) => {}
        }
        self.buffer.clear();
        Step::Ready
    }
}

async fn interactive(shell: &Shell) -> Result<i32> {
    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;
    let mut repl = Repl::new();

    loop {
        let prompt = repl.prompt(shell);
        match rl.readline(&prompt) {
            Ok(line) => {
                if let Step::Exit(code) = repl.feed(shell, &line).await {
                    return Ok(code);
                }
            }
            Err(ReadlineError::Interrupted) => {
                repl.reset();
            }
            Err(ReadlineError::Eof) => return Ok(0),
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }
}
