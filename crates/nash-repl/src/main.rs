//! nash entry point.
//!
//! ```bash
//! cargo run -p nash-repl -- -c 'echo hello'
//! ```

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use nash_repl::Cli;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; --debug only changes the default.
    let default = if cli.debug { "nash_kernel=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();

    let code = match nash_repl::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("nash: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
