//! `write FILE [DATA]`: append DATA (or stdin) to FILE.
//!
//! `/dev/stdout` and `/dev/stderr` name this process's own streams. Other
//! paths are created if missing and opened for appending.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};

use anyhow::Context;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        let prog = args.first().map(String::as_str).unwrap_or("write");
        eprintln!("{prog} <file> <data>");
        std::process::exit(1);
    }

    if let Err(e) = write(&args[1], args.get(2).map(String::as_bytes)) {
        eprint!("{e:#}");
        std::process::exit(1);
    }
}

fn write(path: &str, data: Option<&[u8]>) -> anyhow::Result<()> {
    let mut out: Box<dyn Write> = match path {
        "/dev/stdout" => Box::new(io::stdout()),
        "/dev/stderr" => Box::new(io::stderr()),
        _ => Box::new(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("open {path}"))?,
        ),
    };

    match data {
        Some(data) => out.write_all(data)?,
        None => {
            let mut input = Vec::new();
            io::stdin().read_to_end(&mut input)?;
            out.write_all(&input)?;
        }
    }
    out.flush()?;
    Ok(())
}
