//! The `nashd` side of rfork.
//!
//! Accepts one connection and runs what it receives. A request may span
//! several lines; lines accumulate until they parse as complete statements.
//! Each request gets one decimal status back: `0` on success, the exit
//! status for `exit(n)`, `1` for any other error.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::debug;

use crate::Shell;
use crate::interpreter::{Error, Result};

/// Serve one rfork client on `socket`.
pub async fn serve(shell: &Shell, socket: &Path) -> Result<()> {
    // A stale socket from an earlier run would make bind fail.
    let _ = std::fs::remove_file(socket);
    let listener = UnixListener::bind(socket)?;
    debug!(socket = %socket.display(), "nashd: listening");

    let (stream, _) = listener.accept().await?;
    drop(listener);
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let mut pending = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if pending.is_empty() && line.trim() == "quit" {
            break;
        }
        pending.push_str(&line);

        let (status, stop) = match shell.exec("nashd", &pending).await {
            Err(e) if e.is_unfinished() => continue,
            Ok(()) => (0, false),
            Err(Error::Exit(code)) => (code, true),
            Err(e) => {
                debug!(error = %e, "nashd: statement failed");
                let _ = shell.write_stderr(format!("nashd: {e}\n").as_bytes());
                (1, false)
            }
        };
        pending.clear();
        write.write_all(status.to_string().as_bytes()).await?;
        if stop {
            break;
        }
    }

    let _ = std::fs::remove_file(socket);
    debug!("nashd: done");
    Ok(())
}
