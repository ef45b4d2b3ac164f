//! `rfork FLAGS { body }`: run a block in a child shell under new namespaces.
//!
//! The parent starts its own executable in `--nashd` mode on a fresh Unix
//! socket, sends each statement of the body as its printed source and reads
//! back a decimal status per statement. See [`server`] for the child side.

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod namespace;
pub mod server;

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

use crate::Shell;
use crate::ast::RforkNode;
use crate::interpreter::{Error, Result};

pub use server::serve;

/// Namespaces requested by an rfork flag string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Namespaces {
    pub user: bool,
    pub pid: bool,
    pub net: bool,
    pub mount: bool,
    pub uts: bool,
    pub ipc: bool,
}

impl Namespaces {
    pub fn all() -> Self {
        Self {
            user: true,
            pid: true,
            net: true,
            mount: true,
            uts: true,
            ipc: true,
        }
    }
}

impl FromStr for Namespaces {
    type Err = Error;

    fn from_str(flags: &str) -> Result<Self> {
        if flags.is_empty() {
            return Err(Error::msg("Rfork requires some flag"));
        }
        let mut ns = Namespaces::default();
        for c in flags.chars() {
            match c {
                'u' => ns.user = true,
                'p' => ns.pid = true,
                'n' => ns.net = true,
                'm' => ns.mount = true,
                's' => ns.uts = true,
                'i' => ns.ipc = true,
                'c' => ns = Namespaces::all(),
                other => return Err(Error::msg(format!("Wrong rfork flag: {other}"))),
            }
        }
        Ok(ns)
    }
}

/// An unused `nash.XXXX.sock` path in the temporary directory.
pub(crate) fn socket_path() -> PathBuf {
    let state = RandomState::new();
    for attempt in 0u32.. {
        let mut hasher = state.build_hasher();
        hasher.write_u32(std::process::id());
        hasher.write_u32(attempt);
        let mut seed = hasher.finish();
        let name: String = (0..4)
            .map(|_| {
                let c = char::from(b'a' + (seed % 26) as u8);
                seed /= 26;
                c
            })
            .collect();
        let path = std::env::temp_dir().join(format!("nash.{name}.sock"));
        if !path.exists() {
            return path;
        }
    }
    std::env::temp_dir().join("nash.sock")
}

impl Shell {
    pub(crate) async fn exec_rfork(&self, node: &RforkNode) -> Result<()> {
        let namespaces: Namespaces = node.flags.parse().map_err(|e| self.locate(e, node.pos))?;
        self.rfork(namespaces, node)
            .await
            .map_err(|e| self.locate(e, node.pos))
    }

    #[cfg(not(target_os = "linux"))]
    async fn rfork(&self, _namespaces: Namespaces, _node: &RforkNode) -> Result<()> {
        Err(Error::msg("rfork is only supported on Linux"))
    }

    #[cfg(target_os = "linux")]
    async fn rfork(&self, namespaces: Namespaces, node: &RforkNode) -> Result<()> {
        use tracing::debug;

        use crate::exec::{exit_result, stdio};

        let socket = socket_path();
        let streams = self.streams();
        let mut copies = Vec::new();

        let mut command = tokio::process::Command::new(&self.config().nashd_path);
        command
            .arg("--noinit")
            .arg("--nashd")
            .arg(&socket)
            .env_clear()
            .envs(self.environ())
            .stdin(streams.stdin.to_stdio()?)
            .stdout(streams.stdout.to_stdio(&mut copies)?)
            .stderr(streams.stderr.to_stdio(&mut copies)?);
        namespace::isolate(&mut command, namespaces);

        debug!(socket = %socket.display(), ?namespaces, "rfork: starting child");
        let mut child = command.spawn()?;
        drop(command);

        let result = client::run(&socket, &node.body).await;
        if result.is_err() {
            let _ = child.start_kill();
        }
        let status = child.wait().await;
        stdio::drain(copies).await?;
        let _ = std::fs::remove_file(&socket);

        result?;
        exit_result(status?)
    }
}

#[cfg(target_os = "linux")]
mod client {
    use std::path::Path;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;
    use tracing::debug;

    use crate::ast::{Block, Node};
    use crate::interpreter::{Error, Result};

    const DIAL_RETRIES: u64 = 3;

    pub(super) async fn run(socket: &Path, body: &Block) -> Result<()> {
        let mut stream = dial(socket).await?;
        let result = send_statements(&mut stream, body).await;
        stream.write_all(b"quit").await?;
        result
    }

    async fn dial(socket: &Path) -> Result<UnixStream> {
        let mut attempt = 0;
        loop {
            match UnixStream::connect(socket).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < DIAL_RETRIES => {
                    attempt += 1;
                    debug!(attempt, "rfork: dial failed: {e}");
                    tokio::time::sleep(Duration::from_secs(attempt)).await;
                }
                Err(e) => {
                    return Err(Error::msg(format!(
                        "rfork: failed to connect to {}: {e}",
                        socket.display()
                    )));
                }
            }
        }
    }

    async fn send_statements(stream: &mut UnixStream, body: &Block) -> Result<()> {
        for node in &body.nodes {
            if matches!(node, Node::Comment(_)) {
                continue;
            }
            let request = format!("{node}\n");
            debug!(statement = %request.trim_end(), "rfork: send");
            stream.write_all(request.as_bytes()).await?;

            let mut reply = [0u8; 32];
            let n = stream.read(&mut reply).await?;
            if n == 0 {
                return Err(Error::msg("rfork: child closed the connection"));
            }
            let reply = String::from_utf8_lossy(&reply[..n]);
            let status: i32 = reply
                .trim()
                .parse()
                .map_err(|_| Error::msg(format!("rfork: invalid reply {reply:?}")))?;
            if status != 0 {
                return Err(Error::msg(format!("nash: Exited with status {status}")));
            }
        }
        Ok(())
    }
}
