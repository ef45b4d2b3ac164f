//! Standard stream wiring.
//!
//! A [`Streams`] triple describes where a command reads and writes. Sinks and
//! sources are cheap to clone; file descriptors are shared through `Arc` and
//! closed when the last holder is dropped.
//!
//! In-memory buffers cannot be handed to a child process directly, so
//! converting a buffer sink for a child creates a pipe and a task that
//! copies the pipe into the buffer. Those tasks must be awaited after the
//! child exits.

use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

/// Shared in-memory output.
#[derive(Clone, Default)]
pub struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, bytes: &[u8]) {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Contents as text, replacing invalid UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    pub fn clear(&self) {
        if let Ok(mut buf) = self.0.lock() {
            buf.clear();
        }
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OutputBuffer").field(&self.bytes().len()).finish()
    }
}

/// Where output goes.
#[derive(Clone, Debug)]
pub enum Sink {
    /// The process's own stdout.
    Stdout,
    /// The process's own stderr.
    Stderr,
    Fd(Arc<OwnedFd>),
    Buffer(OutputBuffer),
}

impl Sink {
    pub fn fd(fd: OwnedFd) -> Self {
        Sink::Fd(Arc::new(fd))
    }

    /// True for the process's own stdout/stderr.
    pub fn is_default(&self) -> bool {
        matches!(self, Sink::Stdout | Sink::Stderr)
    }

    /// Write from inside the shell (built-ins, dump).
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            Sink::Stderr => io::stderr().lock().write_all(bytes),
            Sink::Fd(fd) => {
                let mut file = std::fs::File::from(fd.try_clone()?);
                file.write_all(bytes)
            }
            Sink::Buffer(buf) => {
                buf.append(bytes);
                Ok(())
            }
        }
    }

    /// Convert for a child process.
    pub(crate) fn to_stdio(&self, copies: &mut Vec<JoinHandle<io::Result<()>>>) -> io::Result<Stdio> {
        match self {
            Sink::Stdout => Ok(Stdio::from(io::stdout().as_fd().try_clone_to_owned()?)),
            Sink::Stderr => Ok(Stdio::from(io::stderr().as_fd().try_clone_to_owned()?)),
            Sink::Fd(fd) => Ok(Stdio::from(fd.try_clone()?)),
            Sink::Buffer(buf) => {
                let (read, write) = pipe()?;
                copies.push(spawn_copy(read, buf.clone()));
                Ok(Stdio::from(write))
            }
        }
    }
}

/// Where input comes from.
#[derive(Clone, Debug)]
pub enum Source {
    /// The process's own stdin.
    Stdin,
    Fd(Arc<OwnedFd>),
    Bytes(Arc<[u8]>),
    Null,
}

impl Source {
    pub fn fd(fd: OwnedFd) -> Self {
        Source::Fd(Arc::new(fd))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Bytes(Arc::from(data.into()))
    }

    pub(crate) fn to_stdio(&self) -> io::Result<Stdio> {
        match self {
            Source::Stdin => Ok(Stdio::inherit()),
            Source::Fd(fd) => Ok(Stdio::from(fd.try_clone()?)),
            Source::Null => Ok(Stdio::null()),
            Source::Bytes(data) => {
                let (read, write) = pipe()?;
                let data = Arc::clone(data);
                tokio::spawn(async move {
                    let mut file = tokio::fs::File::from_std(std::fs::File::from(write));
                    // A reader that exits early closes the pipe; that is not an error here.
                    let _ = file.write_all(&data).await;
                });
                Ok(Stdio::from(read))
            }
        }
    }
}

/// The three standard streams of a command.
#[derive(Clone, Debug)]
pub struct Streams {
    pub stdin: Source,
    pub stdout: Sink,
    pub stderr: Sink,
}

impl Default for Streams {
    fn default() -> Self {
        Self {
            stdin: Source::Stdin,
            stdout: Sink::Stdout,
            stderr: Sink::Stderr,
        }
    }
}

/// An OS pipe whose ends are not inherited by unrelated children.
pub(crate) fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe().map_err(io::Error::from)?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(io::Error::from)?;
    }
    Ok((read, write))
}

fn spawn_copy(read: OwnedFd, buf: OutputBuffer) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        let mut file = tokio::fs::File::from_std(std::fs::File::from(read));
        let mut chunk = vec![0u8; 8192];
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.append(&chunk[..n]);
        }
    })
}

/// Wait for every pending buffer copy.
pub(crate) async fn drain(copies: Vec<JoinHandle<io::Result<()>>>) -> io::Result<()> {
    for copy in copies {
        copy.await.map_err(io::Error::other)??;
    }
    Ok(())
}
