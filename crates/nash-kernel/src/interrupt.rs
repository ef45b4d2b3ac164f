//! SIGINT handling.
//!
//! The listener only flips a flag. Loops poll it between iterations; outside
//! a loop the signal is dropped so that a running command is not
//! interrupted twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tracing::debug;

/// Shared interrupt state of one shell.
#[derive(Debug, Default)]
pub struct Interrupt {
    flag: AtomicBool,
    looping: AtomicUsize,
}

impl Interrupt {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record an interrupt if a loop is running.
    pub fn trigger(&self) {
        if self.looping.load(Ordering::SeqCst) > 0 {
            self.flag.store(true, Ordering::SeqCst);
        } else {
            debug!("interrupt outside of a loop ignored");
        }
    }

    /// Consume a pending interrupt.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn enter_loop(&self) -> LoopGuard<'_> {
        self.looping.fetch_add(1, Ordering::SeqCst);
        LoopGuard(self)
    }
}

/// Marks a loop as running until dropped.
pub(crate) struct LoopGuard<'a>(&'a Interrupt);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        if self.0.looping.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Left the outermost loop; a late signal must not leak into the next one.
            self.0.flag.store(false, Ordering::SeqCst);
        }
    }
}

/// Spawn a task forwarding SIGINT to `interrupt`.
pub fn listen(interrupt: Arc<Interrupt>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(tokio::spawn(async move {
        while sigint.recv().await.is_some() {
            interrupt.trigger();
        }
    }))
}
