//! Namespace setup in the rfork child, between fork and exec.
//!
//! `pre_exec` is unsafe because the hook runs in the forked child. This is
//! the only unsafe code in the crate.

use std::io;

use nix::sched::{CloneFlags, unshare};
use nix::unistd::{getgid, getuid};

use super::Namespaces;

impl Namespaces {
    fn clone_flags(self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        for (wanted, flag) in [
            (self.user, CloneFlags::CLONE_NEWUSER),
            (self.pid, CloneFlags::CLONE_NEWPID),
            (self.net, CloneFlags::CLONE_NEWNET),
            (self.mount, CloneFlags::CLONE_NEWNS),
            (self.uts, CloneFlags::CLONE_NEWUTS),
            (self.ipc, CloneFlags::CLONE_NEWIPC),
        ] {
            if wanted {
                flags |= flag;
            }
        }
        flags
    }
}

/// Make the child unshare `namespaces` before it execs. Under a new user
/// namespace the child is mapped to root from the parent's ids.
pub(super) fn isolate(command: &mut tokio::process::Command, namespaces: Namespaces) {
    let flags = namespaces.clone_flags();
    let map_user = namespaces.user;
    let uid_map = format!("0 {} 1", getuid());
    let gid_map = format!("0 {} 1", getgid());

    // SAFETY: the hook runs in the child after fork. It only calls unshare(2)
    // and writes already formatted strings to /proc files; it does not touch
    // locks or state owned by other threads of the parent.
    unsafe {
        command.pre_exec(move || {
            unshare(flags).map_err(io::Error::from)?;
            if map_user {
                write_proc("/proc/self/setgroups", "deny")?;
                write_proc("/proc/self/uid_map", &uid_map)?;
                write_proc("/proc/self/gid_map", &gid_map)?;
            }
            Ok(())
        });
    }
}

fn write_proc(path: &str, contents: &str) -> io::Result<()> {
    match std::fs::write(path, contents) {
        // Kernels before 3.19 have no setgroups file.
        Err(e) if e.kind() == io::ErrorKind::NotFound && path.ends_with("setgroups") => Ok(()),
        other => other,
    }
}
