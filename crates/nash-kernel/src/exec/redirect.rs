//! Descriptor remapping for `>[L=R] LOCATION`.
//!
//! Redirects apply left to right on a copy of the command's streams, so
//! `>[2=1] > file` points stderr at the old stdout and then stdout at the
//! file.

use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;

use tracing::debug;

use crate::ast::{RedirectMap, RedirectRight};
use crate::interpreter::{Error, Result, Value};

use super::stdio::{Sink, Streams};

/// A redirect with its location already evaluated.
#[derive(Debug, Clone)]
pub struct Redirect {
    pub map: Option<RedirectMap>,
    pub location: Option<Value>,
}

/// Apply `redirects` in order.
pub async fn apply(streams: &mut Streams, redirects: &[Redirect]) -> Result<()> {
    for redirect in redirects {
        apply_one(streams, redirect).await?;
    }
    Ok(())
}

async fn apply_one(streams: &mut Streams, redirect: &Redirect) -> Result<()> {
    let location = match &redirect.location {
        None => None,
        Some(Value::Str(s)) => Some(s.as_str()),
        Some(other) => {
            return Err(Error::msg(format!(
                "Invalid redirect location type: {}",
                other.type_name()
            )));
        }
    };

    let Some(map) = redirect.map else {
        let Some(location) = location else {
            return Err(Error::msg("Missing redirect location"));
        };
        streams.stdout = open_location(location).await?;
        return Ok(());
    };

    if map.left == 0 {
        return Err(Error::msg("Does not support stdin redirection yet"));
    }
    if map.left > 2 {
        return Err(Error::msg(format!("Invalid file descriptor redirection: fd={}", map.left)));
    }

    match map.right {
        RedirectRight::Fd(right) => {
            if location.is_some() {
                return Err(Error::msg(format!(
                    "Invalid redirect mapping: {}>{} with a location",
                    map.left, right
                )));
            }
            match (map.left, right) {
                (1, 2) => streams.stdout = streams.stderr.clone(),
                (2, 1) => streams.stderr = streams.stdout.clone(),
                (l, r) if l == r => {}
                (l, r) => {
                    return Err(Error::msg(format!("Invalid redirect mapping: {l}>{r}")));
                }
            }
        }
        RedirectRight::Suppress => {
            if location.is_some() {
                return Err(Error::msg("Suppress redirect with a location"));
            }
            set_fd(streams, map.left, open_file("/dev/null")?);
        }
        RedirectRight::NoValue => {
            let Some(location) = location else {
                return Err(Error::msg("Redirect map without location"));
            };
            let sink = open_location(location).await?;
            set_fd(streams, map.left, sink);
        }
    }
    Ok(())
}

fn set_fd(streams: &mut Streams, fd: u32, sink: Sink) {
    if fd == 2 {
        streams.stderr = sink;
    } else {
        streams.stdout = sink;
    }
}

async fn open_location(location: &str) -> Result<Sink> {
    debug!(location, "redirect");
    if let Some(addr) = location.strip_prefix("tcp://") {
        let stream = tokio::net::TcpStream::connect(addr).await?.into_std()?;
        stream.set_nonblocking(false)?;
        return Ok(Sink::fd(OwnedFd::from(stream)));
    }
    if let Some(path) = location.strip_prefix("unix://") {
        let stream = tokio::net::UnixStream::connect(path).await?.into_std()?;
        stream.set_nonblocking(false)?;
        return Ok(Sink::fd(OwnedFd::from(stream)));
    }
    if let Some(addr) = location.strip_prefix("udp://") {
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        let socket = socket.into_std()?;
        socket.set_nonblocking(false)?;
        return Ok(Sink::fd(OwnedFd::from(socket)));
    }
    open_file(location)
}

fn open_file(path: &str) -> Result<Sink> {
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
        .map_err(|e| Error::msg(format!("{path}: {e}")))?;
    Ok(Sink::fd(OwnedFd::from(file)))
}
