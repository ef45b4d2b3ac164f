//! Commands and pipelines.
//!
//! A single command is a one-stage pipeline. External stages are spawned in
//! order before any bound function runs, so functions in the middle of a pipe
//! always have a live reader and writer. Adjacent bound functions run in turn,
//! and each reads its predecessor's complete output from memory. The `status`
//! variable holds the last stage's status.

use std::os::fd::OwnedFd;

use tokio::process::Child;
use tracing::debug;

use crate::Shell;
use crate::ast::CommandNode;
use crate::interpreter::{Error, FnValue, Result, Value};

use super::command::{Prepared, Target, exit_result};
use super::redirect;
use super::stdio::{self, OutputBuffer, Sink, Source, Streams};

/// Where a stage reads its predecessor's output.
enum Feed {
    Pipe(OwnedFd),
    Buffer(OutputBuffer),
}

enum Running {
    Child(Child),
    Bind,
    Done(Result<()>),
}

impl Shell {
    /// Run `commands` as a pipeline whose ends use `base`.
    pub(crate) async fn exec_pipeline(&self, commands: &[CommandNode], base: Streams) -> Result<()> {
        let mut prepared = Vec::with_capacity(commands.len());
        for node in commands {
            let p = self
                .prepare_command(node)
                .await
                .map_err(|e| self.locate(e, node.pos))?;
            prepared.push(p);
        }

        let is_bind = |i: usize| matches!(prepared[i].target, Target::Bind(_));
        let mut stage_streams = Vec::with_capacity(prepared.len());
        let mut feeds = Vec::with_capacity(prepared.len());
        let mut upstream = None;
        for (i, (p, node)) in prepared.iter().zip(commands).enumerate() {
            let mut streams = base.clone();
            let mut feed = None;
            match upstream.take() {
                Some(Feed::Pipe(read)) => streams.stdin = Source::fd(read),
                Some(Feed::Buffer(buf)) => feed = Some(buf),
                None => {}
            }
            if i + 1 < prepared.len() {
                if is_bind(i) && is_bind(i + 1) {
                    let buf = OutputBuffer::new();
                    streams.stdout = Sink::Buffer(buf.clone());
                    upstream = Some(Feed::Buffer(buf));
                } else {
                    let (read, write) = stdio::pipe()?;
                    streams.stdout = Sink::fd(write);
                    upstream = Some(Feed::Pipe(read));
                }
            }
            redirect::apply(&mut streams, &p.redirects)
                .await
                .map_err(|e| self.locate(e, node.pos))?;
            stage_streams.push(Some(streams));
            feeds.push(feed);
        }

        let mut copies = Vec::new();
        let mut running = Vec::with_capacity(prepared.len());
        for (p, streams) in prepared.iter().zip(stage_streams.iter_mut()) {
            let state = match &p.target {
                Target::External(path) => {
                    debug!(command = %p.name, "pipeline stage");
                    // Taking the streams closes this stage's descriptors in the shell.
                    let spawned = match streams.take() {
                        Some(s) => self.spawn_external(p, path, &s, &mut copies),
                        None => Err(Error::not_found(&p.name)),
                    };
                    match spawned {
                        Ok(child) => Running::Child(child),
                        Err(e) => Running::Done(Err(e)),
                    }
                }
                Target::Bind(_) => Running::Bind,
                Target::Missing => {
                    *streams = None;
                    Running::Done(Err(Error::not_found(&p.name)))
                }
            };
            running.push(state);
        }

        for (i, p) in prepared.iter().enumerate() {
            if !matches!(running[i], Running::Bind) {
                continue;
            }
            let Target::Bind(f) = &p.target else { continue };
            let mut streams = stage_streams[i].take().unwrap_or_else(|| base.clone());
            if let Some(buf) = feeds[i].take() {
                streams.stdin = Source::bytes(buf.bytes());
            }
            let result = self.run_bind(f, p, streams).await;
            if let Err(e) = &result {
                if e.is_interrupted() || matches!(e, Error::Exit(_)) {
                    stage_streams.clear();
                    reap(running).await;
                    return result;
                }
            }
            running[i] = Running::Done(result.map_err(|e| self.locate(e, commands[i].pos)));
        }
        drop(stage_streams);

        let mut results = Vec::with_capacity(running.len());
        for state in running {
            let result = match state {
                Running::Child(mut child) => match child.wait().await {
                    Ok(status) => exit_result(status),
                    Err(e) => Err(Error::Io(e)),
                },
                Running::Done(result) => result,
                Running::Bind => Ok(()),
            };
            results.push(result);
        }
        stdio::drain(copies).await?;

        let status = results
            .last()
            .map(|r| match r {
                Ok(()) => 0,
                Err(e) => e.command_status(),
            })
            .unwrap_or(0);
        self.set_status(status);

        let Some(failed) = results.iter().position(|r| r.is_err()) else {
            return Ok(());
        };
        let ignore = prepared[failed].ignore;

        let err = if results.len() == 1 {
            match results.pop() {
                Some(Err(e)) => e,
                _ => return Ok(()),
            }
        } else {
            let messages = results
                .iter()
                .map(|r| match r {
                    Ok(()) => "success".to_string(),
                    Err(e) => e.to_string(),
                })
                .collect();
            Error::Pipeline(messages)
        };

        if ignore {
            debug!(error = %err, "ignored command failure");
            Err(Error::Ignore(Box::new(err)))
        } else {
            Err(err)
        }
    }

    async fn run_bind(&self, f: &FnValue, p: &Prepared, streams: Streams) -> Result<()> {
        let mut args = p.args.clone();
        let arity = f.fixed_arity();
        if args.len() < arity {
            args.resize(arity, Value::str(""));
        }
        let saved = self.replace_streams(streams);
        let result = self.call_fn(f, args).await;
        self.replace_streams(saved);
        result.map(|_| ())
    }
}

async fn reap(running: Vec<Running>) {
    for state in running {
        if let Running::Child(mut child) = state {
            let _ = child.wait().await;
        }
    }
}
