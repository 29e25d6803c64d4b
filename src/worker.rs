//! Worker process supervision
//!
//! The worker is the external line-oriented program (IRC_CLIENT) that knows
//! the protocol. It reads tagged events on stdin and writes protocol lines
//! on stdout; its stderr is shared with the daemon.
//!
//! Both pipes are created here. The child-side ends go into the `Command`
//! and are closed in the parent as soon as the child is running. Every
//! other descriptor the daemon holds is close-on-exec, so the worker starts
//! with exactly its three standard streams.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::process::{Child, Command, ExitStatus, Stdio};

use os_pipe::{PipeReader, PipeWriter};
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::event::TaggedEvent;
use crate::line;

/// A running worker and the daemon's ends of its pipes
#[derive(Debug)]
pub struct Worker {
    child: Child,
    input: PipeWriter,
    output: PipeReader,
}

impl Worker {
    /// Start `command` (looked up in PATH) with the given extra environment
    pub fn spawn<I, K, V>(command: &str, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<std::ffi::OsStr>,
        V: AsRef<std::ffi::OsStr>,
    {
        let (input_reader, input_writer) = os_pipe::pipe().map_err(RelayError::Pipe)?;
        let (output_reader, output_writer) = os_pipe::pipe().map_err(RelayError::Pipe)?;

        let mut cmd = Command::new(command);
        cmd.envs(env)
            .stdin(Stdio::from(input_reader))
            .stdout(Stdio::from(output_writer))
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|source| RelayError::Spawn {
            command: command.to_string(),
            source,
        })?;
        // Release the child-side pipe ends held by the builder.
        drop(cmd);

        info!(pid = child.id(), command, "worker started");

        Ok(Self {
            child,
            input: input_writer,
            output: output_reader,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Write one tagged event to the worker's stdin
    pub fn send(&mut self, event: &TaggedEvent) -> Result<()> {
        self.input
            .write_all(&event.encode())
            .map_err(RelayError::ClientWrite)
    }

    /// Read one line the worker produced, terminator included.
    ///
    /// End of stream or a read error means the worker is gone.
    pub fn recv(&mut self) -> Result<Vec<u8>> {
        match line::read_raw_line(&mut self.output) {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(RelayError::ClientClosed),
            Err(e) => {
                debug!(error = %e, "worker read failed");
                Err(RelayError::ClientClosed)
            }
        }
    }

    /// Exit status if the worker has terminated, without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.child.try_wait().map_err(RelayError::Wait)
    }

    /// Fail with `ChildDied` if the worker has terminated
    pub fn check_alive(&mut self) -> Result<()> {
        match self.try_wait()? {
            Some(status) => Err(RelayError::ChildDied(status)),
            None => Ok(()),
        }
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill()?;
        }
        self.child.wait().map(|_| ())
    }
}

/// Readiness is watched on the worker's output
impl AsFd for Worker {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.output.as_fd()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            debug!(error = %e, "worker cleanup failed");
        }
    }
}
