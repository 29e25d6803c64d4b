//! Error types for the relay daemon
//!
//! Every variant is fatal. The binary prints the message on a single line
//! and exits non-zero; the recoverable cases (FIFO with no data, an
//! interrupted wait) never become a `RelayError`.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use nix::errno::Errno;
use thiserror::Error;

/// Fatal conditions raised during setup or from inside the event loop
#[derive(Debug, Error)]
pub enum RelayError {
    /// Host/port did not resolve to any address
    #[error("cannot resolve '{host}:{port}': {source}")]
    Resolve {
        host: String,
        port: String,
        #[source]
        source: io::Error,
    },

    /// No resolved address accepted a connection
    #[error("cannot connect to '{host}:{port}'")]
    Connect { host: String, port: String },

    /// The connected socket could not be prepared for use
    #[error("cannot set up connection to '{host}:{port}': {source}")]
    ConnectionSetup {
        host: String,
        port: String,
        #[source]
        source: io::Error,
    },

    /// A descriptor handed over by the superserver is not open
    #[error("inherited descriptor {fd} is not usable: {source}")]
    InheritedDescriptor {
        fd: i32,
        #[source]
        source: Errno,
    },

    /// The login name of the effective user could not be determined
    #[error("cannot get username: {0}")]
    Username(#[source] io::Error),

    /// Session directory creation failed for a reason other than existence
    #[error("cannot create directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// FIFO creation failed for a reason other than existence
    #[error("cannot create fifo '{}': {source}", .path.display())]
    CreateFifo {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    /// The FIFO exists but could not be opened
    #[error("cannot open fifo '{}': {source}", .path.display())]
    OpenFifo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Signal handler registration failed
    #[error("cannot install handler for {signal}: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: io::Error,
    },

    /// Pipe creation failed
    #[error("pipe: {0}")]
    Pipe(#[source] io::Error),

    /// The worker command could not be started
    #[error("cannot start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The worker's status could not be queried
    #[error("cannot wait for child: {0}")]
    Wait(#[source] io::Error),

    /// The worker process terminated
    #[error("child died ({0})")]
    ChildDied(ExitStatus),

    /// Writing a tagged event to the worker's input failed
    #[error("cannot write to client: {0}")]
    ClientWrite(#[source] io::Error),

    /// The worker closed its output pipe
    #[error("client closed its output")]
    ClientClosed,

    /// The remote peer closed the connection or the read failed
    #[error("remote host closed the connection")]
    RemoteClosed,

    /// Forwarding a worker line to the remote peer failed
    #[error("cannot write to server: {0}")]
    ServerWrite(#[source] io::Error),

    /// No traffic from the remote peer within the stale interval
    #[error("shutting down: ping timeout")]
    PingTimeout,

    /// The readiness wait failed with something other than EINTR
    #[error("select: {0}")]
    Select(#[source] Errno),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RelayError>;
