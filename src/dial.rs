//! Connection to the remote peer
//!
//! Either dialed at startup or adopted from a UCSPI superserver, which hands
//! the connected socket over as descriptor 6 (read) and 7 (write).

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use tracing::{debug, info};

use crate::error::{RelayError, Result};

/// Descriptor a UCSPI client reads the connection from
pub const UCSPI_READ_FD: RawFd = 6;
/// Descriptor a UCSPI client writes the connection to
pub const UCSPI_WRITE_FD: RawFd = 7;

/// Bidirectional byte stream to the remote peer
#[derive(Debug)]
pub struct Connection {
    reader: File,
    writer: File,
}

impl Connection {
    /// Wrap a connected stream, using it for both directions
    pub fn from_stream(stream: impl Into<OwnedFd>) -> io::Result<Self> {
        let reader = File::from(stream.into());
        let writer = reader.try_clone()?;
        Ok(Self { reader, writer })
    }

    /// Wrap separate read and write descriptors
    pub fn from_pair(read: OwnedFd, write: OwnedFd) -> Self {
        Self {
            reader: File::from(read),
            writer: File::from(write),
        }
    }

    /// Take over the superserver descriptors.
    ///
    /// Both descriptors are checked for validity and marked close-on-exec so
    /// they do not leak into the worker.
    pub fn inherited() -> Result<Self> {
        for fd in [UCSPI_READ_FD, UCSPI_WRITE_FD] {
            fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
                .map_err(|source| RelayError::InheritedDescriptor { fd, source })?;
        }
        debug!("adopted ucspi descriptors");
        // SAFETY: both descriptors were just verified open, and nothing else
        // in the process owns them.
        let (read, write) = unsafe {
            (
                OwnedFd::from_raw_fd(UCSPI_READ_FD),
                OwnedFd::from_raw_fd(UCSPI_WRITE_FD),
            )
        };
        Ok(Self::from_pair(read, write))
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Readiness is watched on the read side
impl AsFd for Connection {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

/// Resolve `host:port` and connect to the first address that accepts.
pub fn dial(host: &str, port: &str) -> Result<Connection> {
    let resolve_err = |source| RelayError::Resolve {
        host: host.to_string(),
        port: port.to_string(),
        source,
    };
    let port_num: u16 = port
        .parse()
        .map_err(|_| resolve_err(io::Error::new(io::ErrorKind::InvalidInput, "invalid port")))?;
    let addrs = (host, port_num).to_socket_addrs().map_err(resolve_err)?;

    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                info!(%addr, "connected");
                return Connection::from_stream(stream).map_err(|source| {
                    RelayError::ConnectionSetup {
                        host: host.to_string(),
                        port: port.to_string(),
                        source,
                    }
                });
            }
            Err(e) => debug!(%addr, error = %e, "connect failed"),
        }
    }

    Err(RelayError::Connect {
        host: host.to_string(),
        port: port.to_string(),
    })
}
