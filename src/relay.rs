//! The relay event loop
//!
//! One thread, one readiness wait. Each iteration handles at most one line
//! per ready source, in the fixed order network, FIFO, worker output,
//! signals:
//!
//! - network line → worker stdin as `i <ts> <line>`
//! - FIFO line → worker stdin as `u <ts> <line>`
//! - worker line → network as written, terminator included
//! - forwarded signal → worker stdin as `s <ts> <SIGNAME>`
//!
//! A wait that times out sends a keepalive to the peer, or ends the session
//! once nothing has come from the peer for `LoopSettings::stale_after`.

use std::convert::Infallible;
use std::io::Write;
use std::os::fd::AsFd;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::select::{pselect, FdSet};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::time::TimeSpec;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dial::{self, Connection};
use crate::error::{RelayError, Result};
use crate::event::{Tag, TaggedEvent};
use crate::fifo::Fifo;
use crate::line;
use crate::signal::Signals;
use crate::worker::Worker;

/// Readiness wait timeout
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Silence from the peer after which the session is considered dead
pub const STALE_AFTER: Duration = Duration::from_secs(300);

/// Timing and keepalive parameters of the loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub wait_timeout: Duration,
    pub stale_after: Duration,
    /// Sent verbatim to the peer when a wait times out
    pub keepalive: Vec<u8>,
}

impl LoopSettings {
    pub fn new(keepalive: impl Into<Vec<u8>>) -> Self {
        Self {
            wait_timeout: WAIT_TIMEOUT,
            stale_after: STALE_AFTER,
            keepalive: keepalive.into(),
        }
    }
}

/// Which sources a wait reported
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Ready {
    network: bool,
    fifo: bool,
    worker: bool,
    child: bool,
    notify: bool,
}

#[derive(Debug)]
enum Wait {
    Interrupted,
    TimedOut,
    Ready(Ready),
}

/// The single live session
pub struct Relay {
    network: Connection,
    fifo: Fifo,
    worker: Worker,
    signals: Signals,
    settings: LoopSettings,
    last_activity: Instant,
}

impl Relay {
    /// Assemble a relay from already prepared parts.
    ///
    /// `signals` must have been installed before `worker` was spawned.
    pub fn new(
        network: Connection,
        fifo: Fifo,
        worker: Worker,
        signals: Signals,
        settings: LoopSettings,
    ) -> Self {
        Self {
            network,
            fifo,
            worker,
            signals,
            settings,
            last_activity: Instant::now(),
        }
    }

    /// Set up a session from configuration: FIFO, signal handlers,
    /// network, then the worker.
    ///
    /// Inherited UCSPI descriptors are claimed before anything else is
    /// opened, so a missing 6 or 7 cannot be mistaken for one of ours.
    pub fn start(config: &Config, forward: Option<Signal>) -> Result<Self> {
        let inherited = if config.ucspi {
            Some(Connection::inherited()?)
        } else {
            None
        };

        let fifo = Fifo::open(&config.fifo_path())?;
        let signals = Signals::install(forward)?;

        let network = match inherited {
            Some(network) => network,
            None => dial::dial(&config.host, &config.port)?,
        };

        let worker = Worker::spawn(&config.client, config.worker_env())?;

        info!(
            host = %config.host,
            fifo = %fifo.path().display(),
            "session started"
        );

        Ok(Self::new(
            network,
            fifo,
            worker,
            signals,
            LoopSettings::new(config.keepalive_line()),
        ))
    }

    /// Run until a fatal condition occurs.
    pub fn run(&mut self) -> Result<Infallible> {
        let guard = self.signals.block()?;

        // The worker may already be gone if it exited before its SIGCHLD
        // could be observed by this thread.
        self.worker.check_alive()?;
        self.last_activity = Instant::now();

        loop {
            match self.wait(guard.wait_mask())? {
                Wait::Interrupted => continue,
                Wait::TimedOut => self.on_timeout()?,
                Wait::Ready(ready) => self.dispatch(ready)?,
            }
        }
    }

    fn wait(&self, mask: &SigSet) -> Result<Wait> {
        let network = self.network.as_fd();
        let fifo = self.fifo.as_fd();
        let worker = self.worker.as_fd();
        let child = self.signals.child.as_fd();
        let notify = self.signals.notify.as_ref().map(|n| n.as_fd());

        let mut fds = FdSet::new();
        fds.insert(network);
        fds.insert(fifo);
        fds.insert(worker);
        fds.insert(child);
        if let Some(fd) = notify {
            fds.insert(fd);
        }

        let timeout = TimeSpec::from_duration(self.settings.wait_timeout);
        match pselect(None, &mut fds, None, None, &timeout, mask) {
            Ok(0) => Ok(Wait::TimedOut),
            Ok(_) => Ok(Wait::Ready(Ready {
                network: fds.contains(network),
                fifo: fds.contains(fifo),
                worker: fds.contains(worker),
                child: fds.contains(child),
                notify: notify.map(|fd| fds.contains(fd)).unwrap_or(false),
            })),
            Err(Errno::EINTR) => Ok(Wait::Interrupted),
            Err(e) => Err(RelayError::Select(e)),
        }
    }

    fn on_timeout(&mut self) -> Result<()> {
        if self.last_activity.elapsed() >= self.settings.stale_after {
            return Err(RelayError::PingTimeout);
        }

        debug!("idle, sending keepalive");
        if let Err(e) = self.network.write_all(&self.settings.keepalive) {
            warn!(error = %e, "keepalive write failed");
        }
        Ok(())
    }

    fn dispatch(&mut self, ready: Ready) -> Result<()> {
        if ready.network {
            self.on_network()?;
        }
        if ready.fifo {
            self.on_fifo()?;
        }
        if ready.worker {
            self.on_worker()?;
        }
        if ready.child {
            self.on_child()?;
        }
        if ready.notify {
            self.on_notify()?;
        }
        Ok(())
    }

    fn on_network(&mut self) -> Result<()> {
        self.last_activity = Instant::now();
        let line = match line::read_line(&mut self.network) {
            Ok(Some(line)) => line,
            Ok(None) => return Err(RelayError::RemoteClosed),
            Err(e) => {
                debug!(error = %e, "network read failed");
                return Err(RelayError::RemoteClosed);
            }
        };
        self.worker.send(&TaggedEvent::now(Tag::Inbound, line))
    }

    fn on_fifo(&mut self) -> Result<()> {
        match self.fifo.read_command() {
            Some(line) => self.worker.send(&TaggedEvent::now(Tag::User, line)),
            None => Ok(()),
        }
    }

    fn on_worker(&mut self) -> Result<()> {
        let line = match self.worker.recv() {
            Ok(line) => line,
            Err(RelayError::ClientClosed) => {
                // Report a dead worker as such rather than as a closed pipe.
                self.worker.check_alive()?;
                return Err(RelayError::ClientClosed);
            }
            Err(e) => return Err(e),
        };
        self.network.write_all(&line).map_err(RelayError::ServerWrite)
    }

    fn on_child(&mut self) -> Result<()> {
        self.signals.child.drain();
        // SIGCHLD may come from any child of the process; only ours matters.
        self.worker.check_alive()
    }

    fn on_notify(&mut self) -> Result<()> {
        let Some(notify) = self.signals.notify.as_mut() else {
            return Ok(());
        };
        if !notify.drain() {
            return Ok(());
        }
        let name = notify.signal().as_str();
        debug!(signal = name, "forwarding signal to worker");
        self.worker.send(&TaggedEvent::now(Tag::Signal, name.into()))
    }
}
