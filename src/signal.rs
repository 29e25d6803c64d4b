//! Signals as readable events
//!
//! Each handled signal gets its own socket pair. The asynchronous handler
//! (installed by `signal-hook`, with SA_RESTART and the signal itself
//! blocked while it runs) does nothing but write a byte to the pair; the
//! event loop sees the read end become ready and does the real work on its
//! own thread. Handlers therefore never touch relay state and never nest.
//!
//! The loop thread additionally blocks the handled signals outside of its
//! readiness wait and hands the previous mask to `pselect`, so delivery to
//! that thread can only happen while it is waiting.

use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;

use nix::sys::signal::{SigSet, SigmaskHow, Signal};
use signal_hook::SigId;
use tracing::debug;

use crate::error::{RelayError, Result};

/// Self-pipe for a single signal
#[derive(Debug)]
pub struct SignalPipe {
    signal: Signal,
    reader: UnixStream,
    id: SigId,
}

impl SignalPipe {
    /// Install the handler for `signal`
    pub fn register(signal: Signal) -> Result<Self> {
        let err = |source: io::Error| RelayError::Signal {
            signal: signal.as_str(),
            source,
        };

        let (reader, writer) = UnixStream::pair().map_err(err)?;
        reader.set_nonblocking(true).map_err(err)?;
        writer.set_nonblocking(true).map_err(err)?;

        let id = signal_hook::low_level::pipe::register(signal as libc::c_int, writer)
            .map_err(err)?;

        debug!(signal = signal.as_str(), "handler installed");
        Ok(Self { signal, reader, id })
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Consume every pending notification.
    ///
    /// Returns true if at least one delivery was pending. Several deliveries
    /// between two waits collapse into one.
    pub fn drain(&mut self) -> bool {
        let mut buf = [0u8; 64];
        let mut pending = false;
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return pending,
                Ok(_) => pending = true,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return pending,
            }
        }
    }
}

impl AsFd for SignalPipe {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

impl Drop for SignalPipe {
    fn drop(&mut self) {
        signal_hook::low_level::unregister(self.id);
    }
}

/// The signals the relay reacts to
#[derive(Debug)]
pub struct Signals {
    /// Worker termination
    pub child: SignalPipe,
    /// Optional signal forwarded to the worker as a synthetic event
    pub notify: Option<SignalPipe>,
}

impl Signals {
    /// Install SIGCHLD and, if given, the forwarded signal.
    ///
    /// Must happen before the worker is spawned so an early exit is seen.
    pub fn install(forward: Option<Signal>) -> Result<Self> {
        Ok(Self {
            child: SignalPipe::register(Signal::SIGCHLD)?,
            notify: forward.map(SignalPipe::register).transpose()?,
        })
    }

    /// Set of handled signals
    pub fn mask(&self) -> SigSet {
        let mut set = SigSet::empty();
        set.add(self.child.signal());
        if let Some(notify) = &self.notify {
            set.add(notify.signal());
        }
        set
    }

    /// Block the handled signals in the calling thread.
    ///
    /// The guard restores the previous mask on drop; `wait_mask` is the mask
    /// to install for the duration of the readiness wait.
    pub fn block(&self) -> Result<MaskGuard> {
        let previous = self
            .mask()
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(|errno| RelayError::Signal {
                signal: self.child.signal().as_str(),
                source: io::Error::from(errno),
            })?;
        Ok(MaskGuard { previous })
    }
}

/// Restores a thread's signal mask when dropped
#[derive(Debug)]
pub struct MaskGuard {
    previous: SigSet,
}

impl MaskGuard {
    /// Mask in effect before `Signals::block`
    pub fn wait_mask(&self) -> &SigSet {
        &self.previous
    }
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        if let Err(e) = self.previous.thread_set_mask() {
            debug!(error = %e, "restoring signal mask failed");
        }
    }
}
