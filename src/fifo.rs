//! Command FIFO, normally at `<dir>/<host>/in`
//!
//! The FIFO is opened for reading and writing at once. Holding a write end
//! ourselves means the read side never sees end of file when the last
//! external writer goes away, so a failed read here only ever means "no
//! data right now".

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::line::{self, Line};

const DIR_MODE: u32 = 0o777;

/// The user command channel
#[derive(Debug)]
pub struct Fifo {
    path: PathBuf,
    file: File,
}

impl Fifo {
    /// Create (if needed) and open the FIFO at `path`.
    ///
    /// The directory holding it is created one level deep; its parent must
    /// exist. Pre-existing directory or FIFO is fine.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(session_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(session_dir)?;
        }

        let path = path.to_path_buf();
        create_fifo(&path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| RelayError::OpenFifo {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "fifo open");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one pending command.
    ///
    /// `None` means nothing complete was available; this is never fatal.
    pub fn read_command(&mut self) -> Option<Line> {
        match line::read_line(&mut self.file) {
            Ok(line) => line,
            Err(e) => {
                if e.kind() != ErrorKind::WouldBlock {
                    debug!(error = %e, "fifo read failed");
                }
                None
            }
        }
    }
}

impl AsFd for Fifo {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

fn create_dir(path: &Path) -> Result<()> {
    match DirBuilder::new().mode(DIR_MODE).create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(RelayError::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn create_fifo(path: &Path) -> Result<()> {
    match mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR) {
        Ok(()) | Err(Errno::EEXIST) => Ok(()),
        Err(source) => Err(RelayError::CreateFifo {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether `path` is a FIFO
pub fn is_fifo(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::FileTypeExt;

    Ok(std::fs::metadata(path)?.file_type().is_fifo())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn fifo_in(base: &Path, host: &str) -> PathBuf {
        base.join(host).join("in")
    }

    #[test]
    fn test_creates_directory_and_fifo() {
        let tmp = TempDir::new().unwrap();
        let fifo = Fifo::open(&fifo_in(tmp.path(), "irc.example.org")).unwrap();

        assert_eq!(fifo.path(), tmp.path().join("irc.example.org").join("in"));
        assert!(tmp.path().join("irc.example.org").is_dir());
        assert!(is_fifo(fifo.path()).unwrap());
    }

    #[test]
    fn test_fifo_mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let fifo = Fifo::open(&fifo_in(tmp.path(), "host")).unwrap();
        let mode = std::fs::metadata(fifo.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_empty_fifo_reads_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut fifo = Fifo::open(&fifo_in(tmp.path(), "host")).unwrap();
        assert!(fifo.read_command().is_none());
    }

    #[test]
    fn test_reads_written_command() {
        let tmp = TempDir::new().unwrap();
        let mut fifo = Fifo::open(&fifo_in(tmp.path(), "host")).unwrap();

        let mut writer = OpenOptions::new().write(true).open(fifo.path()).unwrap();
        writer.write_all(b"JOIN #rust\n").unwrap();

        assert_eq!(fifo.read_command().unwrap().as_bytes(), b"JOIN #rust");
        assert!(fifo.read_command().is_none());
    }

    #[test]
    fn test_closing_writers_is_not_end_of_stream() {
        let tmp = TempDir::new().unwrap();
        let mut fifo = Fifo::open(&fifo_in(tmp.path(), "host")).unwrap();

        {
            let mut writer = OpenOptions::new().write(true).open(fifo.path()).unwrap();
            writer.write_all(b"QUIT\n").unwrap();
        }

        assert_eq!(fifo.read_command().unwrap().as_bytes(), b"QUIT");
        // Every external writer is gone; still just "no data".
        assert!(fifo.read_command().is_none());
        assert!(fifo.read_command().is_none());
    }

    #[test]
    fn test_missing_base_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = Fifo::open(&fifo_in(&missing, "host")).unwrap_err();
        assert!(matches!(err, RelayError::CreateDir { .. }));
    }

    #[test]
    fn test_regular_file_in_the_way_is_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("host"), b"").unwrap();
        let err = Fifo::open(&fifo_in(tmp.path(), "host")).unwrap_err();
        assert!(matches!(
            err,
            RelayError::CreateDir { .. } | RelayError::CreateFifo { .. }
        ));
    }
}
