//! Bounded line reading
//!
//! Lines are read one byte at a time so nothing past the terminator is taken
//! from the descriptor; the next readiness wait then reflects exactly what is
//! still pending. The bound matches the IRC message limit of 512 bytes
//! including the terminator, leaving 511 bytes of content.

use std::fmt;
use std::io::{self, ErrorKind, Read};

/// Maximum size of a protocol message, terminator included
pub const MAX_LINE: usize = 512;

/// One line of input with its terminator removed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line(Vec<u8>);

impl Line {
    /// Build a line from raw bytes, truncating to the content bound
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let mut bytes = bytes.into();
        bytes.truncate(MAX_LINE - 1);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Line {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Read a single `\n` terminated line from `source`.
///
/// A `\r` directly before the terminator is dropped. Content past
/// `MAX_LINE - 1` bytes is discarded up to the terminator and the truncated
/// line is returned. Returns `Ok(None)` when the source reaches end of
/// stream before a terminator; any bytes of an unterminated tail are lost.
pub fn read_line<R: Read + ?Sized>(source: &mut R) -> io::Result<Option<Line>> {
    let mut buf = Vec::with_capacity(MAX_LINE);
    let mut byte = [0u8; 1];

    loop {
        match source.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                if byte[0] == b'\n' {
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                    return Ok(Some(Line(buf)));
                }
                if buf.len() < MAX_LINE - 1 {
                    buf.push(byte[0]);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Read a single `\n` terminated line from `source`, terminator included.
///
/// The bytes come back as written: a `\r\n` stays `\r\n` and a bare `\n`
/// stays `\n`. Content is cut so that the whole line, terminator included,
/// fits in `MAX_LINE` bytes. End of stream behaves as in [`read_line`].
pub fn read_raw_line<R: Read + ?Sized>(source: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::with_capacity(MAX_LINE);
    let mut byte = [0u8; 1];
    // A `\r` is held back until we know whether it starts the terminator.
    let mut pending_cr = false;

    loop {
        match source.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                if byte[0] == b'\n' {
                    let terminator: &[u8] = if pending_cr { b"\r\n" } else { b"\n" };
                    buf.truncate(MAX_LINE - terminator.len());
                    buf.extend_from_slice(terminator);
                    return Ok(Some(buf));
                }
                if pending_cr && buf.len() < MAX_LINE {
                    buf.push(b'\r');
                }
                pending_cr = byte[0] == b'\r';
                if !pending_cr && buf.len() < MAX_LINE {
                    buf.push(byte[0]);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_lf_terminated_line() {
        let mut src = Cursor::new(b"NICK alice\n".to_vec());
        let line = read_line(&mut src).unwrap().unwrap();
        assert_eq!(line.as_bytes(), b"NICK alice");
    }

    #[test]
    fn test_strips_crlf() {
        let mut src = Cursor::new(b"PRIVMSG #chan :hi\r\n".to_vec());
        let line = read_line(&mut src).unwrap().unwrap();
        assert_eq!(line.as_bytes(), b"PRIVMSG #chan :hi");
    }

    #[test]
    fn test_only_trailing_cr_is_stripped() {
        let mut src = Cursor::new(b"a\rb\r\r\n".to_vec());
        let line = read_line(&mut src).unwrap().unwrap();
        assert_eq!(line.as_bytes(), b"a\rb\r");
    }

    #[test]
    fn test_consumes_one_line_per_call() {
        let mut src = Cursor::new(b"first\nsecond\n".to_vec());
        assert_eq!(read_line(&mut src).unwrap().unwrap().as_bytes(), b"first");
        assert_eq!(src.position(), 6);
        assert_eq!(read_line(&mut src).unwrap().unwrap().as_bytes(), b"second");
    }

    #[test]
    fn test_empty_line() {
        let mut src = Cursor::new(b"\r\n".to_vec());
        assert!(read_line(&mut src).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_long_line_truncated_to_bound() {
        let mut input = vec![b'x'; 2000];
        input.push(b'\n');
        input.extend_from_slice(b"next\n");
        let mut src = Cursor::new(input);

        let line = read_line(&mut src).unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE - 1);
        // The remainder of the long line is dropped, not split.
        assert_eq!(read_line(&mut src).unwrap().unwrap().as_bytes(), b"next");
    }

    #[test]
    fn test_end_of_stream() {
        let mut src = Cursor::new(Vec::new());
        assert!(read_line(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_unterminated_tail_is_end_of_stream() {
        let mut src = Cursor::new(b"partial".to_vec());
        assert!(read_line(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_would_block_is_an_error() {
        struct Empty;
        impl Read for Empty {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(ErrorKind::WouldBlock))
            }
        }
        let err = read_line(&mut Empty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        struct Flaky {
            interrupted: bool,
            inner: Cursor<Vec<u8>>,
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::Error::from(ErrorKind::Interrupted));
                }
                self.inner.read(buf)
            }
        }
        let mut src = Flaky {
            interrupted: false,
            inner: Cursor::new(b"PING :x\r\n".to_vec()),
        };
        assert_eq!(read_line(&mut src).unwrap().unwrap().as_bytes(), b"PING :x");
    }

    #[test]
    fn test_new_truncates() {
        let line = Line::new(vec![b'a'; 600]);
        assert_eq!(line.len(), MAX_LINE - 1);
    }

    #[test]
    fn test_raw_line_keeps_lf_terminator() {
        let mut src = Cursor::new(b"NICK alice\nUSER a 0 * :a\r\n".to_vec());
        assert_eq!(read_raw_line(&mut src).unwrap().unwrap(), b"NICK alice\n");
        assert_eq!(read_raw_line(&mut src).unwrap().unwrap(), b"USER a 0 * :a\r\n");
        assert!(read_raw_line(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_raw_line_keeps_inner_carriage_returns() {
        let mut src = Cursor::new(b"a\rb\r\r\n".to_vec());
        assert_eq!(read_raw_line(&mut src).unwrap().unwrap(), b"a\rb\r\r\n");
    }

    #[test]
    fn test_raw_line_fits_protocol_limit() {
        let mut input = vec![b'x'; 600];
        input.extend_from_slice(b"\r\n");
        input.extend_from_slice(&[b'y'; 511]);
        input.push(b'\n');
        let mut src = Cursor::new(input);

        let crlf = read_raw_line(&mut src).unwrap().unwrap();
        assert_eq!(crlf.len(), MAX_LINE);
        assert!(crlf.ends_with(b"x\r\n"));

        let lf = read_raw_line(&mut src).unwrap().unwrap();
        assert_eq!(lf.len(), MAX_LINE);
        assert!(lf.ends_with(b"y\n"));
    }
}
