//! Non-blocking line framing
//!
//! Assembles carriage-return terminated lines from whatever bytes a single
//! non-blocking read returns. The framer only frames; it never interprets the
//! content of a line.

use std::collections::VecDeque;
use std::io::{self, Read};

use super::{LINE_TERMINATOR, MAX_LINE_LENGTH};

/// Size of the scratch buffer used for one read
const READ_CHUNK: usize = 64;

/// Result of one framing attempt
#[derive(Debug)]
pub enum ReadOutcome {
    /// Nothing complete yet, try again when the port is readable
    NoData,
    /// A complete line, terminator stripped
    Line(String),
    /// The device returned a zero length read
    EndOfStream,
    /// The read failed for a reason other than "would block"
    Error(io::Error),
}

/// Per-connection line accumulator
#[derive(Debug, Default)]
pub struct LineFramer {
    partial: Vec<u8>,
    ready: VecDeque<String>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any partially received line and queued lines
    pub fn reset(&mut self) {
        self.partial.clear();
        self.ready.clear();
    }

    /// Number of bytes buffered for the line in progress
    pub fn pending_bytes(&self) -> usize {
        self.partial.len()
    }

    /// Perform at most one read and return the next complete line, if any.
    ///
    /// Lines already completed by an earlier read are returned first without
    /// touching the reader.
    pub fn try_read_line<R: Read + ?Sized>(&mut self, reader: &mut R) -> ReadOutcome {
        if let Some(line) = self.ready.pop_front() {
            return ReadOutcome::Line(line);
        }

        let mut chunk = [0u8; READ_CHUNK];
        match reader.read(&mut chunk) {
            Ok(0) => ReadOutcome::EndOfStream,
            Ok(n) => {
                self.feed(&chunk[..n]);
                match self.ready.pop_front() {
                    Some(line) => ReadOutcome::Line(line),
                    None => ReadOutcome::NoData,
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                ReadOutcome::NoData
            }
            Err(e) => {
                self.partial.clear();
                ReadOutcome::Error(e)
            }
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                LINE_TERMINATOR => {
                    let line = String::from_utf8_lossy(&self.partial).into_owned();
                    self.partial.clear();
                    self.ready.push_back(line);
                }
                b'\n' => {}
                _ if self.partial.len() < MAX_LINE_LENGTH => self.partial.push(b),
                // Over-long line: drop the excess
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out one scripted result per read call
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::WouldBlock, "empty")),
            }
        }
    }

    fn scripted(items: Vec<io::Result<&[u8]>>) -> Scripted {
        Scripted(items.into_iter().map(|r| r.map(|b| b.to_vec())).collect())
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut reader = scripted(vec![Ok(b"A=1 T="), Ok(b"72\r")]);
        let mut framer = LineFramer::new();

        assert!(matches!(framer.try_read_line(&mut reader), ReadOutcome::NoData));
        match framer.try_read_line(&mut reader) {
            ReadOutcome::Line(line) => assert_eq!(line, "A=1 T=72"),
            other => panic!("expected line, got {:?}", other),
        }
        assert_eq!(framer.pending_bytes(), 0);
    }

    #[test]
    fn test_two_lines_in_one_read() {
        let mut reader = scripted(vec![Ok(b"A=1 T=70\rA=2 T=71\r")]);
        let mut framer = LineFramer::new();

        let first = framer.try_read_line(&mut reader);
        let second = framer.try_read_line(&mut reader);
        assert!(matches!(first, ReadOutcome::Line(ref l) if l == "A=1 T=70"));
        assert!(matches!(second, ReadOutcome::Line(ref l) if l == "A=2 T=71"));
        assert!(matches!(framer.try_read_line(&mut reader), ReadOutcome::NoData));
    }

    #[test]
    fn test_zero_read_is_end_of_stream() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        let mut framer = LineFramer::new();
        assert!(matches!(framer.try_read_line(&mut reader), ReadOutcome::EndOfStream));
    }

    #[test]
    fn test_timeouts_are_no_data() {
        let mut reader = scripted(vec![
            Err(io::Error::new(io::ErrorKind::TimedOut, "t")),
            Err(io::Error::new(io::ErrorKind::WouldBlock, "w")),
        ]);
        let mut framer = LineFramer::new();
        assert!(matches!(framer.try_read_line(&mut reader), ReadOutcome::NoData));
        assert!(matches!(framer.try_read_line(&mut reader), ReadOutcome::NoData));
    }

    #[test]
    fn test_read_error_resets_partial_line() {
        let mut reader = scripted(vec![
            Ok(b"A=1"),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
        ]);
        let mut framer = LineFramer::new();
        framer.try_read_line(&mut reader);
        assert_eq!(framer.pending_bytes(), 3);
        assert!(matches!(framer.try_read_line(&mut reader), ReadOutcome::Error(_)));
        assert_eq!(framer.pending_bytes(), 0);
    }

    #[test]
    fn test_overlong_line_is_truncated() {
        let long = vec![b'X'; MAX_LINE_LENGTH + 40];
        let mut framer = LineFramer::new();
        framer.feed(&long);
        framer.feed(b"\r");
        let line = framer.ready.pop_front().unwrap();
        assert_eq!(line.len(), MAX_LINE_LENGTH);
    }

    #[test]
    fn test_linefeeds_ignored() {
        let mut framer = LineFramer::new();
        framer.feed(b"A=1 M=H\r\n");
        assert_eq!(framer.ready.pop_front().as_deref(), Some("A=1 M=H"));
        assert_eq!(framer.pending_bytes(), 0);
    }
}
