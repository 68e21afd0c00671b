//! Chunk-size line consumer: `<hex-digits> CRLF`.
//!
//! Chunk extensions (`; name=value` after the size) are not supported.
//! Per the original parser's behavior, anything between the hex digits and
//! the line terminator other than pure hex digits is rejected outright as
//! a malformed chunk size, rather than being parsed and discarded.

use consume::{Consumer, ConsumerState, ParseError};
use status::StatusCode;

/// Maximum hex digits accepted for a chunk size: `size_t` on a 64-bit
/// platform is 8 bytes, i.e. 16 nibbles. A chunk size needing more digits
/// than that cannot be represented and is rejected.
const MAX_NIBS: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Digit,
    Newline,
}

pub struct ChunkLineConsumer {
    state: ConsumerState,
    phase: Phase,
    nibs: usize,
    val: u64,
}

impl ChunkLineConsumer {
    pub fn new() -> ChunkLineConsumer {
        ChunkLineConsumer {
            state: ConsumerState::new(),
            phase: Phase::Digit,
            nibs: 0,
            val: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.phase = Phase::Digit;
        self.nibs = 0;
        self.val = 0;
    }

    pub fn chunk_size(&self) -> u64 {
        self.val
    }
}

fn hex_value(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'a'..=b'f' => Some((b - b'a' + 10) as u64),
        b'A'..=b'F' => Some((b - b'A' + 10) as u64),
        _ => None,
    }
}

impl Consumer for ChunkLineConsumer {
    fn consume(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;
        for &b in buf {
            consumed += 1;
            match self.phase {
                Phase::Digit => {
                    if let Some(v) = hex_value(b) {
                        if self.nibs >= MAX_NIBS {
                            self.state.set_error(StatusCode::BadRequest, "chunk size too large");
                        } else {
                            self.val = self.val * 16 + v;
                            self.nibs += 1;
                        }
                    } else if b == b'\r' {
                        if self.nibs == 0 {
                            self.state.set_error(StatusCode::BadRequest, "invalid chunk size");
                        } else {
                            self.phase = Phase::Newline;
                        }
                    } else if b == b'\n' {
                        if self.nibs == 0 {
                            self.state.set_error(StatusCode::BadRequest, "invalid chunk size");
                        } else {
                            self.state.mark_done();
                        }
                    } else {
                        // chunk extensions and anything else are rejected
                        self.state.set_error(StatusCode::BadRequest, "invalid chunk size");
                    }
                }
                Phase::Newline => {
                    if b == b'\n' {
                        self.state.mark_done();
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "expected newline after chunk size");
                    }
                }
            }
            if self.state.is_done() {
                break;
            }
        }
        match self.state.error() {
            Some(e) => Err(e),
            None => Ok(consumed),
        }
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

#[cfg(test)]
mod test {
    use super::ChunkLineConsumer;
    use consume::Consumer;

    #[test]
    fn parses_hex_chunk_size() {
        let mut c = ChunkLineConsumer::new();
        let n = c.consume(b"1a\r\ndata...").unwrap();
        assert_eq!(n, 4);
        assert_eq!(c.chunk_size(), 0x1a);
    }

    #[test]
    fn accepts_bare_lf() {
        let mut c = ChunkLineConsumer::new();
        c.consume(b"0\n").unwrap();
        assert_eq!(c.chunk_size(), 0);
    }

    #[test]
    fn rejects_chunk_extensions() {
        let mut c = ChunkLineConsumer::new();
        let err = c.consume(b"4;ext=1\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }

    #[test]
    fn rejects_empty_size() {
        let mut c = ChunkLineConsumer::new();
        let err = c.consume(b"\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }
}
