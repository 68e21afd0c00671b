//! Message-body consumer, covering all three HTTP/1.x body framings:
//! fixed-length (`Content-Length`), chunked (`Transfer-Encoding: chunked`),
//! and read-until-close (legacy HTTP/1.0 responses with neither header).

use consume::{Consumer, ConsumerState, ParseError};
use consume::chunk::ChunkLineConsumer;
use consume::headers::HeadersConsumer;
use header_map::HeaderMap;
use status::StatusCode;

/// Which of the three body framings this consumer is decoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyMode {
    /// Exactly `n` bytes of body, per `Content-Length`.
    Fixed(u64),
    /// Read until the peer closes the connection. The consumer never
    /// reports itself done on its own; the caller must call `finish()`
    /// once it observes end-of-stream.
    Infinite,
    /// `Transfer-Encoding: chunked`.
    Chunked,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ChunkPhase {
    Size,
    Data,
    DataCr,
    DataLf,
    Trailers,
}

pub struct BodyConsumer {
    state: ConsumerState,
    mode: BodyMode,
    remaining: u64,
    chunk_phase: ChunkPhase,
    chunk_line: ChunkLineConsumer,
    trailers: HeadersConsumer,
    body: Vec<u8>,
}

impl BodyConsumer {
    pub fn new(mode: BodyMode) -> BodyConsumer {
        let remaining = match mode {
            BodyMode::Fixed(n) => n,
            _ => 0,
        };
        let mut consumer = BodyConsumer {
            state: ConsumerState::new(),
            mode: mode,
            remaining: remaining,
            chunk_phase: ChunkPhase::Size,
            chunk_line: ChunkLineConsumer::new(),
            trailers: HeadersConsumer::new(),
            body: Vec::new(),
        };
        if let BodyMode::Fixed(0) = mode {
            consumer.state.mark_done();
        }
        consumer
    }

    pub fn set_length_limit(&mut self, n: u64) {
        self.state.set_length_limit(n);
    }

    /// For `Infinite` mode: tells the consumer that end-of-stream has been
    /// reached, so whatever has accumulated is the whole body.
    pub fn finish(&mut self) {
        if let BodyMode::Infinite = self.mode {
            self.state.mark_done();
        }
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn into_trailers(self) -> Option<HeaderMap> {
        match self.mode {
            BodyMode::Chunked => Some(self.trailers.into_headers()),
            _ => None,
        }
    }
}

impl Consumer for BodyConsumer {
    fn consume(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut offset = 0;
        while offset < buf.len() && !self.state.is_done() {
            match self.mode {
                BodyMode::Fixed(_) => {
                    let take = ((buf.len() - offset) as u64).min(self.remaining) as usize;
                    if !self.state.increase_length(take as u64) {
                        self.state.set_error(StatusCode::RequestEntityTooLarge, "request body too large");
                        break;
                    }
                    self.body.extend_from_slice(&buf[offset..offset + take]);
                    offset += take;
                    self.remaining -= take as u64;
                    if self.remaining == 0 {
                        self.state.mark_done();
                    }
                }
                BodyMode::Infinite => {
                    let take = buf.len() - offset;
                    if !self.state.increase_length(take as u64) {
                        self.state.set_error(StatusCode::RequestEntityTooLarge, "request body too large");
                        break;
                    }
                    self.body.extend_from_slice(&buf[offset..]);
                    offset = buf.len();
                }
                BodyMode::Chunked => {
                    match self.chunk_phase {
                        ChunkPhase::Size => {
                            let n = self.chunk_line.consume(&buf[offset..])?;
                            offset += n;
                            if self.chunk_line.is_done() {
                                let size = self.chunk_line.chunk_size();
                                self.chunk_line.reset();
                                if size == 0 {
                                    self.chunk_phase = ChunkPhase::Trailers;
                                } else {
                                    self.remaining = size;
                                    self.chunk_phase = ChunkPhase::Data;
                                }
                            }
                        }
                        ChunkPhase::Data => {
                            let take = ((buf.len() - offset) as u64).min(self.remaining) as usize;
                            if !self.state.increase_length(take as u64) {
                                self.state.set_error(StatusCode::RequestEntityTooLarge, "request body too large");
                                break;
                            }
                            self.body.extend_from_slice(&buf[offset..offset + take]);
                            offset += take;
                            self.remaining -= take as u64;
                            if self.remaining == 0 {
                                self.chunk_phase = ChunkPhase::DataCr;
                            }
                        }
                        ChunkPhase::DataCr => {
                            if buf[offset] != b'\r' {
                                self.state.set_error(StatusCode::BadRequest, "malformed chunk terminator");
                            } else {
                                self.chunk_phase = ChunkPhase::DataLf;
                            }
                            offset += 1;
                        }
                        ChunkPhase::DataLf => {
                            if buf[offset] != b'\n' {
                                self.state.set_error(StatusCode::BadRequest, "malformed chunk terminator");
                            } else {
                                self.chunk_phase = ChunkPhase::Size;
                            }
                            offset += 1;
                        }
                        ChunkPhase::Trailers => {
                            let n = self.trailers.consume(&buf[offset..])?;
                            offset += n;
                            if self.trailers.is_done() {
                                self.state.mark_done();
                            }
                        }
                    }
                }
            }
        }
        match self.state.error() {
            Some(e) => Err(e),
            None => Ok(offset),
        }
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

#[cfg(test)]
mod test {
    use super::{BodyConsumer, BodyMode};
    use consume::Consumer;

    #[test]
    fn fixed_length_body() {
        let mut c = BodyConsumer::new(BodyMode::Fixed(5));
        let n = c.consume(b"helloXXXXX").unwrap();
        assert_eq!(n, 5);
        assert!(c.is_done());
        assert_eq!(c.into_body(), b"hello");
    }

    #[test]
    fn zero_length_body_is_immediately_done() {
        let c = BodyConsumer::new(BodyMode::Fixed(0));
        assert!(c.is_done());
    }

    #[test]
    fn chunked_body_with_trailer() {
        let mut c = BodyConsumer::new(BodyMode::Chunked);
        let input = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Trailer: done\r\n\r\n";
        c.consume(input).unwrap();
        assert!(c.is_done());
        assert_eq!(c.into_body(), b"Wikipedia");
    }

    #[test]
    fn chunked_body_splits_across_reads() {
        let input = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let mut whole = BodyConsumer::new(BodyMode::Chunked);
        whole.consume(input).unwrap();

        let mut piecewise = BodyConsumer::new(BodyMode::Chunked);
        for b in input {
            if piecewise.is_done() {
                break;
            }
            piecewise.consume(&[*b]).unwrap();
        }
        assert_eq!(whole.into_body(), piecewise.into_body());
    }

    #[test]
    fn infinite_body_needs_explicit_finish() {
        let mut c = BodyConsumer::new(BodyMode::Infinite);
        c.consume(b"some data").unwrap();
        assert!(!c.is_done());
        c.finish();
        assert!(c.is_done());
        assert_eq!(c.into_body(), b"some data");
    }
}
