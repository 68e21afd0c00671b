//! Header-block consumer: a sequence of `Name: Value` lines terminated by a
//! blank line, with RFC 2616 §2.2 line folding (a continuation line starts
//! with SP or HTAB and collapses into the previous value, joined by a
//! single space).

use consume::{Consumer, ConsumerState, ParseError};
use consume::token::{is_valid_header_name, is_header_value_byte};
use header_map::HeaderMap;
use status::StatusCode;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    StartLine,
    EndNewline,
    Name,
    PreValue,
    Value,
    ValueNewline,
}

pub struct HeadersConsumer {
    state: ConsumerState,
    phase: Phase,
    headers: HeaderMap,
    name: String,
    value: String,
    has_pending: bool,
}

impl HeadersConsumer {
    pub fn new() -> HeadersConsumer {
        HeadersConsumer {
            state: ConsumerState::new(),
            phase: Phase::StartLine,
            headers: HeaderMap::new(),
            name: String::new(),
            value: String::new(),
            has_pending: false,
        }
    }

    pub fn set_length_limit(&mut self, n: u64) {
        self.state.set_length_limit(n);
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.phase = Phase::StartLine;
        self.headers.clear();
        self.name.clear();
        self.value.clear();
        self.has_pending = false;
    }

    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    fn finalize_pending(&mut self) {
        if self.has_pending {
            let name = ::std::mem::replace(&mut self.name, String::new());
            let mut value = ::std::mem::replace(&mut self.value, String::new());
            rtrim_ows(&mut value);
            self.headers.append(name, value);
            self.has_pending = false;
        }
    }
}

/// Right-trims trailing SP/HTAB (OWS) in place.
fn rtrim_ows(s: &mut String) {
    let trimmed_len = s.trim_end_matches(|c| c == ' ' || c == '\t').len();
    s.truncate(trimmed_len);
}

impl Consumer for HeadersConsumer {
    fn consume(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;
        for &b in buf {
            if !self.state.increase_length(1) {
                self.state.set_error(StatusCode::BadRequest, "message too long");
                consumed += 1;
                break;
            }
            consumed += 1;
            match self.phase {
                Phase::StartLine => {
                    if self.has_pending && (b == b' ' || b == b'\t') {
                        self.value.push(' ');
                        self.phase = Phase::PreValue;
                    } else {
                        self.finalize_pending();
                        if b == b'\r' {
                            self.phase = Phase::EndNewline;
                        } else if b == b'\n' {
                            self.state.mark_done();
                        } else if is_header_value_byte(b) {
                            self.name.push(b as char);
                            self.phase = Phase::Name;
                        } else {
                            self.state.set_error(StatusCode::BadRequest, "invalid message header");
                        }
                    }
                }
                Phase::EndNewline => {
                    if b == b'\n' {
                        self.state.mark_done();
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid message header");
                    }
                }
                Phase::Name => {
                    if b == b':' {
                        rtrim_ows(&mut self.name);
                        if !is_valid_header_name(self.name.as_bytes()) {
                            self.state.set_error(StatusCode::BadRequest, "invalid message header");
                        } else {
                            self.phase = Phase::PreValue;
                        }
                    } else if is_header_value_byte(b) {
                        self.name.push(b as char);
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid message header");
                    }
                }
                Phase::PreValue => {
                    if b == b' ' || b == b'\t' {
                        // skip leading linear whitespace
                    } else if b == b'\r' {
                        self.phase = Phase::ValueNewline;
                    } else if b == b'\n' {
                        self.has_pending = true;
                        self.phase = Phase::StartLine;
                    } else if is_header_value_byte(b) {
                        self.value.push(b as char);
                        self.phase = Phase::Value;
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid message header");
                    }
                }
                Phase::Value => {
                    if b == b'\r' {
                        self.phase = Phase::ValueNewline;
                    } else if b == b'\n' {
                        self.has_pending = true;
                        self.phase = Phase::StartLine;
                    } else if is_header_value_byte(b) {
                        self.value.push(b as char);
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid message header");
                    }
                }
                Phase::ValueNewline => {
                    if b == b'\n' {
                        self.has_pending = true;
                        self.phase = Phase::StartLine;
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid message header");
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
    use super::HeadersConsumer;
    use consume::Consumer;

    #[test]
    fn parses_headers_and_stops_at_blank_line() {
        let mut c = HeadersConsumer::new();
        let input = b"Host: example.com\r\nContent-Length: 5\r\n\r\nbody...";
        let n = c.consume(input).unwrap();
        assert!(c.is_done());
        assert_eq!(n, input.len() - "body...".len());
        let headers = c.into_headers();
        assert_eq!(headers.get("host"), Some("example.com"));
        assert_eq!(headers.get("content-length"), Some("5"));
    }

    #[test]
    fn folds_continuation_lines() {
        let mut c = HeadersConsumer::new();
        c.consume(b"X-Long: first\r\n second\r\n\tthird\r\n\r\n").unwrap();
        let headers = c.into_headers();
        assert_eq!(headers.get("x-long"), Some("first second third"));
    }

    #[test]
    fn empty_header_block() {
        let mut c = HeadersConsumer::new();
        let n = c.consume(b"\r\nbody").unwrap();
        assert!(c.is_done());
        assert_eq!(n, 2);
        assert!(c.into_headers().is_empty());
    }

    #[test]
    fn repeated_header_names_preserved() {
        let mut c = HeadersConsumer::new();
        c.consume(b"Set-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n").unwrap();
        let headers = c.into_headers();
        let vals: Vec<_> = headers.get_all("set-cookie").collect();
        assert_eq!(vals, vec!["a=1", "b=2"]);
    }

    #[test]
    fn trailing_value_whitespace_is_trimmed() {
        let mut c = HeadersConsumer::new();
        c.consume(b"X-Pad: value   \r\n\r\n").unwrap();
        let headers = c.into_headers();
        assert_eq!(headers.get("x-pad"), Some("value"));
    }

    #[test]
    fn rejects_header_name_with_interior_whitespace() {
        let mut c = HeadersConsumer::new();
        let err = c.consume(b"Bad Name: value\r\n\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }

    #[test]
    fn trailing_name_whitespace_before_colon_is_trimmed() {
        let mut c = HeadersConsumer::new();
        c.consume(b"X-Pad  : value\r\n\r\n").unwrap();
        let headers = c.into_headers();
        assert_eq!(headers.get("x-pad"), Some("value"));
    }

    #[test]
    fn length_limit_overflow_reports_message_too_long() {
        let mut c = HeadersConsumer::new();
        c.set_length_limit(4);
        let err = c.consume(b"Host: example.com\r\n\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
        assert_eq!(err.message, "message too long");
    }
}
