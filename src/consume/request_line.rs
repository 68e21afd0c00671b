//! Request-line consumer: `METHOD SP Request-URI SP HTTP/M.N CRLF`.

use consume::{Consumer, ConsumerState, ParseError};
use consume::token::is_token;
use status::StatusCode;
use uri::{self, Uri};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Method,
    Uri,
    Version,
}

/// Parses a single HTTP/1.x request line.
///
/// The byte-count length limit (set via `set_length_limit`) covers the
/// *entire* line, method through the version string — matching a
/// preserved quirk of the original parser: a request line that overflows
/// the limit while still inside the version field is reported as
/// `RequestUriTooLong`, the same status used for an overlong URI, rather
/// than some more specific "request line too long" status. Callers relying
/// on the status code to distinguish the two cases will not be able to.
pub struct RequestLineConsumer {
    state: ConsumerState,
    phase: Phase,
    method: String,
    uri_str: String,
    uri: Uri,
    version_str: String,
    major_version: u16,
    minor_version: u16,
}

impl RequestLineConsumer {
    pub fn new() -> RequestLineConsumer {
        RequestLineConsumer {
            state: ConsumerState::new(),
            phase: Phase::Method,
            method: String::new(),
            uri_str: String::new(),
            uri: Uri::new(),
            version_str: String::new(),
            major_version: 0,
            minor_version: 0,
        }
    }

    pub fn set_length_limit(&mut self, n: u64) {
        self.state.set_length_limit(n);
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.phase = Phase::Method;
        self.method.clear();
        self.uri_str.clear();
        self.uri = Uri::new();
        self.version_str.clear();
        self.major_version = 0;
        self.minor_version = 0;
    }

    /// Consumes `self`, handing back the parsed fields for the caller to
    /// move into a `Request`. The URI reference was already validated and
    /// parsed during `consume()`.
    pub fn into_parts(self) -> (String, Uri, u16, u16) {
        (self.method, self.uri, self.major_version, self.minor_version)
    }

    fn too_long(&mut self) {
        self.state.set_error(StatusCode::RequestUriTooLong, "request-URI too long");
    }

    fn finish_version(&mut self) -> bool {
        if self.version_str.len() < 8 || &self.version_str[..5] != "HTTP/" {
            self.state.set_error(StatusCode::BadRequest, "malformed HTTP version");
            return false;
        }
        let rest = &self.version_str[5..];
        let mut parts = rest.splitn(2, '.');
        let major = parts.next().unwrap_or("");
        let minor = parts.next().unwrap_or("");
        let major_n: u16 = match major.parse() {
            Ok(n) => n,
            Err(_) => {
                self.state.set_error(StatusCode::BadRequest, "malformed HTTP version");
                return false;
            }
        };
        let minor_n: u16 = match minor.parse() {
            Ok(n) => n,
            Err(_) => {
                self.state.set_error(StatusCode::BadRequest, "malformed HTTP version");
                return false;
            }
        };
        self.major_version = major_n;
        self.minor_version = minor_n;
        true
    }
}

impl Consumer for RequestLineConsumer {
    fn consume(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;
        for &b in buf {
            if !self.state.increase_length(1) {
                self.too_long();
                consumed += 1;
                break;
            }
            consumed += 1;
            match self.phase {
                Phase::Method => {
                    if b == b' ' {
                        if self.method.is_empty() {
                            self.state.set_error(StatusCode::BadRequest, "empty method");
                        } else {
                            self.phase = Phase::Uri;
                        }
                    } else if is_token(b) {
                        self.method.push(b as char);
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid method token");
                    }
                }
                Phase::Uri => {
                    if b == b' ' {
                        if self.uri_str.is_empty() {
                            self.state.set_error(StatusCode::BadRequest, "missing request line URI reference");
                        } else if uri::parse_uri_reference(&mut self.uri, &self.uri_str) {
                            self.phase = Phase::Version;
                        } else {
                            self.state.set_error(StatusCode::BadRequest, "invalid request line URI reference");
                        }
                    } else if b < 0x20 || b == 0x7f {
                        self.state.set_error(StatusCode::BadRequest, "invalid request line URI reference");
                    } else {
                        self.uri_str.push(b as char);
                    }
                }
                Phase::Version => {
                    if b == b'\n' {
                        if self.version_str.ends_with('\r') {
                            let trimmed_len = self.version_str.len() - 1;
                            self.version_str.truncate(trimmed_len);
                        }
                        if self.finish_version() {
                            self.state.mark_done();
                        }
                    } else if b < 0x20 && b != b'\r' {
                        self.state.set_error(StatusCode::BadRequest, "invalid HTTP version");
                    } else {
                        self.version_str.push(b as char);
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
    use super::RequestLineConsumer;
    use consume::Consumer;

    #[test]
    fn parses_minimal_get() {
        let mut c = RequestLineConsumer::new();
        let n = c.consume(b"GET / HTTP/1.1\r\nHost:").unwrap();
        assert!(c.is_done());
        assert_eq!(n, "GET / HTTP/1.1\r\n".len());
        let (method, uri, major, minor) = c.into_parts();
        assert_eq!(method, "GET");
        assert_eq!(uri.path, "/");
        assert_eq!((major, minor), (1, 1));
    }

    #[test]
    fn byte_at_a_time_matches_whole_buffer() {
        let input = b"POST /foo?x=1 HTTP/1.0\r\n";
        let mut whole = RequestLineConsumer::new();
        let n_whole = whole.consume(input).unwrap();

        let mut piecewise = RequestLineConsumer::new();
        let mut consumed = 0;
        for b in input {
            if piecewise.is_done() {
                break;
            }
            consumed += piecewise.consume(&[*b]).unwrap();
        }
        assert_eq!(n_whole, consumed);
        assert_eq!(whole.into_parts().0, piecewise.into_parts().0);
    }

    #[test]
    fn rejects_bad_version() {
        let mut c = RequestLineConsumer::new();
        let err = c.consume(b"GET / HTTP/x.y\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }

    #[test]
    fn overlong_line_reports_request_uri_too_long_even_in_version() {
        let mut c = RequestLineConsumer::new();
        c.set_length_limit(10);
        let err = c.consume(b"GET / HTTP/1.1\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::RequestUriTooLong);
    }

    #[test]
    fn rejects_malformed_uri_reference() {
        let mut c = RequestLineConsumer::new();
        let err = c.consume(b"GET //[::1 HTTP/1.1\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }

    #[test]
    fn accepts_any_non_negative_version() {
        let mut c = RequestLineConsumer::new();
        c.consume(b"GET / HTTP/2.0\r\n").unwrap();
        assert!(c.is_done());
        assert_eq!(c.into_parts().2, 2);
    }
}
