//! Composite request consumer: request-line, then headers, then body,
//! assembled into a single `Request`.

use consume::{Consumer, ConsumerState, ParseError};
use consume::request_line::RequestLineConsumer;
use consume::headers::HeadersConsumer;
use consume::body::{BodyConsumer, BodyMode};
use header_map::HeaderMap;
use status::StatusCode;
use uri::Uri;

/// A fully decoded HTTP/1.x request.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub uri: Uri,
    pub major_version: u16,
    pub minor_version: u16,
    pub headers: HeaderMap,
    /// Headers attached after a chunked body's final chunk. Empty unless
    /// the request used chunked transfer coding and actually sent trailers.
    pub trailers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    RequestLine,
    Headers,
    Body,
}

/// Decides how the request body is framed, from the already-parsed
/// headers. `Transfer-Encoding: chunked` wins over `Content-Length` when
/// both are present — the request is not rejected as a conflict, matching
/// the resolution the original parser settled on. A malformed
/// `Content-Length` with no `Transfer-Encoding` present is a `BadRequest`.
pub fn resolve_body_mode(headers: &HeaderMap) -> Result<BodyMode, ParseError> {
    let chunked = headers.get("transfer-encoding")
        .map(|v| v.to_ascii_lowercase().split(',').any(|c| c.trim() == "chunked"))
        .unwrap_or(false);
    if chunked {
        return Ok(BodyMode::Chunked);
    }
    if headers.get_all("content-length").count() > 1 {
        return Err(ParseError::new(StatusCode::BadRequest, "duplicate Content-Length header"));
    }
    match headers.get("content-length") {
        Some(cl) => match cl.trim().parse::<u64>() {
            Ok(n) => Ok(BodyMode::Fixed(n)),
            Err(_) => Err(ParseError::new(StatusCode::BadRequest, "invalid Content-Length")),
        },
        None => Ok(BodyMode::Fixed(0)),
    }
}

pub struct RequestConsumer {
    state: ConsumerState,
    phase: Phase,
    request_line: RequestLineConsumer,
    headers: HeadersConsumer,
    body: Option<BodyConsumer>,
    method: String,
    uri: Uri,
    major_version: u16,
    minor_version: u16,
    header_map: HeaderMap,
    max_body_size: Option<u64>,
}

impl RequestConsumer {
    pub fn new() -> RequestConsumer {
        RequestConsumer {
            state: ConsumerState::new(),
            phase: Phase::RequestLine,
            request_line: RequestLineConsumer::new(),
            headers: HeadersConsumer::new(),
            body: None,
            method: String::new(),
            uri: Uri::new(),
            major_version: 0,
            minor_version: 0,
            header_map: HeaderMap::new(),
            max_body_size: None,
        }
    }

    /// Bounds the request line plus header block, in bytes. Exceeding it
    /// surfaces as the request-line consumer's own error status
    /// (`RequestUriTooLong`) or the headers consumer's
    /// (`RequestEntityTooLarge`), per whichever sub-consumer is active.
    pub fn set_max_head_size(&mut self, n: u64) {
        self.request_line.set_length_limit(n);
        self.headers.set_length_limit(n);
    }

    pub fn set_max_body_size(&mut self, n: u64) {
        self.max_body_size = Some(n);
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.phase = Phase::RequestLine;
        self.request_line.reset();
        self.headers.reset();
        self.body = None;
        self.method.clear();
        self.uri = Uri::new();
        self.major_version = 0;
        self.minor_version = 0;
        self.header_map.clear();
    }

    pub fn into_request(self) -> Request {
        let (trailers, body_bytes) = match self.body {
            Some(b) => {
                let trailers = b.into_trailers().unwrap_or_else(HeaderMap::new);
                (trailers, b.into_body())
            }
            None => (HeaderMap::new(), Vec::new()),
        };
        Request {
            method: self.method,
            uri: self.uri,
            major_version: self.major_version,
            minor_version: self.minor_version,
            headers: self.header_map,
            trailers: trailers,
            body: body_bytes,
        }
    }
}

impl Consumer for RequestConsumer {
    fn consume(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut offset = 0;
        while offset < buf.len() && !self.state.is_done() {
            match self.phase {
                Phase::RequestLine => {
                    let n = self.request_line.consume(&buf[offset..])?;
                    offset += n;
                    if self.request_line.is_done() {
                        let line = ::std::mem::replace(&mut self.request_line, RequestLineConsumer::new());
                        let (method, uri, major, minor) = line.into_parts();
                        self.method = method;
                        self.uri = uri;
                        self.major_version = major;
                        self.minor_version = minor;
                        self.phase = Phase::Headers;
                    }
                }
                Phase::Headers => {
                    let n = self.headers.consume(&buf[offset..])?;
                    offset += n;
                    if self.headers.is_done() {
                        let headers = ::std::mem::replace(&mut self.headers, HeadersConsumer::new());
                        self.header_map = headers.into_headers();
                        let mode = resolve_body_mode(&self.header_map)?;
                        let mut body = BodyConsumer::new(mode);
                        if let Some(limit) = self.max_body_size {
                            body.set_length_limit(limit);
                        }
                        let body_done = body.is_done();
                        self.body = Some(body);
                        self.phase = Phase::Body;
                        if body_done {
                            self.state.mark_done();
                        }
                    }
                }
                Phase::Body => {
                    let body = self.body.as_mut().expect("body consumer present in Body phase");
                    let n = body.consume(&buf[offset..])?;
                    offset += n;
                    if body.is_done() {
                        self.state.mark_done();
                    }
                }
            }
        }
        Ok(offset)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

#[cfg(test)]
mod test {
    use super::RequestConsumer;
    use consume::Consumer;

    #[test]
    fn minimal_get_request() {
        let mut c = RequestConsumer::new();
        let input = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let n = c.consume(input).unwrap();
        assert_eq!(n, input.len());
        assert!(c.is_done());
        let req = c.into_request();
        assert_eq!(req.method, "GET");
        assert_eq!(req.major_version, 1);
        assert_eq!(req.headers.get("host"), Some("example.com"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn request_with_fixed_body() {
        let mut c = RequestConsumer::new();
        let input = b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        c.consume(input).unwrap();
        assert!(c.is_done());
        assert_eq!(c.into_request().body, b"hello");
    }

    #[test]
    fn chunked_request_merges_trailers() {
        let mut c = RequestConsumer::new();
        let input = b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
5\r\nhello\r\n0\r\nX-Checksum: abc\r\n\r\n";
        c.consume(input).unwrap();
        assert!(c.is_done());
        let req = c.into_request();
        assert_eq!(req.body, b"hello");
        assert_eq!(req.trailers.get("x-checksum"), Some("abc"));
    }

    #[test]
    fn chunked_wins_over_content_length_on_conflict() {
        let mut c = RequestConsumer::new();
        let input = b"POST /x HTTP/1.1\r\nContent-Length: 999\r\n\
Transfer-Encoding: chunked\r\n\r\n0\r\n\r\n";
        c.consume(input).unwrap();
        assert!(c.is_done());
        assert!(c.into_request().body.is_empty());
    }

    #[test]
    fn split_anywhere_produces_same_result() {
        let input: &[u8] = b"PUT /a HTTP/1.0\r\nContent-Length: 3\r\n\r\nabc";
        let mut whole = RequestConsumer::new();
        whole.consume(input).unwrap();
        let whole_req = whole.into_request();

        for split in 0..input.len() {
            let mut c = RequestConsumer::new();
            c.consume(&input[..split]).unwrap();
            c.consume(&input[split..]).unwrap();
            assert!(c.is_done());
            let req = c.into_request();
            assert_eq!(req.method, whole_req.method);
            assert_eq!(req.body, whole_req.body);
        }
    }
}
