//! The `Response` builder (spec.md §3): constructed by the server before
//! handler dispatch, mutated by the handler, serialized and destroyed by
//! the server after the handler returns. Response generation beyond
//! framing rules is explicitly out of scope (spec.md §1's Non-goals); this
//! type only owns enough surface to set a status, add headers, and write a
//! body, plus the framing (`Content-Length`) that isn't optional.

use header_map::{canonicalize_name, HeaderMap};
use status::StatusCode;

/// A response under construction. `major_version`/`minor_version` start
/// out matching the request that is being answered (so a server talking
/// to an HTTP/1.0 client doesn't accidentally claim 1.1), but a handler
/// may override them.
pub struct Response {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub major_version: u16,
    pub minor_version: u16,
    pub headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(major_version: u16, minor_version: u16) -> Response {
        Response {
            status: StatusCode::Ok,
            reason: None,
            major_version,
            minor_version,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Builds a bare error response: a status line, a short plain-text
    /// body echoing the reason, and no other headers. Used both for
    /// parse-error reporting and for a handler that panicked.
    pub fn for_error(status: StatusCode, major_version: u16, minor_version: u16) -> Response {
        let mut resp = Response::new(major_version, minor_version);
        resp.status = status;
        let text = format!("{} {}\n", status.as_u16(), status.reason());
        resp.headers.append("Content-Type", "text/plain");
        resp.write_body(text.as_bytes());
        resp
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Overrides the reason phrase; without a call to this, `status`'s
    /// standard reason is used.
    pub fn set_reason<S: Into<String>>(&mut self, reason: S) {
        self.reason = Some(reason.into());
    }

    pub fn add_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.headers.append(name, value);
    }

    pub fn write_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    fn reason_phrase(&self) -> &str {
        match self.reason {
            Some(ref r) => r.as_str(),
            None => self.status.reason(),
        }
    }

    /// Serializes the status line, headers (canonicalized, `Content-Length`
    /// supplied automatically unless the handler already set one), and
    /// body into wire bytes, terminated with CRLF per spec.md §6 ("Line
    /// endings on input: accept LF or CRLF uniformly. On output the server
    /// emits CRLF").
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(
            format!(
                "HTTP/{}.{} {} {}\r\n",
                self.major_version,
                self.minor_version,
                self.status.as_u16(),
                self.reason_phrase(),
            ).as_bytes(),
        );
        for &(ref name, ref value) in self.headers.iter() {
            out.extend_from_slice(canonicalize_name(name).as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        if !self.headers.contains("content-length") && !self.headers.contains("transfer-encoding") {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod test {
    use super::Response;
    use status::StatusCode;

    #[test]
    fn serializes_status_line_and_body() {
        let mut r = Response::new(1, 1);
        r.write_body(b"hello");
        let bytes = r.into_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("hello"));
    }

    #[test]
    fn custom_status_and_headers() {
        let mut r = Response::new(1, 0);
        r.set_status(StatusCode::NotFound);
        r.add_header("X-Served-By", "httpmux");
        let text = String::from_utf8(r.into_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(text.contains("X-Served-By: httpmux\r\n"));
    }

    #[test]
    fn error_response_has_body() {
        let r = Response::for_error(StatusCode::BadRequest, 1, 1);
        let text = String::from_utf8(r.into_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.contains("400 Bad Request"));
    }
}
