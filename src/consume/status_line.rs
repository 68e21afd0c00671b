//! Status-line consumer: `HTTP/M.N SP Status-Code SP Reason-Phrase CRLF`.

use consume::{Consumer, ConsumerState, ParseError};
use status::StatusCode;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Version,
    Code,
    Reason,
}

pub struct StatusLineConsumer {
    state: ConsumerState,
    phase: Phase,
    version_str: String,
    code_str: String,
    reason: String,
    major_version: u16,
    minor_version: u16,
    status_code: u16,
}

impl StatusLineConsumer {
    pub fn new() -> StatusLineConsumer {
        StatusLineConsumer {
            state: ConsumerState::new(),
            phase: Phase::Version,
            version_str: String::new(),
            code_str: String::new(),
            reason: String::new(),
            major_version: 0,
            minor_version: 0,
            status_code: 0,
        }
    }

    pub fn set_length_limit(&mut self, n: u64) {
        self.state.set_length_limit(n);
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.phase = Phase::Version;
        self.version_str.clear();
        self.code_str.clear();
        self.reason.clear();
        self.major_version = 0;
        self.minor_version = 0;
        self.status_code = 0;
    }

    pub fn into_parts(self) -> (u16, u16, u16, String) {
        (self.major_version, self.minor_version, self.status_code, self.reason)
    }

    fn finish_version(&mut self) -> bool {
        if self.version_str.len() < 6 || &self.version_str[..5] != "HTTP/" {
            self.state.set_error(StatusCode::BadRequest, "malformed HTTP version");
            return false;
        }
        let rest = &self.version_str[5..];
        let mut parts = rest.splitn(2, '.');
        let (major, minor) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
        match (major.parse(), minor.parse()) {
            (Ok(maj), Ok(min)) => {
                self.major_version = maj;
                self.minor_version = min;
                true
            }
            _ => {
                self.state.set_error(StatusCode::BadRequest, "malformed HTTP version");
                false
            }
        }
    }
}

impl Consumer for StatusLineConsumer {
    fn consume(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;
        for &b in buf {
            if !self.state.increase_length(1) {
                self.state.set_error(StatusCode::BadRequest, "status line too long");
                consumed += 1;
                break;
            }
            consumed += 1;
            match self.phase {
                Phase::Version => {
                    if b == b' ' {
                        if self.finish_version() {
                            self.phase = Phase::Code;
                        }
                    } else if b < 0x20 {
                        self.state.set_error(StatusCode::BadRequest, "invalid HTTP version");
                    } else {
                        self.version_str.push(b as char);
                    }
                }
                Phase::Code => {
                    if b == b' ' {
                        let known = if self.code_str.len() == 3 {
                            self.code_str.parse().ok()
                                .and_then(::status::StatusCode::status_code_from_int)
                        } else {
                            None
                        };
                        match known {
                            Some(code) => {
                                self.status_code = code.as_u16();
                                self.phase = Phase::Reason;
                            }
                            None => {
                                self.state.set_error(StatusCode::BadRequest, "invalid status code");
                            }
                        }
                    } else if b.is_ascii_digit() {
                        if self.code_str.len() >= 3 {
                            self.state.set_error(StatusCode::BadRequest, "invalid status code");
                        } else {
                            self.code_str.push(b as char);
                        }
                    } else {
                        self.state.set_error(StatusCode::BadRequest, "invalid status code");
                    }
                }
                Phase::Reason => {
                    if b == b'\n' {
                        if self.reason.ends_with('\r') {
                            let trimmed_len = self.reason.len() - 1;
                            self.reason.truncate(trimmed_len);
                        }
                        self.state.mark_done();
                    } else if b < 0x20 && b != b'\r' {
                        self.state.set_error(StatusCode::BadRequest, "invalid reason phrase");
                    } else {
                        self.reason.push(b as char);
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
    use super::StatusLineConsumer;
    use consume::Consumer;

    #[test]
    fn parses_minimal_status_line() {
        let mut c = StatusLineConsumer::new();
        c.consume(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert!(c.is_done());
        let (major, minor, code, reason) = c.into_parts();
        assert_eq!((major, minor, code), (1, 1, 200));
        assert_eq!(reason, "OK");
    }

    #[test]
    fn allows_empty_reason_phrase() {
        let mut c = StatusLineConsumer::new();
        c.consume(b"HTTP/1.0 204 \r\n").unwrap();
        assert_eq!(c.into_parts().3, "");
    }

    #[test]
    fn rejects_unknown_status_code() {
        let mut c = StatusLineConsumer::new();
        let err = c.consume(b"HTTP/1.1 499 Weird\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }

    #[test]
    fn rejects_non_three_digit_status_code() {
        let mut c = StatusLineConsumer::new();
        let err = c.consume(b"HTTP/1.1 42 OK\r\n").unwrap_err();
        assert_eq!(err.status, ::status::StatusCode::BadRequest);
    }
}
