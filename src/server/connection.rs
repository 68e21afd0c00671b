//! `HttpConnection`: the `ConnectionHandler` that drives a `RequestConsumer`
//! over the bytes a `ConnectionSignal` hands it, dispatches each fully
//! decoded request to a `Handler`, and writes the response back out through
//! a `ConnWriter`.
//!
//! Grounded on `examples/original_source/src/http/http_server.cpp`'s
//! `server_connection::on_read` loop (read -> parse -> dispatch -> write,
//! repeated for pipelined requests on the same socket) and the teacher's
//! own `std::panic::catch_unwind` use elsewhere in the crate for isolating
//! one connection's fault from the rest of the reactor.

use std::panic;
use std::sync::Arc;

use consume::request::Request;
use consume::request::RequestConsumer;
use consume::{Consumer, ParseError};
use mux::connection::{ConnWriter, ConnectionHandler};
use server::config::Config;
use server::protocol::Handler;
use server::response::Response;
use status::StatusCode;

/// Decides whether the connection should stay open after the response
/// currently being built, per the request that prompted it: an explicit
/// `Connection: close`/`Connection: keep-alive` header always wins; absent
/// one, HTTP/1.1 defaults to keep-alive and HTTP/1.0 to close.
fn wants_keep_alive(req: &Request) -> bool {
    match req.headers.get("connection") {
        Some(v) => !v.eq_ignore_ascii_case("close"),
        None => req.major_version >= 1 && req.minor_version >= 1,
    }
}

pub struct HttpConnection<H: Handler> {
    handler: Arc<H>,
    config: Arc<Config>,
    consumer: RequestConsumer,
    writer: Option<ConnWriter>,
    closing: bool,
}

impl<H: Handler> HttpConnection<H> {
    pub fn new(handler: Arc<H>, config: Arc<Config>) -> HttpConnection<H> {
        let mut consumer = RequestConsumer::new();
        consumer.set_max_head_size(config.max_header_size as u64);
        HttpConnection {
            handler,
            config,
            consumer,
            writer: None,
            closing: false,
        }
    }

    fn fresh_consumer(&self) -> RequestConsumer {
        let mut c = RequestConsumer::new();
        c.set_max_head_size(self.config.max_header_size as u64);
        c
    }

    /// Called once a request has finished parsing: hands it to the
    /// handler (isolated with `catch_unwind` per spec.md §7, so one
    /// handler panic detaches this connection rather than the whole
    /// reactor thread), then writes the serialized response.
    fn dispatch_request(&mut self) {
        let finished = ::std::mem::replace(&mut self.consumer, self.fresh_consumer());
        let mut req = finished.into_request();
        let keep_alive = wants_keep_alive(&req);
        if !keep_alive {
            self.closing = true;
        }

        let mut resp = Response::new(req.major_version, req.minor_version);
        let handler = self.handler.clone();
        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            handler.handle(&mut req, &mut resp);
        }));

        let bytes = match outcome {
            Ok(()) => {
                if !keep_alive {
                    resp.add_header("Connection", "close");
                }
                resp.into_bytes()
            }
            Err(_) => {
                error!("request handler panicked; closing connection");
                self.closing = true;
                let mut err_resp =
                    Response::for_error(StatusCode::InternalServerError, req.major_version, req.minor_version);
                err_resp.add_header("Connection", "close");
                err_resp.into_bytes()
            }
        };

        if let Some(ref w) = self.writer {
            w.send(bytes);
            if self.closing {
                w.send_fin();
            }
        }
    }

    /// A parse failure is always fatal to the connection: the input stream
    /// is no longer framed reliably, so there is nothing to do but report
    /// the failure and stop (spec.md §7).
    fn handle_parse_error(&mut self, err: ParseError) {
        warn!("request parse error: {}", err.message);
        self.closing = true;
        let resp = Response::for_error(err.status, 1, 1);
        if let Some(ref w) = self.writer {
            w.send(resp.into_bytes());
            w.send_fin();
        }
    }
}

impl<H: Handler> ConnectionHandler for HttpConnection<H> {
    fn received(&mut self, data: &[u8]) {
        if self.closing {
            return;
        }
        let mut offset = 0;
        while offset < data.len() {
            let n = match self.consumer.consume(&data[offset..]) {
                Ok(n) => n,
                Err(e) => {
                    self.handle_parse_error(e);
                    return;
                }
            };
            offset += n;
            if self.consumer.is_done() {
                self.dispatch_request();
                if self.closing {
                    return;
                }
            } else if n == 0 {
                // Consumer needs more bytes than this call provided; wait
                // for the next read-ready dispatch.
                break;
            }
        }
    }

    fn finished(&mut self) {}

    fn set_writer(&mut self, writer: ConnWriter) {
        self.writer = Some(writer);
    }
}

#[cfg(test)]
mod test {
    use super::{wants_keep_alive, HttpConnection};
    use consume::request::RequestConsumer;
    use consume::Consumer;
    use mux::connection::ConnectionHandler;
    use server::config::Config;
    use server::response::Response;
    use std::sync::Arc;

    fn parse_one(input: &[u8]) -> ::consume::request::Request {
        let mut c = RequestConsumer::new();
        c.consume(input).unwrap();
        c.into_request()
    }

    #[test]
    fn http_1_1_defaults_to_keep_alive() {
        let req = parse_one(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
        assert!(wants_keep_alive(&req));
    }

    #[test]
    fn http_1_0_defaults_to_close() {
        let req = parse_one(b"GET / HTTP/1.0\r\n\r\n");
        assert!(!wants_keep_alive(&req));
    }

    #[test]
    fn explicit_close_header_overrides_version() {
        let req = parse_one(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n");
        assert!(!wants_keep_alive(&req));
    }

    struct Echo;
    impl ::server::protocol::Handler for Echo {
        fn handle(&self, req: &mut ::consume::request::Request, resp: &mut Response) {
            resp.write_body(req.body.clone().as_slice());
        }
    }

    #[test]
    fn received_without_writer_does_not_panic() {
        let mut conn = HttpConnection::new(Arc::new(Echo), Arc::new(Config::default()));
        conn.received(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
    }
}
