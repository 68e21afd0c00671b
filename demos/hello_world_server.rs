extern crate httpmux;
extern crate env_logger;

use std::sync::atomic::{AtomicUsize, Ordering};

use httpmux::consume::request::Request;
use httpmux::server::{serve, Config, Response};

struct HelloWorld {
    counter: AtomicUsize,
}

impl httpmux::server::Handler for HelloWorld {
    fn handle(&self, req: &mut Request, resp: &mut Response) {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        match req.uri.path.as_str() {
            "/" => resp.write_body(b"Hello World!"),
            "/num" => {
                resp.write_body(
                    format!("This host has been visited {} times", count).as_bytes(),
                );
            }
            path => {
                let name = path.trim_start_matches('/');
                if name.is_empty() {
                    resp.set_status(httpmux::StatusCode::NotFound);
                } else {
                    resp.write_body(format!("Hello {}!", name).as_bytes());
                }
            }
        }
    }
}

fn main() {
    env_logger::init().unwrap();
    let handler = HelloWorld { counter: AtomicUsize::new(0) };
    serve("127.0.0.1:3000", Config::default(), handler, 4).unwrap();
}
