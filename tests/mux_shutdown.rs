//! Scenario 6 from spec.md §8: multiplexer shutdown, with and without an
//! attached signal backed by real registered I/O (a listening socket),
//! verifying `detached()` fires exactly once per signal and every reactor
//! thread returns from `run()` within a bounded time.

extern crate httpmux;
extern crate mio;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use httpmux::mux::reactor::Reactor;
use httpmux::mux::signal::{EventFlags, Signal};
use httpmux::net::Socket;

struct CountingSignal {
    socket: Socket,
    detaching_calls: Arc<AtomicUsize>,
    detached_calls: Arc<AtomicUsize>,
}

impl Signal for CountingSignal {
    fn initial_event_flags(&self) -> EventFlags {
        EventFlags::READ
    }

    fn register(&self, poll: &mio::Poll, token: mio::Token, interest: mio::Ready, opts: mio::PollOpt)
        -> ::std::io::Result<()>
    {
        poll.register(&self.socket, token, interest, opts)
    }

    fn deregister(&self, poll: &mio::Poll) -> ::std::io::Result<()> {
        poll.deregister(&self.socket)
    }

    fn detaching(&mut self) {
        self.detaching_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn detached(&mut self) {
        self.detached_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn shutdown_with_no_signals_returns_promptly() {
    let reactor = Reactor::new().unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let r = reactor.clone();
            thread::spawn(move || r.run())
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    reactor.terminate();
    for h in handles {
        h.join().unwrap().unwrap();
    }
}

#[test]
fn shutdown_with_attached_listener_detaches_exactly_once() {
    let reactor = Reactor::new().unwrap();
    let socket = Socket::listen("127.0.0.1:0").unwrap();

    let detaching_calls = Arc::new(AtomicUsize::new(0));
    let detached_calls = Arc::new(AtomicUsize::new(0));
    let signal = CountingSignal {
        socket,
        detaching_calls: detaching_calls.clone(),
        detached_calls: detached_calls.clone(),
    };
    reactor.attach(Box::new(signal));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let r = reactor.clone();
            thread::spawn(move || r.run())
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    reactor.terminate();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    assert_eq!(detaching_calls.load(Ordering::SeqCst), 1);
    assert_eq!(detached_calls.load(Ordering::SeqCst), 1);
}
