//! Listener signal: accepts connections non-blocking until `WouldBlock`,
//! constructing and attaching a fresh signal for each via a user hook.

use std::sync::Arc;

use mio::{Poll, PollOpt, Ready, Token};

use mux::reactor::Reactor;
use mux::signal::{EventFlags, ReadyResult, Signal};
use net::{Socket, Status};

/// Builds the `Signal` for a freshly accepted connection and attaches it to
/// the same multiplexer.
pub trait Acceptor: Send {
    fn accepted(&self, socket: Socket, reactor: &Arc<Reactor>);
}

pub struct ListenerSignal<A: Acceptor> {
    socket: Socket,
    reactor: Arc<Reactor>,
    acceptor: A,
}

impl<A: Acceptor> ListenerSignal<A> {
    pub fn new(socket: Socket, reactor: Arc<Reactor>, acceptor: A) -> ListenerSignal<A> {
        ListenerSignal { socket, reactor, acceptor }
    }
}

impl<A: Acceptor> Signal for ListenerSignal<A> {
    fn initial_event_flags(&self) -> EventFlags {
        EventFlags::READ
    }

    fn register(&self, poll: &Poll, token: Token, interest: Ready, opts: PollOpt) -> ::std::io::Result<()> {
        poll.register(&self.socket, token, interest, opts)
    }

    fn deregister(&self, poll: &Poll) -> ::std::io::Result<()> {
        poll.deregister(&self.socket)
    }

    fn read_ready(&mut self) -> ReadyResult {
        loop {
            match self.socket.accept() {
                Ok(Some((stream, _addr))) => {
                    self.acceptor.accepted(Socket::Stream(stream), &self.reactor);
                }
                Ok(None) => return ReadyResult::OpComplete,
                Err(e) => {
                    // NoResource leaves the listener attached and retries
                    // on the next readiness edge; the failed accept itself
                    // is dropped since there's nothing to attach.
                    if Status::from_io_error(&e) == Status::NoResource {
                        trace!("accept: no resource available, dropping this attempt");
                    } else {
                        warn!("accept failed: {}", e);
                    }
                    return ReadyResult::OpComplete;
                }
            }
        }
    }
}
