//! Connection signal: owns a socket, a lazily allocated input buffer, and
//! an outgoing Send Queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mio::{Poll, PollOpt, Ready, Token};

use mux::signal::{EventFlags, ReadyResult, Signal, SignalHandle};
use net::{Flags, Socket, Status};

/// Default size of a freshly allocated input buffer.
pub const DEFAULT_IBUF_SIZE: usize = 4096;

/// One pending outgoing write. An empty `data` with `fin == true` is the
/// sentinel meaning "send FIN after whatever precedes it in the queue".
struct Chunk {
    data: Vec<u8>,
    offset: usize,
    fin: bool,
}

/// The outgoing write queue for a connection signal, guarded by its own
/// lock distinct from every multiplexer-wide lock.
#[derive(Default)]
pub struct SendQueue {
    chunks: Mutex<VecDeque<Chunk>>,
}

impl SendQueue {
    pub fn new() -> SendQueue {
        SendQueue { chunks: Mutex::new(VecDeque::new()) }
    }

    /// Queues bytes to send, or — if the queue is empty — attempts a
    /// non-blocking send directly and enqueues only the residue, atomically
    /// with the enqueue so a concurrent drain can't interleave with it.
    pub fn send(&self, socket: &Socket, data: Vec<u8>) -> Result<(), ()> {
        let mut chunks = self.chunks.lock().unwrap();
        if chunks.is_empty() {
            let (status, sent) = socket.send(&data, Flags::empty());
            match status {
                Status::Ok | Status::WouldBlock => {
                    if sent < data.len() {
                        chunks.push_back(Chunk { data, offset: sent, fin: false });
                    }
                    Ok(())
                }
                _ => Err(()),
            }
        } else {
            chunks.push_back(Chunk { data, offset: 0, fin: false });
            Ok(())
        }
    }

    /// Enqueues the FIN sentinel.
    pub fn send_fin(&self) {
        self.chunks.lock().unwrap().push_back(Chunk { data: Vec::new(), offset: 0, fin: true });
    }

    /// Drains as much of the queue as the socket will currently accept.
    /// Returns `OpComplete` once the queue is empty, `OpIncomplete` if the
    /// socket applied backpressure, or an error status if the send failed
    /// for a reason other than `WouldBlock`.
    fn drain(&self, socket: &Socket) -> Result<ReadyResult, ()> {
        let mut chunks = self.chunks.lock().unwrap();
        while let Some(chunk) = chunks.front_mut() {
            if chunk.fin {
                let _ = socket.shutdown();
                chunks.pop_front();
                continue;
            }
            let (status, sent) = socket.send(&chunk.data[chunk.offset..], Flags::empty());
            chunk.offset += sent;
            match status {
                Status::Ok => {
                    if chunk.offset >= chunk.data.len() {
                        chunks.pop_front();
                    } else {
                        return Ok(ReadyResult::OpIncomplete);
                    }
                }
                Status::WouldBlock => return Ok(ReadyResult::OpIncomplete),
                _ => return Err(()),
            }
        }
        Ok(ReadyResult::OpComplete)
    }
}

/// Callbacks a connection signal drives as bytes arrive and as the peer
/// disconnects.
pub trait ConnectionHandler: Send {
    fn received(&mut self, data: &[u8]);
    fn finished(&mut self);

    /// Handed a `ConnWriter` immediately after attachment, mirroring
    /// `Signal::set_handle`. A handler that wants to write a response
    /// outside of being called back through `received` (the server glue's
    /// `HttpConnection` is the only user of this today) stashes it here.
    fn set_writer(&mut self, _writer: ConnWriter) {}
}

/// A handle a `ConnectionHandler` can use to queue outgoing bytes on its
/// own connection signal, without owning a reference back to it (the
/// handler lives inside the `ConnectionSignal`; it cannot hold `&self` to
/// its owner). Shares the socket and send queue via `Arc` instead.
#[derive(Clone)]
pub struct ConnWriter {
    socket: Arc<Socket>,
    send_queue: Arc<SendQueue>,
    handle: SignalHandle,
}

impl ConnWriter {
    pub fn send(&self, data: Vec<u8>) {
        if self.send_queue.send(&self.socket, data).is_err() {
            self.handle.detach();
        } else {
            self.handle.request_ready(EventFlags::WRITE);
        }
    }

    pub fn send_fin(&self) {
        self.send_queue.send_fin();
        self.handle.request_ready(EventFlags::WRITE);
    }

    pub fn detach(&self) {
        self.handle.detach();
    }
}

/// A `mux::Signal` wrapping one accepted TCP connection. Reads as much as
/// fits into a lazily-allocated buffer on every read-ready dispatch, and
/// drains its `SendQueue` on every write-ready dispatch.
pub struct ConnectionSignal<H: ConnectionHandler> {
    socket: Arc<Socket>,
    ibuf: Option<Vec<u8>>,
    ibuf_size: usize,
    send_queue: Arc<SendQueue>,
    handler: H,
    handle: Option<SignalHandle>,
}

impl<H: ConnectionHandler> ConnectionSignal<H> {
    pub fn new(socket: Socket, handler: H) -> ConnectionSignal<H> {
        ConnectionSignal {
            socket: Arc::new(socket),
            ibuf: None,
            ibuf_size: DEFAULT_IBUF_SIZE,
            send_queue: Arc::new(SendQueue::new()),
            handler,
            handle: None,
        }
    }

    pub fn send(&self, data: Vec<u8>) {
        if self.send_queue.send(&self.socket, data).is_err() {
            self.request_detach();
        } else {
            self.wake_for_write();
        }
    }

    pub fn send_fin(&self) {
        self.send_queue.send_fin();
        self.wake_for_write();
    }

    /// Re-arms a write-ready dispatch without waiting for a fresh OS edge:
    /// under edge-triggered registration, queueing onto an
    /// already-writable socket produces no new edge on its own.
    fn wake_for_write(&self) {
        if let Some(ref h) = self.handle {
            h.request_ready(EventFlags::WRITE);
        }
    }

    fn request_detach(&self) {
        if let Some(ref h) = self.handle {
            h.detach();
        }
    }
}

impl<H: ConnectionHandler> Signal for ConnectionSignal<H> {
    fn initial_event_flags(&self) -> EventFlags {
        EventFlags::READ | EventFlags::WRITE
    }

    fn register(&self, poll: &Poll, token: Token, interest: Ready, opts: PollOpt) -> ::std::io::Result<()> {
        poll.register(&*self.socket, token, interest, opts)
    }

    fn deregister(&self, poll: &Poll) -> ::std::io::Result<()> {
        poll.deregister(&*self.socket)
    }

    fn read_ready(&mut self) -> ReadyResult {
        if self.ibuf.is_none() {
            self.ibuf = Some(vec![0u8; self.ibuf_size]);
        }
        loop {
            let (status, n) = {
                let buf = self.ibuf.as_mut().unwrap();
                self.socket.recv(buf, Flags::empty())
            };
            match status {
                Status::Ok => {
                    if n == 0 {
                        self.handler.finished();
                        return ReadyResult::SignalComplete;
                    }
                    let buf = self.ibuf.as_ref().unwrap();
                    self.handler.received(&buf[..n]);
                    if n < self.ibuf_size {
                        return ReadyResult::OpComplete;
                    }
                }
                Status::WouldBlock => return ReadyResult::OpComplete,
                _ => {
                    self.handler.finished();
                    return ReadyResult::SignalComplete;
                }
            }
        }
    }

    fn write_ready(&mut self) -> ReadyResult {
        match self.send_queue.drain(&self.socket) {
            Ok(result) => result,
            Err(()) => ReadyResult::SignalComplete,
        }
    }

    fn set_handle(&mut self, handle: SignalHandle) {
        let writer = ConnWriter {
            socket: self.socket.clone(),
            send_queue: self.send_queue.clone(),
            handle: handle.clone(),
        };
        self.handler.set_writer(writer);
        self.handle = Some(handle);
    }
}

#[cfg(test)]
mod test {
    use super::{ConnectionHandler, SendQueue};
    use net::Socket;

    struct Recorder {
        chunks: Vec<Vec<u8>>,
        finished: bool,
    }

    impl ConnectionHandler for Recorder {
        fn received(&mut self, data: &[u8]) {
            self.chunks.push(data.to_vec());
        }
        fn finished(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn send_queue_starts_empty() {
        let q = SendQueue::new();
        assert!(q.chunks.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_records_chunks_and_finish() {
        let mut h = Recorder { chunks: Vec::new(), finished: false };
        h.received(b"abc");
        h.received(b"def");
        h.finished();
        assert_eq!(h.chunks, vec![b"abc".to_vec(), b"def".to_vec()]);
        assert!(h.finished);
    }

    // Socket import retained to document the type `SendQueue::send` takes;
    // exercising it end-to-end needs a live loopback pair, covered by the
    // `tests/` integration suite instead of this unit module.
    #[allow(dead_code)]
    fn _type_check(_s: &Socket) {}
}
