//! The `Signal` capability trait and the readiness vocabulary the reactor
//! dispatches through it.
//!
//! A deep inheritance chain of socket/connection/server-connection base
//! classes becomes one flat trait here, with default no-op method bodies
//! standing in for the base-class behavior; `ConnectionSignal`,
//! `ListenerSignal`, and `TimerSignal` each override only what they need.

use std::io;

use mio::{Poll, PollOpt, Ready, Token};

/// Readiness bits a signal may be interested in: both the interest it
/// registers with and the sticky per-entry readiness flags the reactor
/// tracks between dispatches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const READ: EventFlags = EventFlags(1 << 0);
    pub const WRITE: EventFlags = EventFlags(1 << 1);
    pub const TIMEOUT: EventFlags = EventFlags(1 << 2);
    pub const DETACH: EventFlags = EventFlags(1 << 3);

    pub fn empty() -> EventFlags {
        EventFlags(0)
    }

    pub fn contains(&self, other: EventFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: EventFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: EventFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl ::std::ops::BitOr for EventFlags {
    type Output = EventFlags;
    fn bitor(self, rhs: EventFlags) -> EventFlags {
        EventFlags(self.0 | rhs.0)
    }
}

/// The outcome of one dispatch call to a signal's `read_ready`/`write_ready`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadyResult {
    /// The signal has more to do; keep the readiness flag set and dispatch
    /// again on the next drain pass.
    OpIncomplete,
    /// The signal drained everything it could for now; clear the flag
    /// until the OS reports readiness again.
    OpComplete,
    /// The signal is finished; mark it for detachment.
    SignalComplete,
}

/// A handle a `Signal` implementation can use to detach itself or arm a
/// timeout, without owning a strong reference back to its reactor.
///
/// The multiplexer strongly owns the signal (via `Arc<SignalEntry>` in the
/// Signal Map); the signal holds this `Weak` back-reference plus a `Token`
/// instead, and every operation it performs through the handle re-enters
/// the reactor under the Signal Map lock rather than dereferencing a
/// stored pointer to the entry directly.
#[derive(Clone)]
pub struct SignalHandle {
    pub(crate) reactor: ::std::sync::Weak<::mux::reactor::Reactor>,
    pub(crate) token: ::mio::Token,
}

impl SignalHandle {
    /// Requests detachment. Asynchronous: the signal is not destroyed on
    /// the thread that calls this.
    pub fn detach(&self) {
        if let Some(reactor) = self.reactor.upgrade() {
            reactor.request_detach(self.token);
        }
    }

    /// Arms (or re-arms) this signal's timeout.
    pub fn set_timeout(&self, when: ::std::time::Instant) {
        if let Some(reactor) = self.reactor.upgrade() {
            reactor.set_timeout(self.token, when);
        }
    }

    pub fn clear_timeout(&self) {
        if let Some(reactor) = self.reactor.upgrade() {
            reactor.clear_timeout(self.token);
        }
    }

    /// Marks this signal ready for another dispatch of the given kind,
    /// even without a fresh OS readiness edge — used by `ConnectionSignal`
    /// to re-arm write-ready after queueing a chunk onto an
    /// already-writable socket, where edge-triggered registration would
    /// otherwise never produce a second edge.
    pub fn request_ready(&self, flags: EventFlags) {
        if let Some(reactor) = self.reactor.upgrade() {
            reactor.request_ready(self.token, flags);
        }
    }
}

/// An I/O or timer event source owned by the multiplexer.
///
/// A signal with nothing to register (a pure timer) is never registered
/// with the OS readiness primitive; it only ever participates via the
/// Timeout Queue.
pub trait Signal: Send {
    /// Read/write interest to register with.
    fn initial_event_flags(&self) -> EventFlags {
        EventFlags::empty()
    }

    /// Registers this signal's I/O source (if any) with the OS readiness
    /// primitive. Default no-op, for signals with nothing to register.
    /// `ConnectionSignal`/`ListenerSignal` forward this to their
    /// concretely-typed socket field — `mio::Poll::register` cannot be
    /// called through a trait object since trait objects don't themselves
    /// implement the traits they erase.
    fn register(&self, _poll: &Poll, _token: Token, _interest: Ready, _opts: PollOpt) -> io::Result<()> {
        Ok(())
    }

    /// Deregisters this signal's I/O source, if any. Default no-op.
    fn deregister(&self, _poll: &Poll) -> io::Result<()> {
        Ok(())
    }

    /// Handles a Read Readiness event.
    fn read_ready(&mut self) -> ReadyResult {
        ReadyResult::OpComplete
    }

    /// Handles a Write Readiness event.
    fn write_ready(&mut self) -> ReadyResult {
        ReadyResult::OpComplete
    }

    /// Handles a Timeout event. Default implementation does nothing.
    fn timed_out(&mut self) {}

    /// Called once, before the entry is deregistered from the OS readiness
    /// primitive, while other dispatches for this signal may still be
    /// in-flight on other threads.
    fn detaching(&mut self) {}

    /// Called exactly once, after every reactor thread that was in a Wait
    /// state at the time of detachment has stepped past it.
    fn detached(&mut self) {}

    /// Gives the signal a way to later detach itself or arm a timeout.
    /// Called by the reactor immediately after `attach`.
    fn set_handle(&mut self, _handle: SignalHandle) {}
}
