//! Signal Map entries: the multiplexer-internal wrapper around a user
//! `Signal`, carrying its dispatch state and timeout bookkeeping.

use std::sync::Mutex;
use std::time::Instant;

use mio::Token;

use mux::signal::{EventFlags, Signal};

/// An entry's position in the reactor's dispatch state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchState {
    /// Not in the Ready Queue and not being dispatched.
    Inactive,
    /// In the Ready Queue, waiting to be drained.
    Queued,
    /// Popped from the Ready Queue; a thread is currently running its
    /// dispatch.
    InProgress,
}

/// Everything about an entry that changes during dispatch, held behind one
/// lock so a dispatching thread has exclusive access to the signal and its
/// bookkeeping for the duration of one `read_ready`/`write_ready`/
/// `timed_out` call — this is what lets `Signal::read_ready` take `&mut
/// self` despite the entry being reached through a shared `Arc`.
pub struct EntryInner {
    pub signal: Box<dyn Signal>,
    pub state: DispatchState,
    pub flags: EventFlags,
    /// When this entry's timeout next fires, if one is armed. `None` means
    /// no timeout is currently set for this signal.
    pub timeout_at: Option<Instant>,
    pub timeout_seq: u64,
}

/// A Signal Map entry. Lives for the signal's entire attached lifetime —
/// from `attach` until garbage collection releases it.
pub struct SignalEntry {
    pub token: Token,
    pub inner: Mutex<EntryInner>,
}

impl SignalEntry {
    pub fn new(token: Token, signal: Box<dyn Signal>) -> SignalEntry {
        let flags = signal.initial_event_flags();
        SignalEntry {
            token,
            inner: Mutex::new(EntryInner {
                signal,
                state: DispatchState::Inactive,
                flags,
                timeout_at: None,
                timeout_seq: 0,
            }),
        }
    }
}
