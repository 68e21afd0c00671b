//! Timer signal: holds no socket, fires a user callback on expiry. Grounded
//! on `examples/original_source/src/net/net_signal.h`'s `mux_timer`, though
//! per that header's own `FIXME` ("General-purpose signal timeouts seem to
//! make this class superfluous"), this crate's `TimerSignal` is a thin
//! wrapper over the same per-signal timeout mechanism every other signal
//! already has through `SignalHandle::set_timeout`.

use mux::signal::{Signal, SignalHandle};

/// A signal with no I/O interest of its own; attaching one and then
/// immediately calling `SignalHandle::set_timeout` on the returned handle
/// is how a one-shot or recurring timer is scheduled on the reactor.
pub struct TimerSignal<F: FnMut() + Send> {
    callback: F,
    handle: Option<SignalHandle>,
}

impl<F: FnMut() + Send> TimerSignal<F> {
    pub fn new(callback: F) -> TimerSignal<F> {
        TimerSignal { callback, handle: None }
    }

    /// Re-arms the timer for another expiry, `duration` from now.
    pub fn rearm(&self, duration: ::std::time::Duration) {
        if let Some(ref h) = self.handle {
            h.set_timeout(::std::time::Instant::now() + duration);
        }
    }
}

impl<F: FnMut() + Send> Signal for TimerSignal<F> {
    fn timed_out(&mut self) {
        (self.callback)();
    }

    fn set_handle(&mut self, handle: SignalHandle) {
        self.handle = Some(handle);
    }
}
