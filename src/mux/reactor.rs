//! The epoll-driven I/O multiplexer core: a many-threaded reactor loop
//! built on `mio::Poll` with edge-triggered registration in place of raw
//! `epoll_create1`/`epoll_wait`/`eventfd` calls.
//!
//! Lock acquisition order: Ready -> Term -> Timeout -> GC -> Signal Map.
//! Each of those five structures has its own `Mutex`; the Send Queue of a
//! connection signal (see `mux::connection`) is guarded by a separate,
//! per-signal lock entirely outside this order. A `SignalEntry`'s own
//! `inner` lock is acquired *before* any of the five global queue locks it
//! is taken alongside (see `dispatch_one`'s detach path and `set_timeout`),
//! never after.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use mio::{Events, Poll, PollOpt, Ready, Token};

use mux::entry::{DispatchState, SignalEntry};
use mux::signal::{EventFlags, ReadyResult, Signal, SignalHandle};

/// Number of ready entries drained per `epoll_wait` wakeup before looping
/// back to re-enter the Wait state.
const DRAIN_BATCH: usize = 32;

struct WaitCtx {
    id: u64,
}

/// A detached entry awaiting release. `pending` is the set of wait-context
/// ids that were in the Wait state at the moment this entry was detached;
/// each of those contexts must step past it exactly once before the entry
/// is released.
struct GcEntry {
    entry: Arc<SignalEntry>,
    pending: Mutex<Vec<u64>>,
}

/// The many-threaded reactor. One `Reactor` may be `run()` by any number of
/// threads simultaneously; a single-threaded multiplexer is simply one run
/// by exactly one thread.
pub struct Reactor {
    poll: Poll,
    wakeup_registration: ::mio::Registration,
    wakeup_set_readiness: ::mio::SetReadiness,
    wakeup_token: Token,

    sig_map: Mutex<HashMap<Token, Arc<SignalEntry>>>,
    next_token: AtomicUsize,

    ready_queue: Mutex<VecDeque<Arc<SignalEntry>>>,

    timeout_queue: Mutex<BTreeMap<(Instant, u64), Token>>,
    next_timeout_seq: AtomicU64,
    timeout_waiting: Mutex<bool>,

    wait_ctx_list: Mutex<Vec<WaitCtx>>,
    next_wait_id: AtomicU64,

    gc_list: Mutex<Vec<GcEntry>>,

    term_start: AtomicBool,
    term_lock: Mutex<()>,

    /// A weak reference to this reactor's own `Arc`, so `attach` can hand
    /// signals a `SignalHandle` without needing an `Arc<Reactor>` method
    /// receiver everywhere.
    self_weak: Weak<Reactor>,
}

impl Reactor {
    pub fn new() -> io::Result<Arc<Reactor>> {
        let poll = Poll::new()?;
        let (registration, set_readiness) = ::mio::Registration::new2();
        let wakeup_token = Token(0);
        poll.register(&registration, wakeup_token, Ready::readable(), PollOpt::edge())?;
        Ok(Arc::new_cyclic(|weak| Reactor {
            poll,
            wakeup_registration: registration,
            wakeup_set_readiness: set_readiness,
            wakeup_token,
            sig_map: Mutex::new(HashMap::new()),
            next_token: AtomicUsize::new(1),
            ready_queue: Mutex::new(VecDeque::new()),
            timeout_queue: Mutex::new(BTreeMap::new()),
            next_timeout_seq: AtomicU64::new(0),
            timeout_waiting: Mutex::new(false),
            wait_ctx_list: Mutex::new(Vec::new()),
            next_wait_id: AtomicU64::new(0),
            gc_list: Mutex::new(Vec::new()),
            term_start: AtomicBool::new(false),
            term_lock: Mutex::new(()),
            self_weak: weak.clone(),
        }))
    }

    fn wake_one(&self) {
        let _ = self.wakeup_set_readiness.set_readiness(Ready::readable());
    }

    /// Registers a signal and begins driving its I/O.
    pub fn attach(&self, mut signal: Box<dyn Signal>) -> Arc<SignalEntry> {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));
        signal.set_handle(SignalHandle {
            reactor: self.self_weak.clone(),
            token,
        });

        let entry = Arc::new(SignalEntry::new(token, signal));
        {
            let mut map = self.sig_map.lock().unwrap();
            map.insert(token, entry.clone());
        }

        let want = entry.inner.lock().unwrap().flags;
        let ready = event_flags_to_ready(want);
        {
            let inner = entry.inner.lock().unwrap();
            let _ = inner.signal.register(&self.poll, token, ready, PollOpt::edge());
        }
        entry
    }

    /// Sets (or replaces) a signal's timeout, forwarded from
    /// `SignalHandle::set_timeout`.
    pub fn set_timeout(&self, token: Token, when: Instant) {
        let entry = match self.sig_map.lock().unwrap().get(&token).cloned() {
            Some(e) => e,
            None => return,
        };
        let seq = self.next_timeout_seq.fetch_add(1, Ordering::Relaxed);
        let mut became_earliest = false;
        {
            // Per-signal `inner` is acquired before the Timeout Queue here,
            // matching `dispatch_one`'s lock order (inner, then the global
            // queue locks it may touch while detaching) rather than the
            // reverse, to avoid an AB-BA deadlock between the two.
            let mut inner = entry.inner.lock().unwrap();
            let mut tq = self.timeout_queue.lock().unwrap();
            if let Some(old_at) = inner.timeout_at {
                tq.remove(&(old_at, inner.timeout_seq));
            }
            inner.timeout_at = Some(when);
            inner.timeout_seq = seq;
            if let Some((&(earliest, _), _)) = tq.iter().next() {
                became_earliest = when < earliest;
            } else {
                became_earliest = true;
            }
            tq.insert((when, seq), token);
        }
        if became_earliest {
            self.wake_one();
        }
    }

    pub fn clear_timeout(&self, token: Token) {
        let entry = match self.sig_map.lock().unwrap().get(&token).cloned() {
            Some(e) => e,
            None => return,
        };
        let mut inner = entry.inner.lock().unwrap();
        let mut tq = self.timeout_queue.lock().unwrap();
        if let Some(at) = inner.timeout_at.take() {
            tq.remove(&(at, inner.timeout_seq));
        }
    }

    /// Marks a signal ready for another dispatch without waiting for a
    /// fresh OS readiness edge (used to re-arm write-ready after queueing
    /// onto an already-writable, edge-triggered socket).
    pub fn request_ready(&self, token: Token, flags: EventFlags) {
        let entry = match self.sig_map.lock().unwrap().get(&token).cloned() {
            Some(e) => e,
            None => return,
        };
        let push = {
            let mut inner = entry.inner.lock().unwrap();
            inner.flags.insert(flags);
            if inner.state == DispatchState::Inactive {
                inner.state = DispatchState::Queued;
                true
            } else {
                false
            }
        };
        if push {
            self.ready_queue.lock().unwrap().push_back(entry);
        }
        self.wake_one();
    }

    /// Marks a signal for detachment. Always asynchronous: the signal is
    /// not destroyed on the calling thread.
    pub fn request_detach(&self, token: Token) {
        let entry = match self.sig_map.lock().unwrap().get(&token).cloned() {
            Some(e) => e,
            None => return,
        };
        let push = {
            let mut inner = entry.inner.lock().unwrap();
            inner.flags.insert(EventFlags::DETACH);
            if inner.state == DispatchState::Inactive {
                inner.state = DispatchState::Queued;
                true
            } else {
                false
            }
        };
        if push {
            self.ready_queue.lock().unwrap().push_back(entry);
        }
        self.wake_one();
    }

    /// Marks every currently-attached signal for detach and wakes a thread.
    pub fn terminate(&self) {
        let _term_guard = self.term_lock.lock().unwrap();
        self.term_start.store(true, Ordering::SeqCst);
        let tokens: Vec<Token> = self.sig_map.lock().unwrap().keys().cloned().collect();
        drop(_term_guard);
        for token in tokens {
            self.request_detach(token);
        }
        self.wake_one();
    }

    /// Runs the reactor in the current thread until `terminate()` is called
    /// and the Ready Queue drains.
    pub fn run(&self) -> io::Result<()> {
        let wait_id = self.next_wait_id.fetch_add(1, Ordering::Relaxed);
        loop {
            self.enter_wait(wait_id);

            let mut claimed_timeout_role = false;
            let timeout = {
                let mut waiting = self.timeout_waiting.lock().unwrap();
                if !*waiting {
                    let tq = self.timeout_queue.lock().unwrap();
                    if let Some((&(earliest, _), _)) = tq.iter().next() {
                        *waiting = true;
                        claimed_timeout_role = true;
                        let now = Instant::now();
                        Some(if earliest > now { earliest - now } else { Duration::from_millis(0) })
                    } else {
                        None
                    }
                } else {
                    None
                }
            };

            let mut events = Events::with_capacity(DRAIN_BATCH);
            let poll_result = self.poll.poll(&mut events, timeout);

            if claimed_timeout_role {
                *self.timeout_waiting.lock().unwrap() = false;
            }

            match poll_result {
                Ok(_) => {}
                Err(e) => {
                    self.exit_wait(wait_id);
                    return Err(e);
                }
            }

            let mut terminating = false;
            for event in events.iter() {
                if event.token() == self.wakeup_token {
                    if self.term_start.load(Ordering::SeqCst) {
                        terminating = true;
                        // The wakeup registration is a single edge-triggered
                        // event; only this thread observes it. Re-arm it so
                        // the next thread blocked in poll() wakes too, and
                        // so on until every thread has seen termination.
                        self.wake_one();
                    }
                    continue;
                }
                let entry = self.sig_map.lock().unwrap().get(&event.token()).cloned();
                let entry = match entry {
                    Some(e) => e,
                    None => continue,
                };
                let push = {
                    let mut inner = entry.inner.lock().unwrap();
                    let readiness = event.readiness();
                    if readiness.is_readable() {
                        inner.flags.insert(EventFlags::READ);
                    }
                    if readiness.is_writable() {
                        inner.flags.insert(EventFlags::WRITE);
                    }
                    if inner.state == DispatchState::Inactive {
                        inner.state = DispatchState::Queued;
                        true
                    } else {
                        false
                    }
                };
                if push {
                    self.ready_queue.lock().unwrap().push_back(entry);
                }
            }

            self.expire_timeouts();
            self.exit_wait(wait_id);
            self.drain_ready();

            if terminating && self.ready_queue.lock().unwrap().is_empty() {
                return Ok(());
            }
        }
    }

    fn enter_wait(&self, id: u64) {
        self.wait_ctx_list.lock().unwrap().push(WaitCtx { id });
    }

    /// Leaves the Wait state, then steps every still-pending GC entry past
    /// this wait-context, releasing any whose pending set becomes empty.
    fn exit_wait(&self, id: u64) {
        {
            let mut list = self.wait_ctx_list.lock().unwrap();
            if let Some(pos) = list.iter().position(|c| c.id == id) {
                list.remove(pos);
            }
        }
        let mut released = Vec::new();
        {
            let mut gc = self.gc_list.lock().unwrap();
            gc.retain(|g| {
                let mut pending = g.pending.lock().unwrap();
                if let Some(pos) = pending.iter().position(|&x| x == id) {
                    pending.remove(pos);
                }
                if pending.is_empty() {
                    released.push(g.entry.clone());
                    false
                } else {
                    true
                }
            });
        }
        for entry in released {
            let mut inner = entry.inner.lock().unwrap();
            inner.signal.detached();
        }
    }

    fn expire_timeouts(&self) {
        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let mut tq = self.timeout_queue.lock().unwrap();
            loop {
                let key = match tq.iter().next() {
                    Some((&(at, seq), &token)) if at <= now => (at, seq, token),
                    _ => break,
                };
                tq.remove(&(key.0, key.1));
                expired.push(key.2);
            }
        }
        for token in expired {
            let entry = self.sig_map.lock().unwrap().get(&token).cloned();
            let entry = match entry {
                Some(e) => e,
                None => continue,
            };
            let push = {
                let mut inner = entry.inner.lock().unwrap();
                inner.timeout_at = None;
                inner.flags.insert(EventFlags::TIMEOUT);
                if inner.state == DispatchState::Inactive {
                    inner.state = DispatchState::Queued;
                    true
                } else {
                    false
                }
            };
            if push {
                self.ready_queue.lock().unwrap().push_back(entry);
            }
        }
    }

    /// Drains up to `DRAIN_BATCH` ready entries, dispatching each in the
    /// fixed order read -> write -> timeout -> detach.
    fn drain_ready(&self) {
        for _ in 0..DRAIN_BATCH {
            let entry = match self.ready_queue.lock().unwrap().pop_front() {
                Some(e) => e,
                None => break,
            };
            {
                let mut inner = entry.inner.lock().unwrap();
                inner.state = DispatchState::InProgress;
            }
            self.dispatch_one(&entry);
        }
    }

    fn dispatch_one(&self, entry: &Arc<SignalEntry>) {
        let mut inner = entry.inner.lock().unwrap();

        if inner.flags.contains(EventFlags::READ) {
            match inner.signal.read_ready() {
                ReadyResult::OpComplete => inner.flags.remove(EventFlags::READ),
                ReadyResult::OpIncomplete => {}
                ReadyResult::SignalComplete => inner.flags.insert(EventFlags::DETACH),
            }
        }
        if inner.flags.contains(EventFlags::WRITE) {
            match inner.signal.write_ready() {
                ReadyResult::OpComplete => inner.flags.remove(EventFlags::WRITE),
                ReadyResult::OpIncomplete => {}
                ReadyResult::SignalComplete => inner.flags.insert(EventFlags::DETACH),
            }
        }
        if inner.flags.contains(EventFlags::TIMEOUT) {
            inner.signal.timed_out();
            inner.flags.remove(EventFlags::TIMEOUT);
        }
        if inner.flags.contains(EventFlags::DETACH) {
            inner.signal.detaching();
            let _ = inner.signal.deregister(&self.poll);
            self.sig_map.lock().unwrap().remove(&entry.token);
            if let Some(at) = inner.timeout_at.take() {
                self.timeout_queue.lock().unwrap().remove(&(at, inner.timeout_seq));
            }
            inner.flags.remove(EventFlags::DETACH);
            drop(inner);

            let waiters: Vec<u64> = self
                .wait_ctx_list
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.id)
                .collect();
            if waiters.is_empty() {
                entry.inner.lock().unwrap().signal.detached();
            } else {
                self.gc_list.lock().unwrap().push(GcEntry {
                    entry: entry.clone(),
                    pending: Mutex::new(waiters),
                });
            }
            return;
        }

        let still_ready = !inner.flags.is_empty();
        inner.state = if still_ready {
            DispatchState::Queued
        } else {
            DispatchState::Inactive
        };
        let requeue = still_ready;
        drop(inner);
        if requeue {
            self.ready_queue.lock().unwrap().push_back(entry.clone());
        }
    }
}

fn event_flags_to_ready(flags: EventFlags) -> Ready {
    let mut ready = Ready::empty();
    if flags.contains(EventFlags::READ) {
        ready = ready | Ready::readable();
    }
    if flags.contains(EventFlags::WRITE) {
        ready = ready | Ready::writable();
    }
    ready
}

#[cfg(test)]
mod test {
    use super::Reactor;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn terminate_with_no_signals_returns_promptly() {
        let reactors: Vec<Arc<Reactor>> = (0..1).map(|_| Reactor::new().unwrap()).collect();
        let reactor = reactors[0].clone();
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
}
