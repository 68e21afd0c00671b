//! The epoll-driven I/O multiplexer: a many-threaded reactor that owns
//! heterogeneous event sources ("signals"), dispatches readiness to them,
//! and concurrently garbage-collects detached signals.
//!
//! See `reactor` for the dispatch loop, `signal` for the `Signal` trait
//! every event source implements, `entry` for the Signal Map's internal
//! bookkeeping, and `connection`/`listener`/`timer` for the three concrete
//! signal types.

pub mod connection;
pub mod entry;
pub mod listener;
pub mod reactor;
pub mod signal;
pub mod timer;

pub use self::connection::{ConnWriter, ConnectionHandler, ConnectionSignal};
pub use self::entry::SignalEntry;
pub use self::listener::{Acceptor, ListenerSignal};
pub use self::reactor::Reactor;
pub use self::signal::{EventFlags, ReadyResult, Signal, SignalHandle};
