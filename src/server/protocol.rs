//! The `Handler` trait: the one seam a caller of this crate actually
//! implements.
//!
//! Resolved Open Question (see SPEC_FULL.md §9 and DESIGN.md): grounded on
//! the teacher's `server::protocol::Server` trait and `http1.rs`'s
//! `Handler<C>`, reduced to a single method since this crate's `Request`
//! is always fully buffered (no `RecvMode::Progressive` streaming surface
//! — see DESIGN.md for why that mode isn't carried over).

use consume::request::Request;
use server::response::Response;

/// Invoked once per fully-decoded request, on whichever reactor thread
/// owns the connection (spec.md §5: user handlers run on reactor threads
/// and must not themselves block on I/O).
pub trait Handler: Send + Sync {
    fn handle(&self, req: &mut Request, resp: &mut Response);
}

impl<F> Handler for F
    where F: Fn(&mut Request, &mut Response) + Send + Sync
{
    fn handle(&self, req: &mut Request, resp: &mut Response) {
        (self)(req, resp)
    }
}
