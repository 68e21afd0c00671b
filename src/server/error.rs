//! Server-side error types (spec.md §7).
//!
//! Grounded on the teacher's `quick_error!` usage for
//! `server::error::RequestError` — the same macro, a different and
//! smaller variant set, since this crate's consumers already reduce every
//! parse failure to a `(StatusCode, &'static str)` pair rather than the
//! teacher's `httparse`-sourced structured errors.

use std::error::Error;
use std::io;

use consume::ParseError;

quick_error! {
    /// An error surfacing out of the server glue layer. Parse errors and
    /// I/O errors are both fatal to the current connection (per spec.md
    /// §7's propagation policy); a caught handler panic is reported the
    /// same way a parse error would be, as a 500.
    #[derive(Debug)]
    pub enum ServerError {
        Parse(err: ParseError) {
            from()
            description("malformed request")
            display(me) -> ("{}: {}", me.description(), err)
        }
        Io(err: io::Error) {
            from()
            description("I/O error")
            display(me) -> ("{}: {}", me.description(), err)
        }
        HandlerPanicked {
            description("request handler panicked")
        }
    }
}
