#[macro_use] extern crate quick_error;
#[macro_use] extern crate log;
extern crate mio;

pub mod consume;
pub mod header_map;
pub mod status;
pub mod uri;
pub mod net;
pub mod mux;
pub mod server;

pub use header_map::HeaderMap;
pub use status::StatusCode;
pub use uri::Uri;
pub use consume::request::Request;
