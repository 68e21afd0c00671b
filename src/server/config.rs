//! Server configuration surface (spec.md §6): `{ max_header_size,
//! read_timeout, write_timeout, root_handler }`. The handler itself is not
//! a `Config` field here — it is passed to `server::serve` directly, so
//! `Config` doesn't need to be generic over the handler type; see
//! DESIGN.md for this Open-Question resolution.

use std::time::Duration;

/// Tunables for a running server. `Default` matches the values spec.md §6
/// documents.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound, in bytes, on the request line plus header block.
    /// Exceeding it fails the request with `RequestUriTooLong` or
    /// `RequestEntityTooLarge` depending on which sub-consumer was active.
    pub max_header_size: u32,
    /// How long a connection may sit idle without the peer sending (more)
    /// bytes before it is detached.
    pub read_timeout: Duration,
    /// How long a connection may sit idle without the peer accepting
    /// (more) response bytes before it is detached.
    pub write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_header_size: 8 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.max_header_size, 8192);
    }
}
