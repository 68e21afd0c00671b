//! TCP socket primitives and address handling.
//!
//! `Socket` and the address-resolution helpers are the thin layer the
//! reactor core in `mux` sits on top of: it never depends on anything here
//! beyond the `mio::Evented` registration and the `Status`/`Flags`
//! vocabulary, so a different transport could be swapped in underneath
//! without touching dispatch.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use mio::{Evented, Poll, PollOpt, Ready, Token};

/// Minimal `bitflags!`-shaped macro for small, fixed bit-sets, used here to
/// avoid pulling in a whole crate for a three-bit set.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
        pub struct $name($ty);
        impl $name {
            $(pub const $variant: $name = $name($value);)*
            pub fn empty() -> $name { $name(0) }
            pub fn contains(&self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }
        impl ::std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name { $name(self.0 | rhs.0) }
        }
    };
}

/// Outcome of a socket operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    WouldBlock,
    InProgress,
    TimedOut,
    ConnRefused,
    NetUnreachable,
    Reset,
    Aborted,
    NoResource,
    Permission,
}

impl Status {
    /// Classifies an `io::Error` at the socket boundary into a `Status`.
    pub fn from_io_error(e: &io::Error) -> Status {
        use std::io::ErrorKind::*;
        match e.kind() {
            WouldBlock => Status::WouldBlock,
            TimedOut => Status::TimedOut,
            ConnectionRefused => Status::ConnRefused,
            ConnectionReset | BrokenPipe => Status::Reset,
            ConnectionAborted => Status::Aborted,
            PermissionDenied => Status::Permission,
            _ => match e.raw_os_error() {
                Some(raw) if raw == ENETUNREACH => Status::NetUnreachable,
                Some(raw) if raw == EMFILE || raw == ENFILE => Status::NoResource,
                _ => Status::Ok,
            },
        }
    }
}

// Avoids an explicit `libc` dependency for two constants.
#[cfg(target_os = "linux")]
const ENETUNREACH: i32 = 101;
#[cfg(not(target_os = "linux"))]
const ENETUNREACH: i32 = 51;
#[cfg(target_os = "linux")]
const EMFILE: i32 = 24;
#[cfg(not(target_os = "linux"))]
const EMFILE: i32 = 24;
const ENFILE: i32 = 23;

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Status::*;
        let s = match *self {
            Ok => "ok",
            WouldBlock => "operation would block",
            InProgress => "operation in progress",
            TimedOut => "timed out",
            ConnRefused => "connection refused",
            NetUnreachable => "network unreachable",
            Reset => "connection reset",
            Aborted => "connection aborted",
            NoResource => "no resource available",
            Permission => "permission denied",
        };
        f.write_str(s)
    }
}

bitflags_like! {
    /// Bit-set passed to `send`/`recv`.
    pub struct Flags: u8 {
        const NONBLOCK = 1 << 0;
        const FIN = 1 << 1;
        const ALL = 1 << 2;
    }
}

/// Which IP family an address string selects: a leading `[` means IPv6, a
/// successful IPv4 parse means IPv4, anything else falls back to IPv6.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Family {
    Tcp4,
    Tcp6,
}

/// Splits a `host:port` (or `[addr]:port`) address string into its host and
/// port components; either half may be empty.
pub fn split_host_port(addr: &str) -> Result<(&str, &str), &'static str> {
    if addr.starts_with('[') {
        let close = addr.find(']').ok_or("missing ']' in IPv6 address")?;
        let host = &addr[1..close];
        let rest = &addr[close + 1..];
        let port = if let Some(stripped) = rest.strip_prefix(':') {
            stripped
        } else if rest.is_empty() {
            ""
        } else {
            return Err("expected ':' after ']'");
        };
        Ok((host, port))
    } else {
        match addr.rfind(':') {
            Some(idx) => Ok((&addr[..idx], &addr[idx + 1..])),
            None => Ok((addr, "")),
        }
    }
}

/// Determines the address family for a host string.
pub fn family_of(host: &str) -> Family {
    if host.starts_with('[') {
        return Family::Tcp6;
    }
    if host.is_empty() {
        // An empty host means "all interfaces"; resolved to the IPv4 wildcard.
        return Family::Tcp4;
    }
    if host.parse::<::std::net::Ipv4Addr>().is_ok() {
        Family::Tcp4
    } else {
        Family::Tcp6
    }
}

/// Resolves a `host:port` string into a concrete `SocketAddr`, substituting
/// family-appropriate wildcards for empty components.
pub fn resolve(addr: &str) -> Result<SocketAddr, &'static str> {
    let (host, port) = split_host_port(addr)?;
    let family = family_of(host);
    let port: u16 = if port.is_empty() {
        0
    } else {
        port.parse().map_err(|_| "invalid port")?
    };
    let host = if host.is_empty() {
        match family {
            Family::Tcp4 => "0.0.0.0",
            Family::Tcp6 => "::",
        }
    } else {
        host
    };
    let ip: ::std::net::IpAddr = host.parse().map_err(|_| "invalid host")?;
    Ok(SocketAddr::new(ip, port))
}

/// A non-blocking TCP socket, either a listener or a connected stream.
///
/// A closed two-variant enum rather than an erased trait object, since
/// there are only ever two shapes and callers need to match on which one
/// they hold (accept only makes sense on a listener, send/recv only on a
/// stream).
pub enum Socket {
    Listener(TcpListener),
    Stream(TcpStream),
}

impl Socket {
    /// Binds and listens on `addr`.
    pub fn listen(addr: &str) -> io::Result<Socket> {
        let sockaddr = resolve(addr)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        TcpListener::bind(&sockaddr).map(Socket::Listener)
    }

    /// Non-blocking accept. Returns `Ok(None)` on `WouldBlock`/no pending
    /// connection, so callers can loop until the listener is drained.
    pub fn accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match *self {
            Socket::Listener(ref l) => match l.accept() {
                Ok((stream, addr)) => Ok(Some((stream, addr))),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(e),
            },
            Socket::Stream(_) => {
                Err(io::Error::new(io::ErrorKind::InvalidInput, "accept on a stream socket"))
            }
        }
    }

    /// Non-blocking send. `ALL` loops until the whole buffer is accepted or
    /// an error (other than `WouldBlock`) occurs; `FIN` shuts down the
    /// write half afterward.
    pub fn send(&self, buf: &[u8], flags: Flags) -> (Status, usize) {
        use std::io::Write;
        let stream = match *self {
            Socket::Stream(ref s) => s,
            Socket::Listener(_) => return (Status::Ok, 0),
        };
        let mut sent = 0;
        loop {
            match (&*stream).write(&buf[sent..]) {
                Ok(0) => break,
                Ok(n) => {
                    sent += n;
                    if sent == buf.len() || !flags.contains(Flags::ALL) {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return (Status::WouldBlock, sent);
                }
                Err(ref e) => return (Status::from_io_error(e), sent),
            }
        }
        if flags.contains(Flags::FIN) {
            let _ = stream.shutdown(::std::net::Shutdown::Write);
        }
        (Status::Ok, sent)
    }

    /// Non-blocking receive.
    pub fn recv(&self, buf: &mut [u8], flags: Flags) -> (Status, usize) {
        use std::io::Read;
        let stream = match *self {
            Socket::Stream(ref s) => s,
            Socket::Listener(_) => return (Status::Ok, 0),
        };
        let mut got = 0;
        loop {
            match (&*stream).read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => {
                    got += n;
                    if got == buf.len() || !flags.contains(Flags::ALL) {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if got == 0 {
                        return (Status::WouldBlock, 0);
                    }
                    break;
                }
                Err(ref e) => return (Status::from_io_error(e), got),
            }
        }
        (Status::Ok, got)
    }

    pub fn shutdown(&self) -> io::Result<()> {
        match *self {
            Socket::Stream(ref s) => s.shutdown(::std::net::Shutdown::Both),
            Socket::Listener(_) => Ok(()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match *self {
            Socket::Listener(ref l) => l.local_addr(),
            Socket::Stream(ref s) => s.local_addr(),
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match *self {
            Socket::Listener(_) => {
                Err(io::Error::new(io::ErrorKind::InvalidInput, "no peer for a listener"))
            }
            Socket::Stream(ref s) => s.peer_addr(),
        }
    }
}

impl Evented for Socket {
    fn register(&self, poll: &Poll, token: Token, interest: Ready, opts: PollOpt) -> io::Result<()> {
        match *self {
            Socket::Listener(ref l) => l.register(poll, token, interest, opts),
            Socket::Stream(ref s) => s.register(poll, token, interest, opts),
        }
    }

    fn reregister(&self, poll: &Poll, token: Token, interest: Ready, opts: PollOpt) -> io::Result<()> {
        match *self {
            Socket::Listener(ref l) => l.reregister(poll, token, interest, opts),
            Socket::Stream(ref s) => s.reregister(poll, token, interest, opts),
        }
    }

    fn deregister(&self, poll: &Poll) -> io::Result<()> {
        match *self {
            Socket::Listener(ref l) => l.deregister(poll),
            Socket::Stream(ref s) => s.deregister(poll),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{family_of, split_host_port, Family};

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_host_port("example.com:80").unwrap(), ("example.com", "80"));
        assert_eq!(split_host_port(":8080").unwrap(), ("", "8080"));
        assert_eq!(split_host_port("localhost").unwrap(), ("localhost", ""));
    }

    #[test]
    fn splits_ipv6_host_and_port() {
        assert_eq!(split_host_port("[::1]:80").unwrap(), ("::1", "80"));
        assert_eq!(split_host_port("[::1]").unwrap(), ("::1", ""));
    }

    #[test]
    fn dispatches_family_by_shape() {
        assert_eq!(family_of("127.0.0.1"), Family::Tcp4);
        assert_eq!(family_of("[::1]"), Family::Tcp6);
        assert_eq!(family_of("::1"), Family::Tcp6);
        assert_eq!(family_of(""), Family::Tcp4);
    }
}
