//! A lightweight reliable transport protocol over UDP: three-way handshake,
//! sliding-window flow control, TCP-style slow-start/congestion-avoidance/
//! fast-retransmit congestion control, CRC-32 payload integrity, and a
//! four-way graceful teardown.
//!
//! The central type is [`Connection`]: open one with [`Connection::open`],
//! drive the handshake with [`Connection::connect`] or
//! [`Connection::listen`] + [`Connection::accept`], exchange data with
//! [`Connection::send`]/[`Connection::recv`], and close with
//! [`Connection::shutdown`].
//!
//! ```no_run
//! use microtp::{open, AddrFamily, Role};
//!
//! # fn main() -> microtp::Result<()> {
//! let mut conn = open(AddrFamily::V4)?;
//! conn.connect("127.0.0.1:9000".parse().unwrap())?;
//! conn.send(b"hello")?;
//! conn.shutdown(Role::Initiator)?;
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod handshake;
mod header;
mod recv;
mod send;
mod seq;
mod teardown;
#[cfg(test)]
mod test_support;
mod transport;

pub use connection::{Config, Connection, Role, State, Stats};
pub use error::{Error, Result};
pub use handshake::{open, open_on};
pub use header::{Control, Header, HEADER_LEN};
pub use transport::{AddrFamily, DatagramTransport, UdpTransport};
