//! The datagram transport collaborator (spec §6): an unreliable, connected,
//! ordered-within-a-send-call pipe with a per-receive timeout. This is the
//! one piece the spec marks as "provided by the runtime" rather than core
//! protocol logic — `UdpTransport` is the real implementation over
//! `std::net::UdpSocket`; tests substitute a lossy in-memory transport to
//! drive the timeout and fast-retransmit scenarios deterministically.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::Result;

/// Address family requested from `open` (spec §6). µTP only ever runs over
/// IPv4 or IPv6 UDP sockets; there is no unix-domain or raw-socket mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    V4,
    V6,
}

/// Abstracts the unreliable datagram pipe a `Connection` is built on.
///
/// Requires `Send` so a whole `Connection` can be handed to a worker thread
/// (e.g. a server that spawns one thread per accepted connection), matching
/// how `UdpSocket` itself behaves. Implementations are not required to be
/// `Sync`; a `Connection` owns exactly one transport for its whole lifetime
/// (§5) and never shares it.
pub trait DatagramTransport: Send {
    fn bind(&mut self, addr: SocketAddr) -> Result<()>;

    /// Sets the default peer for subsequent `send`/`recv` calls.
    fn connect(&mut self, addr: SocketAddr) -> Result<()>;

    fn send(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Reads one datagram. Honors whatever timeout `set_recv_timeout` last
    /// configured: `Ok` with 0 bytes is never returned by `UdpTransport` (a
    /// zero-length UDP datagram is legal but not part of this protocol's
    /// framing); a timed-out read surfaces as `Error::Transport` wrapping
    /// an `io::Error` of kind `WouldBlock` or `TimedOut`.
    fn recv(&mut self, out: &mut [u8]) -> Result<usize>;

    /// Reads one datagram from any sender, before a peer has been fixed via
    /// `connect`. Used by `accept` (`Listen` state) to learn the initiator's
    /// address from the first SYN.
    fn recv_from(&mut self, out: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// `None` disables the timeout (block indefinitely); `Some(d)` arms a
    /// per-receive timeout of `d` (§5 Suspension points).
    fn set_recv_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Best-effort local address, used by `accept` to report the peer.
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// The address this transport is bound to. Mainly useful in tests that
    /// bind to port 0 and need to learn the ephemeral port picked by the OS.
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// The runtime-provided transport: a connected `UdpSocket`.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl UdpTransport {
    pub fn open(family: AddrFamily) -> Result<UdpTransport> {
        let any = match family {
            AddrFamily::V4 => "0.0.0.0:0",
            AddrFamily::V6 => "[::]:0",
        };
        let socket = UdpSocket::bind(any)?;
        Ok(UdpTransport { socket, peer: None })
    }

    /// Wraps an already-bound socket (used by the passive-open path once
    /// the peer's address has been learned from the first SYN).
    pub fn from_socket(socket: UdpSocket) -> UdpTransport {
        UdpTransport { socket, peer: None }
    }
}

impl DatagramTransport for UdpTransport {
    fn bind(&mut self, addr: SocketAddr) -> Result<()> {
        self.socket = UdpSocket::bind(addr)?;
        Ok(())
    }

    fn connect(&mut self, addr: SocketAddr) -> Result<()> {
        self.socket.connect(addr)?;
        self.peer = Some(addr);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        Ok(self.socket.send(bytes)?)
    }

    fn recv(&mut self, out: &mut [u8]) -> Result<usize> {
        Ok(self.socket.recv(out)?)
    }

    fn recv_from(&mut self, out: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(out)?)
    }

    fn set_recv_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
