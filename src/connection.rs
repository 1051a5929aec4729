//! The connection record: the authoritative state of one µTP connection
//! (spec §3). Grounded in `microtcp_sock_t` from the original C reference
//! implementation and in the teacher crate's `TCB`, but flattened to a
//! single-connection, single-owner record — there is no `Manager`/`NetStack`
//! broker here, because µTP runs one connection directly over one UDP
//! socket instead of demultiplexing many peers behind one bound port.

use std::net::SocketAddr;

use log::debug;

use crate::error::{Error, Result};
use crate::transport::{AddrFamily, DatagramTransport, UdpTransport};

/// Protocol constants (spec §3, §6). Exposed as a `Config` so tests can
/// shrink `recvbuf`/`mss`/`ack_timeout` without touching protocol logic;
/// `Default` reproduces the numbers the spec fixes.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub mss: u32,
    pub recvbuf: u32,
    pub ack_timeout: std::time::Duration,
    pub dup_ack_threshold: u32,
    /// Not part of the base spec (§9 Open Question: "Retransmit bound").
    /// `None` reproduces the spec's unbounded retransmit behavior.
    pub max_retransmits: Option<u32>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            mss: 1400,
            recvbuf: 8192,
            ack_timeout: std::time::Duration::from_millis(200),
            dup_ack_threshold: 3,
            max_retransmits: None,
        }
    }
}

impl Config {
    pub fn init_cwnd(&self) -> u32 {
        3 * self.mss
    }

    pub fn init_ssthresh(&self) -> u32 {
        self.recvbuf
    }
}

/// Connection state machine (spec §3). `SlowStart`/`CongAvoid` are data-phase
/// substates entered once the handshake completes; `Invalid` is the
/// terminal error state for handshake/teardown protocol violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Invalid,
    Listen,
    Established,
    SlowStart,
    CongAvoid,
    ClosingByPeer,
    ClosingByHost,
    Closed,
}

impl State {
    /// True once the handshake has completed and the connection may carry
    /// application data (§3: "state == CLOSED ⇒ ...", extended here to the
    /// full set of disallowed-for-send/recv states).
    pub fn is_data_capable(self) -> bool {
        matches!(self, State::Established | State::SlowStart | State::CongAvoid)
    }
}

/// Opaque pretty-printable byte/packet counters (spec §3). These are
/// diagnostics, not protocol state: nothing in the send/receive engines
/// reads them back (§9 "Global counters").
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub bytes_lost: u64,
}

/// Role passed to `shutdown` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// The connection record (spec §3). Exclusively owned by one caller;
/// concurrent use of the same `Connection` from multiple threads is
/// undefined (it is not `Sync`, by virtue of holding a non-atomic
/// `Box<dyn DatagramTransport>`).
pub struct Connection {
    pub(crate) transport: Box<dyn DatagramTransport>,
    pub(crate) config: Config,

    pub(crate) state: State,

    pub(crate) seq_number: u32,
    pub(crate) ack_number: u32,

    pub(crate) init_win_size: u16,
    pub(crate) curr_win_size: u16,

    pub(crate) cwnd: u32,
    pub(crate) ssthresh: u32,
    pub(crate) peer_window: Option<u16>,

    pub(crate) recvbuf: Vec<u8>,
    pub(crate) buf_fill_level: usize,

    pub(crate) stats: Stats,
}

impl Connection {
    /// `open` (spec §6): allocates the receive buffer and the congestion
    /// parameters, but does not touch the network yet.
    pub fn open(family: AddrFamily) -> Result<Connection> {
        Self::open_with_config(family, Config::default())
    }

    pub fn open_with_config(family: AddrFamily, config: Config) -> Result<Connection> {
        let transport = UdpTransport::open(family)?;
        let recvbuf = vec![0u8; config.recvbuf as usize];

        Ok(Connection {
            transport: Box::new(transport),
            cwnd: config.init_cwnd(),
            ssthresh: config.init_ssthresh(),
            init_win_size: config.recvbuf as u16,
            curr_win_size: config.recvbuf as u16,
            recvbuf,
            config,
            state: State::Invalid,
            seq_number: 0,
            ack_number: 0,
            peer_window: None,
            buf_fill_level: 0,
            stats: Stats::default(),
        })
    }

    /// Swaps in a caller-provided transport (used by tests to inject a
    /// lossy in-memory pipe, and by `accept` once the peer address is
    /// known).
    pub fn with_transport(transport: Box<dyn DatagramTransport>, config: Config) -> Connection {
        let recvbuf = vec![0u8; config.recvbuf as usize];
        Connection {
            transport,
            cwnd: config.init_cwnd(),
            ssthresh: config.init_ssthresh(),
            init_win_size: config.recvbuf as u16,
            curr_win_size: config.recvbuf as u16,
            recvbuf,
            config,
            state: State::Invalid,
            seq_number: 0,
            ack_number: 0,
            peer_window: None,
            buf_fill_level: 0,
            stats: Stats::default(),
        }
    }

    pub fn bind(&mut self, addr: SocketAddr) -> Result<()> {
        self.transport.bind(addr)
    }

    /// The address this connection's transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Free space currently advertised to the peer (`RECVBUF - buf_fill_level`).
    pub(crate) fn advertised_window(&self) -> u16 {
        (self.config.recvbuf as usize - self.buf_fill_level) as u16
    }

    pub(crate) fn set_invalid(&mut self, reason: &'static str) -> Error {
        debug!("state -> Invalid ({reason})");
        self.state = State::Invalid;
        Error::ConnectionAborted(reason)
    }

    /// Fails fast for `send`/`recv` calls outside the data-transfer phase
    /// (spec §4.3, §4.4: "Fails if state is INVALID or at/past CLOSING_BY_PEER").
    pub(crate) fn require_data_phase(&self) -> Result<()> {
        if self.state == State::Invalid {
            return Err(Error::InvalidState(self.state));
        }
        if matches!(self.state, State::ClosingByPeer | State::ClosingByHost | State::Closed) {
            return Err(Error::InvalidState(self.state));
        }
        Ok(())
    }
}
