//! Three-way handshake (spec §4.2): active open (`connect`) and passive
//! open (`listen` + `accept`), mirroring `microtcp_connect`/`microtcp_accept`
//! from the original C reference implementation.

use std::net::SocketAddr;

use log::debug;
use rand::random;

use crate::connection::{Connection, State};
use crate::error::{Error, Result};
use crate::header::{Control, Header, HEADER_LEN};
use crate::transport::{AddrFamily, DatagramTransport, UdpTransport};

impl Connection {
    /// Moves a freshly `open`ed connection into `Listen`, ready for `accept`.
    pub fn listen(&mut self, addr: SocketAddr) -> Result<()> {
        self.bind(addr)?;
        self.state = State::Listen;
        debug!("state -> Listen on {addr}");
        Ok(())
    }

    /// Active open (spec §4.2).
    pub fn connect(&mut self, addr: SocketAddr) -> Result<()> {
        self.seq_number = random::<u32>();
        self.transport.connect(addr)?;

        let syn = Header::for_send(self.seq_number, 0, Control::SYN, self.config.recvbuf as u16, &[]);
        self.send_header(&syn)?;
        debug!("sent SYN seq={}", self.seq_number);

        let header = self.recv_header()?;
        if !(header.control.has(Control::SYN) && header.control.has(Control::ACK)) {
            return Err(self.set_invalid("expected SYN|ACK during active open"));
        }

        self.seq_number = self.seq_number.wrapping_add(1);
        self.ack_number = header.seq_number.wrapping_add(1);
        self.peer_window = Some(header.window);
        debug!("received SYN|ACK seq={} window={}", header.seq_number, header.window);

        let ack = Header::for_send(self.seq_number, self.ack_number, Control::ACK, self.advertised_window(), &[]);
        self.send_header(&ack)?;

        self.state = State::SlowStart;
        debug!("state -> SlowStart");
        Ok(())
    }

    /// Passive open (spec §4.2): blocks on the listening transport until a
    /// SYN arrives, then completes the three-way handshake with that peer.
    pub fn accept(&mut self) -> Result<SocketAddr> {
        if self.state != State::Listen {
            return Err(Error::InvalidState(self.state));
        }

        let mut buf = [0u8; HEADER_LEN];
        let (n, peer) = self.transport.recv_from(&mut buf)?;
        if n != HEADER_LEN {
            return Err(self.set_invalid("malformed datagram during passive open"));
        }
        let header = Header::decode(&buf);
        if header.verify(&[]).is_err() {
            return Err(self.set_invalid("corrupt datagram during passive open"));
        }

        if !header.control.has(Control::SYN) {
            return Err(self.set_invalid("expected SYN during passive open"));
        }

        self.transport.connect(peer)?;

        self.peer_window = Some(header.window);
        self.ack_number = header.seq_number.wrapping_add(1);
        self.seq_number = random::<u32>();
        debug!("received SYN from {peer} seq={}", header.seq_number);

        let synack = Header::for_send(
            self.seq_number,
            self.ack_number,
            Control::SYN | Control::ACK,
            self.config.recvbuf as u16,
            &[],
        );
        self.send_header(&synack)?;
        debug!("sent SYN|ACK seq={}", self.seq_number);

        let final_ack = self.recv_header()?;
        if !final_ack.control.has(Control::ACK) {
            return Err(self.set_invalid("expected final ACK during passive open"));
        }

        self.seq_number = self.seq_number.wrapping_add(1);
        self.state = State::Established;
        debug!("state -> Established");

        Ok(peer)
    }

    /// Encodes and writes a header-only (zero-payload) datagram.
    pub(crate) fn send_header(&mut self, header: &Header) -> Result<()> {
        let mut buf = [0u8; HEADER_LEN];
        header.encode(&mut buf);
        self.transport.send(&buf)?;
        self.stats.packets_sent += 1;
        Ok(())
    }

    /// Reads one header-only datagram and verifies its (always-empty)
    /// checksum. Used only during handshake/teardown, where no payload is
    /// ever carried alongside control segments.
    pub(crate) fn recv_header(&mut self) -> Result<Header> {
        let mut buf = [0u8; HEADER_LEN];
        self.transport.recv(&mut buf)?;
        let header = Header::decode(&buf);
        if header.verify(&[]).is_err() {
            return Err(self.set_invalid("corrupt control datagram"));
        }
        self.stats.packets_received += 1;
        Ok(header)
    }
}

/// Convenience constructor mirroring `microtcp_socket` (spec §6 `open`).
pub fn open(family: AddrFamily) -> Result<Connection> {
    Connection::open(family)
}

/// Helper used by `UdpTransport`-specific callers that already have a bound
/// socket (e.g. a demo server that wants to log its local port before
/// blocking in `accept`).
pub fn open_on(socket: std::net::UdpSocket) -> Connection {
    let transport = UdpTransport::from_socket(socket);
    Connection::with_transport(Box::new(transport), crate::connection::Config::default())
}
