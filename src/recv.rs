//! Receive engine (spec §4.4): per-datagram sequence checking, duplicate and
//! reorder handling, fragment reassembly, and FIN handoff to the teardown
//! controller. Grounded in `microtcp_recv` from the original C reference
//! implementation.

use log::{debug, trace};

use crate::connection::{Connection, State};
use crate::error::Result;
use crate::header::{Control, Header, HEADER_LEN};

/// Largest single datagram this crate will read off the wire: one MSS of
/// payload plus the fixed header. Callers with a smaller `mss` configured
/// get a smaller buffer.
const MAX_DATAGRAM: usize = 2048;

impl Connection {
    /// `recv` (spec §4.4). Returns `Ok(0)` for a pure ACK/keepalive and also,
    /// distinguishably, when the peer's FIN has just moved this connection
    /// into `ClosingByPeer` — callers check `state()` to tell the two apart.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require_data_phase()?;

        let mut written = 0;
        loop {
            let mut datagram = vec![0u8; MAX_DATAGRAM.max(HEADER_LEN + self.config.mss as usize)];
            let n = self.transport.recv(&mut datagram)?;
            if n < HEADER_LEN {
                trace!("dropping malformed datagram ({n} bytes)");
                continue;
            }
            let header = Header::decode(&datagram[..HEADER_LEN].try_into().unwrap());
            let payload = &datagram[HEADER_LEN..n];

            if header.verify(payload).is_err() {
                trace!("dropping corrupt datagram seq={}", header.seq_number);
                continue;
            }
            self.stats.packets_received += 1;

            if crate::seq::wrapping_lt(self.ack_number, header.seq_number) {
                // Gap: out-of-order datagram. Re-ACK the current (unchanged)
                // ack_number to trigger the sender's fast retransmit.
                debug!("out-of-order seq={} (expected {})", header.seq_number, self.ack_number);
                self.send_pure_ack()?;
                continue;
            }

            if header.control.has(Control::FIN) {
                self.ack_number = header.seq_number.wrapping_add(1);
                self.state = State::ClosingByPeer;
                debug!("state -> ClosingByPeer");
                return Ok(written);
            }

            if crate::seq::wrapping_lt(header.seq_number, self.ack_number) {
                // Duplicate from a prior timeout; drop but re-ACK to
                // accelerate the sender's recovery.
                trace!("dropping duplicate seq={}", header.seq_number);
                self.send_pure_ack()?;
                continue;
            }

            if header.data_len == 0 {
                return Ok(written);
            }

            let take = payload.len().min(buf.len() - written);
            buf[written..written + take].copy_from_slice(&payload[..take]);
            written += take;
            self.ack_number = self.ack_number.wrapping_add(header.data_len);
            self.send_pure_ack()?;

            if !header.control.has(Control::FRAGMENT) {
                return Ok(written);
            }
        }
    }

    fn send_pure_ack(&mut self) -> Result<()> {
        let ack = Header::for_send(self.seq_number, self.ack_number, Control::ACK, self.advertised_window(), &[]);
        self.send_header(&ack)?;
        Ok(())
    }
}
