//! Send engine (spec §4.3): segmentation, receiver-driven clocking, timeout
//! retransmit and fast retransmit, congestion-window evolution. Grounded in
//! `microtcp_send` from the original C reference implementation, with the
//! slow-start/congestion-avoidance/fast-retransmit bookkeeping itself
//! grounded in `congestion_control`/`process_ack` in the teacher crate's
//! `tcp/tcb.rs`.

use std::io;

use log::{debug, trace, warn};

use crate::connection::{Connection, State};
use crate::error::{Error, Result};
use crate::header::{Control, Header, HEADER_LEN};

impl Connection {
    /// `send` (spec §4.3). Blocks until the whole buffer has been
    /// acknowledged by the peer.
    pub fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.require_data_phase()?;
        let Some(_) = self.peer_window else {
            return Err(Error::InvalidState(self.state));
        };

        let mss = self.config.mss as usize;
        let mut offset = 0;

        while offset < buf.len() {
            let window = self.cwnd.min(self.peer_window.unwrap_or(0) as u32) as usize;
            let remaining = buf.len() - offset;
            let bytes_to_send = remaining.min(window).max(mss.min(remaining));
            let burst = &buf[offset..offset + bytes_to_send];
            let is_final_burst = offset + bytes_to_send == buf.len();

            offset += self.send_burst(burst, is_final_burst)?;
        }

        self.transport.set_recv_timeout(None)?;
        Ok(())
    }

    /// Sends one congestion-window-sized burst and drives it to completion
    /// (retransmitting on timeout or triple duplicate ACK), returning the
    /// number of bytes of `burst` finally acknowledged.
    ///
    /// `is_final_burst` tells the FRAGMENT bookkeeping whether `burst` is the
    /// tail of the overall logical message passed to `send`, not just the
    /// tail of this one congestion window: the FRAGMENT flag marks "more of
    /// this message follows" (spec §4.3), and a message can span several
    /// bursts once `cwnd`/`peer_window` is smaller than the caller's buffer.
    fn send_burst(&mut self, burst: &[u8], is_final_burst: bool) -> Result<usize> {
        let mss = self.config.mss as usize;
        let burst_start_seq = self.seq_number;
        let burst_end_seq = burst_start_seq.wrapping_add(burst.len() as u32);
        let mut retransmits = 0u32;

        'retransmit: loop {
            // Resend from `self.seq_number`: the original burst start on the
            // first pass and after a timeout (go-back-N), or the duplicated
            // ack_number after a fast retransmit (spec §4.3).
            let resend_from = (self.seq_number.wrapping_sub(burst_start_seq)) as usize;
            let chunks = split_into_chunks(&burst[resend_from..], mss);
            let mut chunk_seq = self.seq_number;
            for (i, chunk) in chunks.iter().enumerate() {
                let is_last_chunk_of_message = is_final_burst && i + 1 == chunks.len();
                let control = if is_last_chunk_of_message { Control::NONE } else { Control::FRAGMENT };
                let header = Header::for_send(chunk_seq, self.ack_number, control, self.advertised_window(), chunk);
                self.send_data(&header, chunk)?;
                chunk_seq = chunk_seq.wrapping_add(chunk.len() as u32);
            }

            self.transport.set_recv_timeout(Some(self.config.ack_timeout))?;

            let mut dup_acks = 0u32;

            while self.seq_number != burst_end_seq {
                match self.recv_ack() {
                    // `ack` must fall in `(seq_number, burst_end_seq]`: strictly
                    // advances past what's already acked, and never past what
                    // this burst actually sent (mirrors the teacher's
                    // `process_ack` bounds check in `tcp/tcb.rs`).
                    Ok(ack) if crate::seq::is_between_wrapped(self.seq_number, ack, burst_end_seq.wrapping_add(1)) => {
                        dup_acks = 0;
                        self.seq_number = ack;
                        self.on_ack_advance();
                    }
                    Ok(ack) => {
                        dup_acks += 1;
                        trace!("duplicate ack={ack} count={dup_acks}");
                        if dup_acks == self.config.dup_ack_threshold {
                            self.fast_retransmit(ack);
                            retransmits += 1;
                            self.check_retransmit_bound(retransmits)?;
                            continue 'retransmit;
                        } else if dup_acks > self.config.dup_ack_threshold {
                            self.cwnd += self.config.mss;
                        }
                    }
                    Err(TimeoutOr::Timeout) => {
                        warn!("ack timeout, retransmitting burst from seq={burst_start_seq}");
                        self.ssthresh = (self.cwnd / 2).max(self.config.mss);
                        self.cwnd = self.config.mss;
                        self.state = State::SlowStart;
                        self.seq_number = burst_start_seq;
                        retransmits += 1;
                        self.check_retransmit_bound(retransmits)?;
                        continue 'retransmit;
                    }
                    Err(TimeoutOr::Err(e)) => return Err(e),
                }
            }

            return Ok(burst.len());
        }
    }

    fn check_retransmit_bound(&mut self, retransmits: u32) -> Result<()> {
        if let Some(max) = self.config.max_retransmits {
            if retransmits > max {
                return Err(self.set_invalid("exceeded configured retransmit bound"));
            }
        }
        Ok(())
    }

    /// Fast retransmit on the third duplicate ACK (spec §4.3).
    fn fast_retransmit(&mut self, dup_ack: u32) {
        debug!("fast retransmit from ack={dup_ack}");
        self.ssthresh = (self.cwnd / 2).max(self.config.mss);
        self.cwnd = self.ssthresh + 3 * self.config.mss;
        self.seq_number = dup_ack;
    }

    /// Slow-start/congestion-avoidance cwnd growth on a successful ACK.
    fn on_ack_advance(&mut self) {
        match self.state {
            State::SlowStart => {
                self.cwnd = self.cwnd.saturating_mul(2);
                if self.cwnd >= self.ssthresh {
                    self.state = State::CongAvoid;
                    debug!("state -> CongAvoid cwnd={}", self.cwnd);
                }
            }
            State::CongAvoid => {
                self.cwnd += self.config.mss;
            }
            _ => {}
        }
    }

    fn send_data(&mut self, header: &Header, payload: &[u8]) -> Result<()> {
        let mut buf = vec![0u8; HEADER_LEN + payload.len()];
        let mut head = [0u8; HEADER_LEN];
        header.encode(&mut head);
        buf[..HEADER_LEN].copy_from_slice(&head);
        buf[HEADER_LEN..].copy_from_slice(payload);
        self.transport.send(&buf)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += payload.len() as u64;
        Ok(())
    }

    /// Reads one ACK-only datagram during a burst's collection window,
    /// distinguishing a timed-out receive from any other transport error.
    fn recv_ack(&mut self) -> std::result::Result<u32, TimeoutOr> {
        let mut buf = [0u8; HEADER_LEN];
        match self.transport.recv(&mut buf) {
            Ok(n) if n >= HEADER_LEN => {
                let header = Header::decode(&buf[..HEADER_LEN].try_into().unwrap());
                self.stats.packets_received += 1;
                if header.control.has(Control::ACK) {
                    // Every ACK carries the peer's current receive window
                    // (§3: "most-recent peer-advertised window"), not just
                    // the one from the handshake.
                    self.peer_window = Some(header.window);
                    Ok(header.ack_number)
                } else {
                    Err(TimeoutOr::Err(Error::ProtocolError("expected ACK during data transfer")))
                }
            }
            Ok(_) => Err(TimeoutOr::Err(Error::ProtocolError("malformed datagram during data transfer"))),
            Err(Error::Transport(ref e)) if is_timeout(e) => Err(TimeoutOr::Timeout),
            Err(e) => Err(TimeoutOr::Err(e)),
        }
    }
}

enum TimeoutOr {
    Timeout,
    Err(Error),
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Splits `burst` into `floor(len/mss)` full chunks plus an optional tail
/// chunk (spec §4.3 segmentation rule).
fn split_into_chunks(burst: &[u8], mss: usize) -> Vec<&[u8]> {
    if burst.is_empty() {
        return Vec::new();
    }
    burst.chunks(mss).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Config;
    use crate::test_support::{Event, MockTransport};

    #[test]
    fn chunks_full_and_tail() {
        let data = vec![0u8; 2805];
        let chunks = split_into_chunks(&data, 1400);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1400);
        assert_eq!(chunks[1].len(), 1400);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn empty_burst_has_no_chunks() {
        assert!(split_into_chunks(&[], 1400).is_empty());
    }

    fn ack_datagram(ack_number: u32) -> Vec<u8> {
        let header = Header::for_send(0, ack_number, Control::ACK, 1000, &[]);
        let mut buf = [0u8; HEADER_LEN];
        header.encode(&mut buf);
        buf.to_vec()
    }

    fn test_connection(events: Vec<Event>, mss: u32, recvbuf: u32) -> Connection {
        let config = Config { mss, recvbuf, ack_timeout: std::time::Duration::from_millis(1), dup_ack_threshold: 3, max_retransmits: None };
        let mut conn = Connection::with_transport(Box::new(MockTransport::new(events)), config);
        conn.state = State::SlowStart;
        conn.peer_window = Some(recvbuf as u16);
        conn
    }

    #[test]
    fn timeout_retransmits_whole_burst_and_resets_cwnd() {
        let events = vec![
            Event::Timeout,
            Event::Datagram(ack_datagram(10)),
            Event::Datagram(ack_datagram(20)),
        ];
        let mut conn = test_connection(events, 10, 1000);

        conn.send(&[0u8; 20]).unwrap();

        assert_eq!(conn.seq_number, 20);
        assert_eq!(conn.cwnd, 30);
        assert_eq!(conn.state, State::CongAvoid);
    }

    #[test]
    fn triple_duplicate_ack_triggers_fast_retransmit() {
        let events = vec![
            Event::Datagram(ack_datagram(10)),
            Event::Datagram(ack_datagram(20)),
            Event::Datagram(ack_datagram(10)),
            Event::Datagram(ack_datagram(10)),
            Event::Datagram(ack_datagram(10)),
            Event::Datagram(ack_datagram(20)),
            Event::Datagram(ack_datagram(30)),
        ];
        let mut conn = test_connection(events, 10, 1000);

        conn.send(&[0u8; 30]).unwrap();

        assert_eq!(conn.seq_number, 30);
        assert_eq!(conn.cwnd, 190);
        assert_eq!(conn.state, State::CongAvoid);
    }
}
