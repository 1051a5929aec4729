//! Teardown controller (spec §4.5): four-way graceful close for both the
//! active closer (`Role::Initiator`) and the peer reacting to an already
//! observed FIN (`Role::Responder`, entered from the receive engine's step
//! 3). Grounded in `microtcp_shutdown` from the original C reference
//! implementation, with the ACK-validation check corrected per spec §9:
//! the original inverts its own documented intent and fails when `ACK` is
//! *set*; this implementation fails iff `ACK` is *clear*.

use log::debug;

use crate::connection::{Connection, Role, State};
use crate::error::{Error, Result};
use crate::header::{Control, Header};

impl Connection {
    /// `shutdown` (spec §6, §4.5).
    pub fn shutdown(&mut self, role: Role) -> Result<()> {
        match role {
            Role::Initiator => self.shutdown_initiator(),
            Role::Responder => self.shutdown_responder(),
        }
    }

    fn shutdown_initiator(&mut self) -> Result<()> {
        if !self.state.is_data_capable() {
            return Err(Error::InvalidArgument("shutdown(Initiator) requires an established connection"));
        }

        let fin = Header::for_send(
            self.seq_number,
            self.ack_number,
            Control::FIN | Control::ACK,
            self.advertised_window(),
            &[],
        );
        self.send_header(&fin)?;
        self.seq_number = self.seq_number.wrapping_add(1);
        debug!("sent FIN|ACK seq={}", self.seq_number);

        let ack = self.recv_header()?;
        if !ack.control.has(Control::ACK) {
            return Err(Error::ProtocolError("expected ACK after initiator FIN"));
        }

        self.state = State::ClosingByHost;
        debug!("state -> ClosingByHost");

        let peer_fin = self.recv_header()?;
        if !peer_fin.control.has(Control::FIN) {
            return Err(Error::ProtocolError("expected peer FIN during active close"));
        }
        self.ack_number = peer_fin.seq_number.wrapping_add(1);

        let final_ack = Header::for_send(
            self.seq_number,
            self.ack_number,
            Control::ACK,
            self.advertised_window(),
            &[],
        );
        self.send_header(&final_ack)?;

        self.state = State::Closed;
        debug!("state -> Closed");
        Ok(())
    }

    /// Entered once the receive engine has already observed the peer's FIN
    /// and moved the connection into `ClosingByPeer` (spec §4.4 step 3).
    fn shutdown_responder(&mut self) -> Result<()> {
        if self.state != State::ClosingByPeer {
            return Err(Error::InvalidArgument("shutdown(Responder) requires a pending peer FIN"));
        }

        let ack = Header::for_send(
            self.seq_number,
            self.ack_number,
            Control::ACK,
            self.advertised_window(),
            &[],
        );
        self.send_header(&ack)?;

        let fin = Header::for_send(
            self.seq_number,
            self.ack_number,
            Control::FIN | Control::ACK,
            self.advertised_window(),
            &[],
        );
        self.send_header(&fin)?;
        self.seq_number = self.seq_number.wrapping_add(1);
        debug!("sent FIN|ACK seq={}", self.seq_number);

        let final_ack = self.recv_header()?;
        // Corrected per spec §9: the original source's check is inverted
        // against its own documented intent. Failure here is the *absence*
        // of the ACK bit, not its presence.
        if !final_ack.control.has(Control::ACK) {
            return Err(Error::ProtocolError("expected final ACK during passive close"));
        }

        self.state = State::Closed;
        debug!("state -> Closed");
        Ok(())
    }
}
