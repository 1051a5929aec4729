//! Scripted in-memory transport used by unit tests to drive the send and
//! receive engines through timeout/duplicate-ACK/fast-retransmit paths
//! deterministically, without depending on real socket scheduling.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::DatagramTransport;

pub(crate) enum Event {
    Datagram(Vec<u8>),
    Timeout,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    pub(crate) sent: Vec<Vec<u8>>,
    pub(crate) inbox: VecDeque<Event>,
}

impl MockTransport {
    pub(crate) fn new(inbox: Vec<Event>) -> MockTransport {
        MockTransport { sent: Vec::new(), inbox: inbox.into() }
    }
}

impl DatagramTransport for MockTransport {
    fn bind(&mut self, _addr: SocketAddr) -> Result<()> {
        Ok(())
    }

    fn connect(&mut self, _addr: SocketAddr) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        self.sent.push(bytes.to_vec());
        Ok(bytes.len())
    }

    fn recv(&mut self, out: &mut [u8]) -> Result<usize> {
        match self.inbox.pop_front() {
            Some(Event::Datagram(bytes)) => {
                let n = bytes.len().min(out.len());
                out[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Event::Timeout) | None => {
                Err(Error::Transport(io::Error::new(io::ErrorKind::WouldBlock, "mock timeout")))
            }
        }
    }

    fn recv_from(&mut self, out: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let n = self.recv(out)?;
        Ok((n, "127.0.0.1:0".parse().unwrap()))
    }

    fn set_recv_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok("127.0.0.1:0".parse().unwrap())
    }
}
