use std::io;

/// Error taxonomy for the µTP core (see spec §7).
///
/// `CorruptPacket` is deliberately not constructible outside this crate: a
/// checksum mismatch is always recovered locally (silent drop), never
/// surfaced to a caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("operation not valid in state {0:?}")]
    InvalidState(crate::connection::State),

    #[error("failed to allocate connection resources")]
    OutOfMemory,

    #[error("connection aborted during handshake or teardown: {0}")]
    ConnectionAborted(&'static str),

    #[error("protocol violation: {0}")]
    ProtocolError(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Checksum mismatch on a decoded datagram. Crate-internal: the receive
    /// engine always recovers from this by dropping the datagram silently,
    /// it is never returned from a public function.
    #[error("corrupt packet (checksum mismatch)")]
    CorruptPacket,
}

pub type Result<T> = std::result::Result<T, Error>;
