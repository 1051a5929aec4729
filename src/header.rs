//! The fixed 32-byte µTP wire header and its control-bit flags.
//!
//! Mirrors `microtcp_header_t` from the original C reference implementation,
//! field for field, but encoded/decoded explicitly instead of cast over a
//! packed C struct.

use crate::error::{Error, Result};

pub const HEADER_LEN: usize = 32;

/// Control bits carried in the header's 16-bit `control` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control(u16);

impl Control {
    pub const NONE: Control = Control(0);
    pub const FIN: Control = Control(0x1);
    pub const SYN: Control = Control(0x2);
    pub const RST: Control = Control(0x4);
    pub const ACK: Control = Control(0x8);
    pub const FRAGMENT: Control = Control(0x20);

    /// Builds a control-bit set, rejecting the illegal `SYN | FIN` combination.
    pub fn new(bits: u16) -> Result<Control> {
        let c = Control(bits);
        if c.has(Control::SYN) && c.has(Control::FIN) {
            return Err(Error::InvalidArgument("SYN and FIN set simultaneously"));
        }
        Ok(c)
    }

    pub const fn from_bits_truncate(bits: u16) -> Control {
        Control(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn has(self, flag: Control) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn union(self, other: Control) -> Control {
        Control(self.0 | other.0)
    }
}

impl std::ops::BitOr for Control {
    type Output = Control;
    fn bitor(self, rhs: Control) -> Control {
        self.union(rhs)
    }
}

/// The fixed 32-byte µTP header. All multi-byte fields are network byte
/// order on the wire; this struct always holds host-order values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub seq_number: u32,
    pub ack_number: u32,
    pub control: Control,
    pub window: u16,
    pub data_len: u32,
    pub checksum: u32,
}

impl Header {
    /// Stamps a header for an outgoing datagram: `seq`/`ack` from the
    /// caller, `window` as the receiver's currently free buffer space, and
    /// `checksum` as the CRC-32 of `payload` (0 when `payload` is empty).
    pub fn for_send(seq_number: u32, ack_number: u32, control: Control, window: u16, payload: &[u8]) -> Header {
        Header {
            seq_number,
            ack_number,
            control,
            window,
            data_len: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    pub fn encode(&self, out: &mut [u8; HEADER_LEN]) {
        out[0..4].copy_from_slice(&self.seq_number.to_be_bytes());
        out[4..8].copy_from_slice(&self.ack_number.to_be_bytes());
        out[8..10].copy_from_slice(&self.control.bits().to_be_bytes());
        out[10..12].copy_from_slice(&self.window.to_be_bytes());
        out[12..16].copy_from_slice(&self.data_len.to_be_bytes());
        // future_use[0..3], reserved, zero on send.
        out[16..20].copy_from_slice(&0u32.to_be_bytes());
        out[20..24].copy_from_slice(&0u32.to_be_bytes());
        out[24..28].copy_from_slice(&0u32.to_be_bytes());
        out[28..32].copy_from_slice(&self.checksum.to_be_bytes());
    }

    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Header {
        Header {
            seq_number: u32::from_be_bytes(bytes[0..4].try_into().unwrap()),
            ack_number: u32::from_be_bytes(bytes[4..8].try_into().unwrap()),
            control: Control::from_bits_truncate(u16::from_be_bytes(bytes[8..10].try_into().unwrap())),
            window: u16::from_be_bytes(bytes[10..12].try_into().unwrap()),
            data_len: u32::from_be_bytes(bytes[12..16].try_into().unwrap()),
            // future_use is ignored on receive.
            checksum: u32::from_be_bytes(bytes[28..32].try_into().unwrap()),
        }
    }

    /// Validates the decoded header's checksum against the accompanying
    /// payload. Callers treat a mismatch as a silent drop (§4.1).
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        if checksum(payload) == self.checksum {
            Ok(())
        } else {
            Err(Error::CorruptPacket)
        }
    }
}

/// CRC-32 of the payload bytes only; 0 for an empty payload (§4.1).
pub fn checksum(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        0
    } else {
        crc32fast::hash(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_header() {
        let h = Header {
            seq_number: 0xdead_beef,
            ack_number: 0x1234_5678,
            control: Control::SYN | Control::ACK,
            window: 8192,
            data_len: 42,
            checksum: 0xaabb_ccdd,
        };

        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);
        let decoded = Header::decode(&buf);

        assert_eq!(h, decoded);
    }

    #[test]
    fn checksum_of_empty_payload_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn checksum_matches_crc32_of_payload() {
        let payload = b"the quick brown fox";
        assert_eq!(checksum(payload), crc32fast::hash(payload));
    }

    #[test]
    fn verify_detects_corruption() {
        let payload = b"hello world";
        let mut h = Header::for_send(0, 0, Control::ACK, 8192, payload);
        assert!(h.verify(payload).is_ok());

        h.checksum ^= 1;
        assert!(matches!(h.verify(payload), Err(Error::CorruptPacket)));
    }

    #[test]
    fn rejects_syn_fin_combination() {
        assert!(matches!(
            Control::new(Control::SYN.bits() | Control::FIN.bits()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn encoded_future_use_is_zero() {
        let h = Header::for_send(1, 2, Control::ACK, 100, &[]);
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);
        assert_eq!(&buf[16..28], &[0u8; 12]);
    }
}
