//! SeedLink wire packet.
//!
//! Every data or INFO response frame is exactly 520 bytes: the `SL` magic,
//! a 6-character ASCII sequence, and one 512-byte miniSEED record.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::error::SeedLinkError;

/// Full frame size on the wire.
pub const PACKET_SIZE: usize = 520;

/// miniSEED record payload size.
pub const RECORD_SIZE: usize = 512;

/// One SeedLink frame.
#[derive(Debug, Clone, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Packet {
    /// Always `"SL"`.
    pub magic: [u8; 2],
    /// Sequence as 6 uppercase hex characters; an INFO continuation packet
    /// carries `'*'` in the final position instead.
    pub sequence: [u8; 6],
    pub record: [u8; RECORD_SIZE],
}

assert_eq_size!(Packet, [u8; PACKET_SIZE]);

impl Packet {
    pub fn parse(buf: &[u8]) -> Result<Packet, SeedLinkError> {
        let pkt = Packet::read_from_prefix(buf)
            .ok_or(SeedLinkError::BadPacket("short packet"))?;
        if &pkt.magic != b"SL" {
            return Err(SeedLinkError::BadPacket("missing SL magic"));
        }
        Ok(pkt)
    }

    /// The sequence field as text.
    pub fn sequence_str(&self) -> String {
        String::from_utf8_lossy(&self.sequence).into_owned()
    }

    /// Numeric 24-bit sequence, `None` when the field is not hex (INFO
    /// responses).
    pub fn sequence_number(&self) -> Option<i64> {
        i64::from_str_radix(self.sequence_str().trim(), 16).ok()
    }

    /// Whether this packet continues a multi-packet INFO response.
    pub fn is_info_continued(&self) -> bool {
        self.sequence[5] == b'*'
    }

    /// INFO payload: the record's data region, located through the
    /// big-endian data offset at record bytes 44-45.
    pub fn info_payload(&self) -> &[u8] {
        let offset = usize::from(u16::from_be_bytes([self.record[44], self.record[45]]));
        &self.record[offset.min(RECORD_SIZE)..]
    }
}
