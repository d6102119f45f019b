//! DataLink framing.
//!
//! Every frame is the `DL` magic, a one-byte header length, the ASCII
//! command header, and an optional binary body. The header can therefore
//! never exceed 255 bytes.

use crate::error::DataLinkError;

/// Magic plus the header-length byte.
pub const PREHEADER_SIZE: usize = 3;

/// Longest possible command header.
pub const MAX_HEADER: usize = 255;

/// One DataLink frame, sent or received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

impl Frame {
    /// A body-less command frame.
    pub fn command(header: impl Into<Vec<u8>>) -> Frame {
        Frame {
            header: header.into(),
            body: Vec::new(),
        }
    }

    /// A command frame carrying a payload.
    pub fn with_body(header: impl Into<Vec<u8>>, body: impl Into<Vec<u8>>) -> Frame {
        Frame {
            header: header.into(),
            body: body.into(),
        }
    }

    /// The command header as text.
    pub fn header_str(&self) -> String {
        String::from_utf8_lossy(&self.header).into_owned()
    }

    /// Serialise for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DataLinkError> {
        if self.header.len() > MAX_HEADER {
            return Err(DataLinkError::HeaderTooLong(self.header.len()));
        }

        let mut out = Vec::with_capacity(PREHEADER_SIZE + self.header.len() + self.body.len());
        out.extend_from_slice(b"DL");
        out.push(self.header.len() as u8);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    /// Parse a full frame from a buffer; everything after the header is
    /// the body.
    pub fn from_bytes(buf: &[u8]) -> Result<Frame, DataLinkError> {
        if buf.len() < PREHEADER_SIZE {
            return Err(DataLinkError::BadFrame("short preheader"));
        }
        if &buf[..2] != b"DL" {
            return Err(DataLinkError::BadFrame("missing DL magic"));
        }

        let header_len = usize::from(buf[2]);
        let header_end = PREHEADER_SIZE + header_len;
        if header_end > buf.len() {
            return Err(DataLinkError::BadFrame("header length overflows frame"));
        }

        Ok(Frame {
            header: buf[PREHEADER_SIZE..header_end].to_vec(),
            body: buf[header_end..].to_vec(),
        })
    }
}
