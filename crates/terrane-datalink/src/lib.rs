//! terrane-datalink — DataLink protocol client.
//!
//! Publishes pre-encoded miniSEED records to a DataLink ringserver over
//! one TCP connection, with per-write acknowledgements. Record encoding
//! lives in terrane-mseed; this crate verifies framing only.

pub mod conn;
pub mod error;
pub mod frame;

pub use conn::{DataLink, DlConn};
pub use error::DataLinkError;
pub use frame::{Frame, MAX_HEADER, PREHEADER_SIZE};
