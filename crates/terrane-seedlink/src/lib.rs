//! terrane-seedlink — SeedLink protocol client.
//!
//! Maintains one TCP connection to a SeedLink server: capability
//! negotiation, multi-station subscription, 520-byte packet streaming with
//! keep-alive and network timeouts, and per-station resumption state
//! persisted as JSON.

pub mod client;
pub mod conn;
pub mod error;
pub mod info;
pub mod packet;
pub mod state;
pub mod streamspec;

pub use client::{HandlerError, SeedLink};
pub use conn::Conn;
pub use error::SeedLinkError;
pub use info::{Info, StationInfo, StreamInfo};
pub use packet::{Packet, PACKET_SIZE, RECORD_SIZE};
pub use state::{StateRegistry, Station};
pub use streamspec::{parse_streams, StreamSpec};
