//! terrane-mseed — miniSEED record codec.
//!
//! Decodes and encodes the fixed-block seismic record format: 48-byte
//! big-endian headers, chained blockettes, and sample data in ASCII,
//! fixed-width integer/float, or Steim1/Steim2 compressed form. Purely
//! computational; the transport crates sit on top of this one.

pub mod encode;
pub mod error;
pub mod record;
mod steim;
pub mod wire;

pub use encode::{StreamTemplate, DATA_OFFSET};
pub use error::MseedError;
pub use record::{Record, SampleKind};
pub use wire::{
    sample_period, sample_rate, BTime, Blockette1000, Blockette1001, BlocketteHeader, Encoding,
    FixedHeader, WordOrder, BLOCKETTE_1000_SIZE, BLOCKETTE_1001_SIZE, BLOCKETTE_HEADER_SIZE,
    BTIME_SIZE, FIXED_HEADER_SIZE,
};
