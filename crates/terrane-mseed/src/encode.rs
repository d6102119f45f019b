//! Record encoding — packing a contiguous sample stream into fixed-size
//! records.
//!
//! The encoder emits Int32 data regions. Steim compression is decode-only;
//! anything written here round-trips through [`Record::parse`] bit-for-bit,
//! which every emitted record is checked against before it reaches the
//! caller.

use chrono::{DateTime, Utc};
use zerocopy::byteorder::{I16, I32, U16};
use zerocopy::AsBytes;

use crate::error::MseedError;
use crate::record::Record;
use crate::wire::{
    sample_period, BTime, Blockette1000, Blockette1001, BlocketteHeader, Encoding, FixedHeader,
    WordOrder, BLOCKETTE_1000_SIZE, BLOCKETTE_1001_SIZE, BLOCKETTE_HEADER_SIZE, FIXED_HEADER_SIZE,
    IO_CLOCK_LOCKED,
};

/// Offset of the data region in emitted records: the fixed header followed
/// by the chained 1000 and 1001 blockettes.
pub const DATA_OFFSET: usize =
    FIXED_HEADER_SIZE + 2 * BLOCKETTE_HEADER_SIZE + BLOCKETTE_1000_SIZE + BLOCKETTE_1001_SIZE;

/// Template describing one output stream.
///
/// Holds the identity and rate fields shared by every record of the stream
/// plus the running sequence number, which advances across calls.
#[derive(Debug, Clone)]
pub struct StreamTemplate {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// Data quality letter, one of `D`, `R`, `Q`, `M`.
    pub quality: u8,

    pub rate_factor: i16,
    pub rate_multiplier: i16,

    pub word_order: WordOrder,
    /// log2 of the emitted record length in bytes.
    pub record_length: u8,

    /// Next record sequence number; wraps 999999 -> 1.
    pub sequence: u32,
}

impl StreamTemplate {
    /// Derive a template from an existing record, keeping the raw header
    /// fields (padding included) so re-encoded records match byte-wise.
    pub fn from_record(rec: &Record) -> StreamTemplate {
        StreamTemplate {
            network: String::from_utf8_lossy(&rec.header.network).into_owned(),
            station: String::from_utf8_lossy(&rec.header.station).into_owned(),
            location: String::from_utf8_lossy(&rec.header.location).into_owned(),
            channel: String::from_utf8_lossy(&rec.header.channel).into_owned(),
            quality: rec.header.quality,
            rate_factor: rec.header.rate_factor.get(),
            rate_multiplier: rec.header.rate_multiplier.get(),
            word_order: rec.word_order(),
            record_length: rec.b1000.record_length,
            sequence: rec.sequence(),
        }
    }

    /// Emitted record length in bytes.
    pub fn block_size(&self) -> usize {
        1 << self.record_length
    }

    /// Bytes available for encoded samples per record.
    fn data_capacity(&self) -> usize {
        self.block_size().saturating_sub(DATA_OFFSET)
    }

    /// Pack `samples` into records and hand each to `sink` together with
    /// its decoded view and a flag marking the final record.
    ///
    /// `start` is the time of `samples[0]`; each following record starts
    /// one sample period after the previous record's last sample. The
    /// timing quality lands in blockette 1001 and `locked` drives the
    /// clock-locked IO flag.
    pub fn pack_int32<E, F>(
        &mut self,
        start: DateTime<Utc>,
        timing_quality: u8,
        locked: bool,
        samples: &[i32],
        mut sink: F,
    ) -> Result<(), E>
    where
        E: From<MseedError>,
        F: FnMut(&Record, &[u8], bool) -> Result<(), E>,
    {
        let per_block = self.data_capacity() / 4;
        if per_block == 0 {
            return Err(E::from(MseedError::RecordOverflow {
                need: DATA_OFFSET + 4,
                cap: self.block_size(),
            }));
        }

        let period = sample_period(self.rate_factor, self.rate_multiplier);
        let total = samples.chunks(per_block).len();

        let mut before = 0usize;
        for (i, block) in samples.chunks(per_block).enumerate() {
            if self.sequence < 1 || self.sequence > 999_999 {
                self.sequence = 1;
            }

            let header = FixedHeader {
                sequence: sequence_field(self.sequence),
                quality: self.quality,
                reserved: 0,
                station: pad(&self.station),
                location: pad(&self.location),
                channel: pad(&self.channel),
                network: pad(&self.network),
                start: BTime::from_datetime(start + period * before as i32),
                sample_count: U16::new(block.len() as u16),
                rate_factor: I16::new(self.rate_factor),
                rate_multiplier: I16::new(self.rate_multiplier),
                activity_flags: 0,
                io_clock_flags: if locked { IO_CLOCK_LOCKED } else { 0 },
                quality_flags: 0,
                blockette_count: 2,
                time_correction: I32::new(0),
                data_offset: U16::new(DATA_OFFSET as u16),
                first_blockette: U16::new(FIXED_HEADER_SIZE as u16),
            };

            let b1000 = Blockette1000 {
                encoding: Encoding::Int32 as u8,
                word_order: self.word_order as u8,
                record_length: self.record_length,
                reserved: 0,
            };
            let b1001 = Blockette1001 {
                timing_quality,
                micro_sec: 0,
                reserved: 0,
                frame_count: 0,
            };

            let mut data = Vec::with_capacity(block.len() * 4);
            for &v in block {
                match self.word_order {
                    WordOrder::Big => data.extend_from_slice(&v.to_be_bytes()),
                    WordOrder::Little => data.extend_from_slice(&v.to_le_bytes()),
                }
            }

            let bytes =
                pack_record(&header, &b1000, &b1001, &data, self.block_size()).map_err(E::from)?;

            // decode what we just built: a failure here is an encoder bug
            // surfaced before the caller ever sees the record
            let record = Record::parse(&bytes).map_err(E::from)?;

            sink(&record, &bytes, i + 1 == total)?;

            self.sequence += 1;
            before += block.len();
        }

        Ok(())
    }
}

/// Assemble one record: header, chained 1000/1001 blockettes, data region,
/// zero padding out to the block size.
fn pack_record(
    header: &FixedHeader,
    b1000: &Blockette1000,
    b1001: &Blockette1001,
    data: &[u8],
    block_size: usize,
) -> Result<Vec<u8>, MseedError> {
    let need = DATA_OFFSET + data.len();
    if need > block_size {
        return Err(MseedError::RecordOverflow {
            need,
            cap: block_size,
        });
    }

    let mut out = vec![0u8; block_size];
    out[..FIXED_HEADER_SIZE].copy_from_slice(header.as_bytes());

    let mut p = FIXED_HEADER_SIZE;
    let chain = BlocketteHeader {
        kind: U16::new(1000),
        next: U16::new((p + BLOCKETTE_HEADER_SIZE + BLOCKETTE_1000_SIZE) as u16),
    };
    out[p..p + BLOCKETTE_HEADER_SIZE].copy_from_slice(chain.as_bytes());
    p += BLOCKETTE_HEADER_SIZE;
    out[p..p + BLOCKETTE_1000_SIZE].copy_from_slice(b1000.as_bytes());
    p += BLOCKETTE_1000_SIZE;

    let chain = BlocketteHeader {
        kind: U16::new(1001),
        next: U16::new(0),
    };
    out[p..p + BLOCKETTE_HEADER_SIZE].copy_from_slice(chain.as_bytes());
    p += BLOCKETTE_HEADER_SIZE;
    out[p..p + BLOCKETTE_1001_SIZE].copy_from_slice(b1001.as_bytes());
    p += BLOCKETTE_1001_SIZE;

    out[p..p + data.len()].copy_from_slice(data);
    Ok(out)
}

fn sequence_field(seq: u32) -> [u8; 6] {
    let mut out = [b'0'; 6];
    let s = format!("{seq:06}");
    out.copy_from_slice(&s.as_bytes()[..6]);
    out
}

fn pad<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [b' '; N];
    for (dst, src) in out.iter_mut().zip(s.bytes()) {
        *dst = src;
    }
    out
}
