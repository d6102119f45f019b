//! Record decoding — fixed header, blockette chain, and sample data.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use zerocopy::FromBytes;

use crate::error::MseedError;
use crate::steim::decode_steim;
use crate::wire::{
    sample_period, sample_rate, Blockette1000, Blockette1001, BlocketteHeader, Encoding,
    FixedHeader, WordOrder, ACTIVITY_TIME_CORRECTION_APPLIED, BLOCKETTE_1000_SIZE,
    BLOCKETTE_1001_SIZE, BLOCKETTE_HEADER_SIZE, FIXED_HEADER_SIZE,
};

/// What kind of samples a record carries once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    None,
    Ascii,
    Integer,
    Float,
    Double,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleKind::None => "none",
            SampleKind::Ascii => "ascii",
            SampleKind::Integer => "integer",
            SampleKind::Float => "float",
            SampleKind::Double => "double",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Samples {
    /// Header-only parse; the data region is raw.
    None,
    /// ASCII payload, read through the NUL-trimmed data region.
    Ascii,
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Samples {
    fn kind(&self) -> SampleKind {
        match self {
            Samples::None => SampleKind::None,
            Samples::Ascii => SampleKind::Ascii,
            Samples::Int(_) => SampleKind::Integer,
            Samples::Float(_) => SampleKind::Float,
            Samples::Double(_) => SampleKind::Double,
        }
    }
}

/// One decoded miniSEED record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: FixedHeader,
    pub b1000: Blockette1000,
    pub b1001: Option<Blockette1001>,

    /// Corrected start time: BTime plus blockette-1001 microseconds plus the
    /// header time correction when not already applied.
    start: DateTime<Utc>,

    /// Raw data region, from the header's data offset to the end of the
    /// input buffer.
    data: Vec<u8>,

    samples: Samples,
}

impl Record {
    /// Decode a record including its sample data.
    pub fn parse(buf: &[u8]) -> Result<Record, MseedError> {
        Self::unpack(buf, true)
    }

    /// Decode the header and blockettes only, leaving the data region raw.
    ///
    /// This never fails on an unsupported data encoding, so metadata stays
    /// available for records the sample decoder cannot handle.
    pub fn parse_header(buf: &[u8]) -> Result<Record, MseedError> {
        Self::unpack(buf, false)
    }

    fn unpack(buf: &[u8], decode: bool) -> Result<Record, MseedError> {
        let header = FixedHeader::read_from_prefix(buf).ok_or(MseedError::TruncatedRecord {
            need: FIXED_HEADER_SIZE,
            have: buf.len(),
        })?;
        if !header.is_valid() {
            return Err(MseedError::MalformedHeader);
        }

        let (b1000, b1001) = walk_blockettes(&header, buf)?;
        let b1000 = b1000.ok_or(MseedError::MissingBlockette1000)?;

        let data_offset = usize::from(header.data_offset.get());
        if data_offset > buf.len() {
            return Err(MseedError::TruncatedRecord {
                need: data_offset,
                have: buf.len(),
            });
        }
        let data = buf[data_offset..].to_vec();

        let mut start = header.start.time().ok_or(MseedError::MalformedHeader)?;
        if header.activity_flags & ACTIVITY_TIME_CORRECTION_APPLIED == 0 {
            start += Duration::microseconds(i64::from(header.time_correction.get()) * 100);
        }
        if let Some(b) = &b1001 {
            if b.micro_sec != 0 {
                start += Duration::microseconds(i64::from(b.micro_sec));
            }
        }

        let samples = if decode {
            decode_samples(&header, &b1000, b1001.as_ref(), &data)?
        } else {
            Samples::None
        };

        let record = Record {
            header,
            b1000,
            b1001,
            start,
            data,
            samples,
        };

        if decode {
            let decoded = record.decoded_count();
            let expected = usize::from(record.header.sample_count.get());
            if decoded != expected {
                return Err(MseedError::SampleCountMismatch { expected, decoded });
            }
        }

        Ok(record)
    }

    // ── Identity ─────────────────────────────────────────────────────────────

    pub fn network(&self) -> String {
        clean(&self.header.network)
    }

    pub fn station(&self) -> String {
        clean(&self.header.station)
    }

    pub fn location(&self) -> String {
        clean(&self.header.location)
    }

    pub fn channel(&self) -> String {
        clean(&self.header.channel)
    }

    pub fn quality(&self) -> char {
        char::from(self.header.quality)
    }

    /// The record sequence number, 0 when the field does not parse.
    pub fn sequence(&self) -> u32 {
        std::str::from_utf8(&self.header.sequence)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// Canonical stream id `NET_STA_LOC_CHA`, optionally with a trailing
    /// `_<quality>`.
    pub fn srcname(&self, with_quality: bool) -> String {
        let base = [self.network(), self.station(), self.location(), self.channel()].join("_");
        if with_quality {
            format!("{}_{}", base, self.quality())
        } else {
            base
        }
    }

    // ── Timing ───────────────────────────────────────────────────────────────

    /// Corrected start time of the first sample.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    /// Time of the last sample: start plus (count - 1) rounded periods.
    pub fn end_time(&self) -> DateTime<Utc> {
        let count = i64::from(self.header.sample_count.get());
        let sps = self.sample_rate();
        if count > 0 && sps > 0.0 {
            self.start + Duration::nanoseconds((count - 1) * (1e9 / sps + 0.5) as i64)
        } else {
            self.start
        }
    }

    pub fn sample_rate(&self) -> f64 {
        sample_rate(
            self.header.rate_factor.get(),
            self.header.rate_multiplier.get(),
        )
    }

    pub fn sample_period(&self) -> Duration {
        sample_period(
            self.header.rate_factor.get(),
            self.header.rate_multiplier.get(),
        )
    }

    // ── Shape ────────────────────────────────────────────────────────────────

    /// Declared number of samples, decoded or not.
    pub fn sample_count(&self) -> usize {
        usize::from(self.header.sample_count.get())
    }

    /// Full record length from blockette 1000, 0 when unset.
    pub fn block_size(&self) -> usize {
        match self.b1000.record_length {
            0 => 0,
            n => 1 << n,
        }
    }

    pub fn encoding(&self) -> Result<Encoding, MseedError> {
        Encoding::try_from(self.b1000.encoding)
    }

    pub fn word_order(&self) -> WordOrder {
        WordOrder::from(self.b1000.word_order)
    }

    /// The raw data region.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    // ── Samples ──────────────────────────────────────────────────────────────

    pub fn sample_kind(&self) -> SampleKind {
        self.samples.kind()
    }

    /// Number of samples actually decoded.
    pub fn decoded_count(&self) -> usize {
        match &self.samples {
            Samples::None => 0,
            Samples::Ascii => trim_nul(&self.data).len(),
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Double(v) => v.len(),
        }
    }

    pub fn ints(&self) -> Result<&[i32], MseedError> {
        match &self.samples {
            Samples::Int(v) => Ok(v),
            other => Err(MseedError::WrongSampleType {
                wanted: SampleKind::Integer,
                actual: other.kind(),
            }),
        }
    }

    pub fn floats(&self) -> Result<&[f32], MseedError> {
        match &self.samples {
            Samples::Float(v) => Ok(v),
            other => Err(MseedError::WrongSampleType {
                wanted: SampleKind::Float,
                actual: other.kind(),
            }),
        }
    }

    pub fn doubles(&self) -> Result<&[f64], MseedError> {
        match &self.samples {
            Samples::Double(v) => Ok(v),
            other => Err(MseedError::WrongSampleType {
                wanted: SampleKind::Double,
                actual: other.kind(),
            }),
        }
    }

    /// ASCII payload with trailing NULs removed.
    pub fn ascii(&self) -> Result<&[u8], MseedError> {
        match &self.samples {
            Samples::Ascii => {
                let end = self.sample_count().min(self.data.len());
                Ok(trim_nul(&self.data[..end]))
            }
            other => Err(MseedError::WrongSampleType {
                wanted: SampleKind::Ascii,
                actual: other.kind(),
            }),
        }
    }

    /// ASCII payload split into lines (INFO and log records).
    pub fn text_lines(&self) -> Result<Vec<String>, MseedError> {
        let text = String::from_utf8_lossy(self.ascii()?).into_owned();
        Ok(text.lines().map(str::to_owned).collect())
    }

    /// All numeric samples converted to i32, truncating floats.
    pub fn to_ints(&self) -> Vec<i32> {
        match &self.samples {
            Samples::Int(v) => v.clone(),
            Samples::Float(v) => v.iter().map(|&x| x as i32).collect(),
            Samples::Double(v) => v.iter().map(|&x| x as i32).collect(),
            _ => Vec::new(),
        }
    }

    /// All numeric samples converted to f64.
    pub fn to_floats(&self) -> Vec<f64> {
        match &self.samples {
            Samples::Int(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::Double(v) => v.clone(),
            _ => Vec::new(),
        }
    }
}

/// Short one-line summary of the record header.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {:06}, {}, {}, {} samples, {} Hz, {}",
            self.srcname(false),
            self.sequence(),
            self.quality(),
            self.block_size(),
            self.sample_count(),
            self.sample_rate(),
            self.start.format("%Y,%j,%H:%M:%S%.6f"),
        )
    }
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

fn walk_blockettes(
    header: &FixedHeader,
    buf: &[u8],
) -> Result<(Option<Blockette1000>, Option<Blockette1001>), MseedError> {
    let mut b1000 = None;
    let mut b1001 = None;

    let declared = usize::from(header.blockette_count);
    let mut pointer = usize::from(header.first_blockette.get());

    for walked in 0..declared {
        if pointer == 0 {
            return Err(MseedError::BlocketteChainShort { walked, declared });
        }

        let overflow = MseedError::BlocketteOverflow {
            offset: pointer,
            len: buf.len(),
        };
        let head = buf
            .get(pointer..pointer + BLOCKETTE_HEADER_SIZE)
            .and_then(BlocketteHeader::read_from)
            .ok_or(overflow.clone())?;
        let body = pointer + BLOCKETTE_HEADER_SIZE;

        match head.kind.get() {
            1000 => {
                b1000 = buf
                    .get(body..body + BLOCKETTE_1000_SIZE)
                    .and_then(Blockette1000::read_from)
                    .ok_or(overflow)
                    .map(Some)?;
            }
            1001 => {
                b1001 = buf
                    .get(body..body + BLOCKETTE_1001_SIZE)
                    .and_then(Blockette1001::read_from)
                    .ok_or(overflow)
                    .map(Some)?;
            }
            other => return Err(MseedError::UnknownBlockette(other)),
        }

        pointer = usize::from(head.next.get());
    }

    Ok((b1000, b1001))
}

fn decode_samples(
    header: &FixedHeader,
    b1000: &Blockette1000,
    b1001: Option<&Blockette1001>,
    data: &[u8],
) -> Result<Samples, MseedError> {
    let order = WordOrder::from(b1000.word_order);
    let count = usize::from(header.sample_count.get());

    let samples = match Encoding::try_from(b1000.encoding)? {
        Encoding::Ascii => Samples::Ascii,
        Encoding::Int16 => Samples::Int(decode_fixed(data, order, count, i16::from_be_bytes, i16::from_le_bytes)?
            .into_iter()
            .map(i32::from)
            .collect()),
        Encoding::Int32 => {
            Samples::Int(decode_fixed(data, order, count, i32::from_be_bytes, i32::from_le_bytes)?)
        }
        Encoding::Float32 => {
            Samples::Float(decode_fixed(data, order, count, f32::from_be_bytes, f32::from_le_bytes)?)
        }
        Encoding::Float64 => {
            Samples::Double(decode_fixed(data, order, count, f64::from_be_bytes, f64::from_le_bytes)?)
        }
        steim @ (Encoding::Steim1 | Encoding::Steim2) => {
            let version = if steim == Encoding::Steim1 { 1 } else { 2 };
            let frames = match b1001 {
                Some(b) if b.frame_count != 0 => usize::from(b.frame_count),
                _ => data.len() / 64,
            };
            if frames * 64 > data.len() {
                return Err(MseedError::TruncatedRecord {
                    need: frames * 64,
                    have: data.len(),
                });
            }
            Samples::Int(decode_steim(version, data, order, frames, count)?)
        }
        other => return Err(MseedError::UnsupportedEncoding(other as u8)),
    };

    Ok(samples)
}

/// Decode `count` fixed-width samples honouring the record word order.
fn decode_fixed<T, const N: usize>(
    data: &[u8],
    order: WordOrder,
    count: usize,
    from_be: fn([u8; N]) -> T,
    from_le: fn([u8; N]) -> T,
) -> Result<Vec<T>, MseedError> {
    let need = count * N;
    if data.len() < need {
        return Err(MseedError::TruncatedRecord {
            need,
            have: data.len(),
        });
    }
    Ok(data[..need]
        .chunks_exact(N)
        .map(|c| {
            let mut word = [0u8; N];
            word.copy_from_slice(c);
            match order {
                WordOrder::Big => from_be(word),
                WordOrder::Little => from_le(word),
            }
        })
        .collect())
}

fn clean(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

fn trim_nul(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &data[..end]
}
