//! miniSEED wire format — fixed-size on-disk/on-wire structures.
//!
//! These types ARE the format. Every multi-byte field is big-endian, every
//! offset and width is fixed by the SEED standard; nothing here may change
//! without breaking interoperability with every other miniSEED reader.
//!
//! All types are #[repr(C)] with zerocopy derives for safe, allocation-free
//! parsing directly out of a record buffer. There is no unsafe code in this
//! module.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, I16, I32, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::error::MseedError;

/// Size of the fixed data header at the start of every record.
pub const FIXED_HEADER_SIZE: usize = 48;

/// Size of a binary BTime timestamp.
pub const BTIME_SIZE: usize = 10;

/// Size of the chain header preceding every blockette body.
pub const BLOCKETTE_HEADER_SIZE: usize = 4;

/// Body size of the data-only blockette (1000).
pub const BLOCKETTE_1000_SIZE: usize = 4;

/// Body size of the data-extension blockette (1001).
pub const BLOCKETTE_1001_SIZE: usize = 4;

// ── BTime ─────────────────────────────────────────────────────────────────────

/// SEED binary time: year, day-of-year, and wallclock down to 0.1 ms.
///
/// Wire size: 10 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BTime {
    pub year: U16<BigEndian>,
    /// Day of year, 1-based. Values outside 1..=366 normalise across
    /// year boundaries when converted.
    pub doy: U16<BigEndian>,
    pub hour: u8,
    pub minute: u8,
    /// Seconds 0-60; 60 is the leap-second allowance.
    pub second: u8,
    pub unused: u8,
    /// Fraction of a second in 0.0001 s units, 0-9999.
    pub fract: U16<BigEndian>,
}

assert_eq_size!(BTime, [u8; BTIME_SIZE]);

impl BTime {
    /// Convert to a UTC wallclock time.
    ///
    /// Out-of-range components (day-of-year 0 or past year end, the
    /// leap-second 60, fractions above 9999) roll forward or backward the
    /// way calendar arithmetic dictates. Returns `None` only for years the
    /// calendar cannot represent.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::from_ymd_opt(i32::from(self.year.get()), 1, 1)?
            .checked_add_signed(Duration::days(i64::from(self.doy.get()) - 1))?;
        let dt = date.and_hms_opt(0, 0, 0)?
            + Duration::hours(i64::from(self.hour))
            + Duration::minutes(i64::from(self.minute))
            + Duration::seconds(i64::from(self.second))
            + Duration::microseconds(i64::from(self.fract.get()) * 100);
        Some(Utc.from_utc_datetime(&dt))
    }

    /// Build a BTime from a UTC wallclock time, truncating below 0.1 ms.
    pub fn from_datetime(t: DateTime<Utc>) -> BTime {
        BTime {
            year: U16::new(t.year() as u16),
            doy: U16::new(t.ordinal() as u16),
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: t.second() as u8,
            unused: 0,
            fract: U16::new((t.nanosecond() / 100_000) as u16),
        }
    }
}

// ── Fixed header ──────────────────────────────────────────────────────────────

/// The 48-byte fixed header at the start of every miniSEED record.
///
/// ASCII fields are fixed width, right-padded with spaces or NUL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FixedHeader {
    /// Six ASCII digits, leading-zero padded.
    pub sequence: [u8; 6],
    /// Data quality indicator: one of `D`, `R`, `Q`, `M`.
    pub quality: u8,
    /// Must be a space or NUL.
    pub reserved: u8,

    pub station: [u8; 5],
    pub location: [u8; 2],
    pub channel: [u8; 3],
    pub network: [u8; 2],

    pub start: BTime,
    /// Number of samples in the record, decoded or not.
    pub sample_count: U16<BigEndian>,
    /// >0 samples/second, <0 seconds/sample, 0 for ASCII/opaque data.
    pub rate_factor: I16<BigEndian>,
    /// >0 multiplies the factor, <0 divides it.
    pub rate_multiplier: I16<BigEndian>,

    pub activity_flags: u8,
    pub io_clock_flags: u8,
    pub quality_flags: u8,

    pub blockette_count: u8,
    /// Time correction in 0.0001 s units. Applied to the start time unless
    /// activity bit 1 says the correction is already folded in.
    pub time_correction: I32<BigEndian>,
    /// Offset of the data region within the record.
    pub data_offset: U16<BigEndian>,
    /// Offset of the first blockette, 0 if there are none.
    pub first_blockette: U16<BigEndian>,
}

assert_eq_size!(FixedHeader, [u8; FIXED_HEADER_SIZE]);

/// Activity-flags bit: a time correction has already been applied.
pub const ACTIVITY_TIME_CORRECTION_APPLIED: u8 = 1 << 1;

/// IO/clock-flags bit: the recorder clock was locked.
pub const IO_CLOCK_LOCKED: u8 = 1 << 5;

impl FixedHeader {
    /// Byte-range sanity check, matching what other readers accept: the
    /// sequence field holds digits, spaces, or NULs; the quality letter is
    /// one of the four defined values; the reserved byte is blank; and the
    /// wallclock fields are in range (second 60 allows a leap second).
    pub fn is_valid(&self) -> bool {
        self.sequence
            .iter()
            .all(|&b| b.is_ascii_digit() || b == b' ' || b == 0)
            && matches!(self.quality, b'D' | b'R' | b'Q' | b'M')
            && (self.reserved == b' ' || self.reserved == 0)
            && self.start.hour <= 23
            && self.start.minute <= 59
            && self.start.second <= 60
    }
}

// ── Blockettes ────────────────────────────────────────────────────────────────

/// Chain header preceding every blockette body.
///
/// `next` is the byte offset of the following blockette within the record,
/// 0 for the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BlocketteHeader {
    pub kind: U16<BigEndian>,
    pub next: U16<BigEndian>,
}

assert_eq_size!(BlocketteHeader, [u8; BLOCKETTE_HEADER_SIZE]);

/// Blockette 1000, "data only SEED": describes how the data region is
/// encoded. Required for sample decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Blockette1000 {
    pub encoding: u8,
    /// 0 little endian, 1 big endian.
    pub word_order: u8,
    /// log2 of the record length in bytes.
    pub record_length: u8,
    pub reserved: u8,
}

assert_eq_size!(Blockette1000, [u8; BLOCKETTE_1000_SIZE]);

/// Blockette 1001, "data extension": timing quality and sub-millisecond
/// start-time precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromZeroes, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Blockette1001 {
    pub timing_quality: u8,
    /// Additional signed microseconds on top of the BTime fraction.
    pub micro_sec: i8,
    pub reserved: u8,
    /// Number of 64-byte Steim frames in the data region, 0 if unknown.
    pub frame_count: u8,
}

assert_eq_size!(Blockette1001, [u8; BLOCKETTE_1001_SIZE]);

// ── Encoding and word order ───────────────────────────────────────────────────

/// Data-region encodings assigned by the SEED standard.
///
/// Only a subset is decodable; the rest are recognised so their numbers can
/// be reported meaningfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    Ascii = 0,
    Int16 = 1,
    Int24 = 2,
    Int32 = 3,
    Float32 = 4,
    Float64 = 5,
    Steim1 = 10,
    Steim2 = 11,
    Geoscope24 = 12,
    Geoscope16Exp3 = 13,
    Geoscope16Exp4 = 14,
    Usnn = 15,
    Cdsn = 16,
    Graefenberg = 17,
    Ipg = 18,
    Steim3 = 19,
    Sro = 30,
    Hglp = 31,
    Dwwssn = 32,
    Rstn = 33,
}

impl TryFrom<u8> for Encoding {
    type Error = MseedError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Encoding::Ascii),
            1 => Ok(Encoding::Int16),
            2 => Ok(Encoding::Int24),
            3 => Ok(Encoding::Int32),
            4 => Ok(Encoding::Float32),
            5 => Ok(Encoding::Float64),
            10 => Ok(Encoding::Steim1),
            11 => Ok(Encoding::Steim2),
            12 => Ok(Encoding::Geoscope24),
            13 => Ok(Encoding::Geoscope16Exp3),
            14 => Ok(Encoding::Geoscope16Exp4),
            15 => Ok(Encoding::Usnn),
            16 => Ok(Encoding::Cdsn),
            17 => Ok(Encoding::Graefenberg),
            18 => Ok(Encoding::Ipg),
            19 => Ok(Encoding::Steim3),
            30 => Ok(Encoding::Sro),
            31 => Ok(Encoding::Hglp),
            32 => Ok(Encoding::Dwwssn),
            33 => Ok(Encoding::Rstn),
            other => Err(MseedError::UnsupportedEncoding(other)),
        }
    }
}

/// Byte order of multi-byte sample words within the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WordOrder {
    Little = 0,
    Big = 1,
}

impl From<u8> for WordOrder {
    /// The standard defines 0 as little endian; anything else reads as big.
    fn from(value: u8) -> Self {
        match value {
            0 => WordOrder::Little,
            _ => WordOrder::Big,
        }
    }
}

// ── Sample rate helpers ───────────────────────────────────────────────────────

/// Samples per second from the two signed header fields.
///
/// A negative factor means seconds-per-sample; a negative multiplier
/// divides. Zero factor (ASCII and opaque records) yields 0.
pub fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let mut sps = match factor {
        f if f > 0 => f64::from(f),
        f if f < 0 => -1.0 / f64::from(f),
        _ => 0.0,
    };
    match multiplier {
        m if m > 0 => sps *= f64::from(m),
        m if m < 0 => sps = -(sps / f64::from(m)),
        _ => {}
    }
    sps
}

/// The interval between samples, zero when the rate is not positive.
pub fn sample_period(factor: i16, multiplier: i16) -> Duration {
    let sps = sample_rate(factor, multiplier);
    if sps > 0.0 {
        Duration::nanoseconds((1e9 / sps) as i64)
    } else {
        Duration::zero()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
