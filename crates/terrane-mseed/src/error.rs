//! Errors raised while decoding or building miniSEED records.

use crate::record::SampleKind;

/// Everything that can go wrong with a record.
///
/// Decoding errors are tagged so callers can distinguish a malformed header
/// (drop the record) from an unsupported encoding (the header is still
/// usable via [`Record::parse_header`][crate::Record::parse_header]).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MseedError {
    #[error("not a valid miniSEED record: bad fixed header")]
    MalformedHeader,

    #[error("record truncated: need {need} bytes, have {have}")]
    TruncatedRecord { need: usize, have: usize },

    #[error("blockette at offset {offset} runs past record of {len} bytes")]
    BlocketteOverflow { offset: usize, len: usize },

    #[error("blockette chain ends after {walked} blockettes but the header declares {declared}")]
    BlocketteChainShort { walked: usize, declared: usize },

    #[error("unsupported blockette type {0}")]
    UnknownBlockette(u16),

    #[error("record carries no data-only blockette (1000)")]
    MissingBlockette1000,

    #[error("data encoding {0} is not supported")]
    UnsupportedEncoding(u8),

    #[error("steim{version}: no support for little-endian word order")]
    SteimWordOrder { version: u8 },

    #[error("steim{version}: illegal nibble combination at frame {frame} word {word}")]
    SteimIllegalCode { version: u8, frame: usize, word: usize },

    #[error("steim{version}: final value {got} does not equal reverse integration constant {expected}")]
    ChecksumMismatch { version: u8, got: i32, expected: i32 },

    #[error("expected {expected} samples, decoded {decoded}")]
    SampleCountMismatch { expected: usize, decoded: usize },

    #[error("record holds {actual} samples, not {wanted}")]
    WrongSampleType { wanted: SampleKind, actual: SampleKind },

    #[error("record too large: needs {need} bytes but the block holds {cap}")]
    RecordOverflow { need: usize, cap: usize },
}
