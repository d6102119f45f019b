//! Steim1/Steim2 differential decompression.
//!
//! Compressed data is organised in 64-byte frames of sixteen 32-bit words.
//! Word 0 holds sixteen 2-bit codes ("nibbles"), one per word of the frame;
//! words 1 and 2 of the first frame hold the forward (x0) and reverse (xn)
//! integration constants. The remaining words pack first differences of the
//! sample stream; reconstruction is a cumulative sum starting at x0, and xn
//! doubles as a checksum over the whole record.

use crate::error::MseedError;
use crate::wire::WordOrder;

/// Bytes per compression frame.
const FRAME_SIZE: usize = 64;

/// Extract 2-bit code `index` (0-15) from a frame's nibble word.
fn nibble(word: &[u8], index: usize) -> u8 {
    let shift = (3 - (index % 4)) * 2;
    (word[index / 4] >> shift) & 0x3
}

/// Sign-extend the low `bits` bits of `v` into an i32.
fn expand(v: u32, bits: u32) -> i32 {
    if bits < 32 && v & (1 << (bits - 1)) != 0 {
        (i64::from(v) - (1i64 << bits)) as i32
    } else {
        v as i32
    }
}

/// Unpack `count` differences of `bits` bits each from a data word and
/// apply them cumulatively. The first difference sits in the most
/// significant chunk, so a reduced `count` drops leading differences.
fn apply_diffs(word: [u8; 4], count: usize, bits: u32, last: &mut i32, out: &mut Vec<i32>) {
    let w = u32::from_be_bytes(word);
    let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
    for i in (0..count).rev() {
        let v = (w >> (i as u32 * bits)) & mask;
        *last = last.wrapping_add(expand(v, bits));
        out.push(*last);
    }
}

/// Decode a Steim1 (`version == 1`) or Steim2 (`version == 2`) data region.
///
/// `expected` sizes the output allocation only; the caller compares the
/// decoded length against the header afterwards. The first difference of
/// frame-0 word-3 reconstructs x0 itself and is skipped.
pub(crate) fn decode_steim(
    version: u8,
    raw: &[u8],
    word_order: WordOrder,
    frame_count: usize,
    expected: usize,
) -> Result<Vec<i32>, MseedError> {
    if word_order == WordOrder::Little {
        return Err(MseedError::SteimWordOrder { version });
    }
    let need = frame_count.max(1) * FRAME_SIZE;
    if raw.len() < need {
        return Err(MseedError::TruncatedRecord {
            need,
            have: raw.len(),
        });
    }

    let x0 = i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let xn = i32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]);

    let mut out = Vec::with_capacity(expected);
    let mut last = x0;
    out.push(x0);

    for f in 0..frame_count {
        let frame = &raw[f * FRAME_SIZE..(f + 1) * FRAME_SIZE];
        let w0 = &frame[..4];

        // Word 0 is the nibble word itself, so data starts at word 1.
        for w in 1..16 {
            let nib = nibble(w0, w);
            if nib == 0 {
                // Non-data word: integration constants or padding.
                continue;
            }

            let word = [frame[w * 4], frame[w * 4 + 1], frame[w * 4 + 2], frame[w * 4 + 3]];

            // Steim2 keeps a secondary code in the top two bits of the data
            // word, except for the 4x8-bit case.
            let dnib = if version == 2 && nib != 1 {
                nibble(&word, 0)
            } else {
                0
            };

            let skip = usize::from(f == 0 && w == 3);

            let (count, bits): (usize, u32) = match (version, nib, dnib) {
                (1, 1, _) => (4, 8),
                (1, 2, _) => (2, 16),
                (1, 3, _) => (1, 32),
                (2, 1, _) => (4, 8),
                (2, 2, 1) => (1, 30),
                (2, 2, 2) => (2, 15),
                (2, 2, 3) => (3, 10),
                (2, 3, 0) => (5, 6),
                (2, 3, 1) => (6, 5),
                (2, 3, 2) => (7, 4),
                _ => {
                    return Err(MseedError::SteimIllegalCode {
                        version,
                        frame: f,
                        word: w,
                    })
                }
            };

            apply_diffs(word, count.saturating_sub(skip), bits, &mut last, &mut out);
        }
    }

    if last != xn {
        return Err(MseedError::ChecksumMismatch {
            version,
            got: last,
            expected: xn,
        });
    }

    Ok(out)
}
