pub mod capture;
pub mod inspect;
pub mod publish;

use anyhow::Result;
use terrane_mseed::Record;

/// Walk the fixed-size records of a raw miniSEED file. Each record's
/// length comes from its own blockette 1000, so mixed block sizes in one
/// file work.
pub fn each_record(data: &[u8], mut f: impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let head = Record::parse_header(&data[offset..])?;
        let block = head.block_size();
        anyhow::ensure!(block > 0, "record at offset {offset} has no block size");
        anyhow::ensure!(
            offset + block <= data.len(),
            "record at offset {offset} is truncated"
        );
        f(&data[offset..offset + block])?;
        offset += block;
    }
    Ok(())
}
