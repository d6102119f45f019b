use anyhow::{Context, Result};
use terrane_mseed::Record;

use super::each_record;

/// Print a summary line per record, optionally with decoded sample edges.
pub fn cmd_inspect(paths: &[String], samples: bool) -> Result<()> {
    for path in paths {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read file: {path}"))?;

        each_record(&data, |block| {
            if samples {
                match Record::parse(block) {
                    Ok(rec) => {
                        let values = rec.to_floats();
                        match (values.first(), values.last()) {
                            (Some(first), Some(last)) => {
                                println!("{rec}, first {first}, last {last}")
                            }
                            _ => println!("{rec}"),
                        }
                    }
                    // still show what the header says when samples won't decode
                    Err(err) => {
                        let rec = Record::parse_header(block)?;
                        println!("{rec} (samples not decoded: {err})");
                    }
                }
            } else {
                println!("{}", Record::parse_header(block)?);
            }
            Ok(())
        })
        .with_context(|| format!("bad record in {path}"))?;
    }
    Ok(())
}
