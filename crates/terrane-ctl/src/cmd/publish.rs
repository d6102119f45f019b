use anyhow::{Context, Result};

use terrane_datalink::DataLink;
use terrane_mseed::Record;

use super::each_record;

/// Write every record of a file to a DataLink server, one acknowledged
/// WRITE per record.
pub async fn cmd_publish(server: &str, path: &str, program: &str, username: &str) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("failed to read file: {path}"))?;

    let mut conn = DataLink::new(server)
        .with_program(program)
        .with_username(username)
        .connect()
        .await?;

    anyhow::ensure!(
        conn.writable(),
        "server did not grant the WRITE capability"
    );
    tracing::info!(
        id = conn.id(),
        packet_size = conn.packet_size(),
        "publishing {path}"
    );

    // collect first so a malformed file fails before anything is sent
    let mut records = Vec::new();
    each_record(&data, |block| {
        records.push((Record::parse_header(block)?, block.to_vec()));
        Ok(())
    })?;

    let mut sent = 0u64;
    for (rec, block) in &records {
        conn.write_record(&rec.srcname(false), rec.start_time(), rec.end_time(), block)
            .await
            .with_context(|| format!("write rejected for {}", rec.srcname(false)))?;
        sent += 1;
        tracing::debug!(record = %rec, "acknowledged");
    }

    tracing::info!(records = sent, "publish complete");
    Ok(())
}
