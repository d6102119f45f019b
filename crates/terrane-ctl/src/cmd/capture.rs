use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use terrane_mseed::Record;
use terrane_seedlink::{SeedLink, SeedLinkError};

/// Stream records from a SeedLink server into per-stream files until
/// Ctrl-C.
pub async fn cmd_capture(
    server: &str,
    streams: &str,
    selectors: &str,
    state_file: Option<PathBuf>,
    dir: PathBuf,
) -> Result<()> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;

    let mut client = SeedLink::new(server)
        .with_streams(streams)
        .with_selectors(selectors);
    if let Some(path) = state_file {
        client = client.with_state_file(path);
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping capture");
            let _ = shutdown_tx.send(());
        }
    });

    let out_dir = dir.clone();
    let result = client
        .collect(shutdown_rx, move |sequence, record| {
            let rec = match Record::parse_header(record) {
                Ok(rec) => rec,
                Err(err) => {
                    tracing::warn!(sequence, error = %err, "skipping undecodable record");
                    return Ok(false);
                }
            };

            let path = out_dir.join(format!("{}.mseed", rec.srcname(false)));
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| Box::new(e) as terrane_seedlink::HandlerError)?;
            file.write_all(record)
                .map_err(|e| Box::new(e) as terrane_seedlink::HandlerError)?;

            tracing::info!(sequence, record = %rec, "captured");
            Ok(false)
        })
        .await;

    match result {
        Ok(()) | Err(SeedLinkError::Cancelled) => {
            tracing::info!(dir = %dir.display(), "capture finished");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
