//! Terrane integration test harness.
//!
//! Protocol tests run against in-process mock SeedLink/DataLink servers on
//! loopback listeners; codec and fetcher tests drive the crates end to end
//! with synthetic data. No external services are involved.

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use terrane_mseed::{StreamTemplate, WordOrder};

mod datalink;
mod fetch;
mod mseed;
mod seedlink;

// ── Record builders ───────────────────────────────────────────────────────────

/// Encode a sample vector into 512-byte records for one stream.
pub fn encode_stream(
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    factor: i16,
    start: DateTime<Utc>,
    samples: &[i32],
    sequence: u32,
) -> Vec<Vec<u8>> {
    let mut template = StreamTemplate {
        network: network.to_owned(),
        station: station.to_owned(),
        location: location.to_owned(),
        channel: channel.to_owned(),
        quality: b'D',
        rate_factor: factor,
        rate_multiplier: 1,
        word_order: WordOrder::Big,
        record_length: 9,
        sequence,
    };

    let mut records = Vec::new();
    template
        .pack_int32::<terrane_mseed::MseedError, _>(start, 90, true, samples, |_, bytes, _| {
            records.push(bytes.to_vec());
            Ok(())
        })
        .expect("encoding failed");
    records
}

// ── Mock SeedLink server ──────────────────────────────────────────────────────

/// Wrap a 512-byte record into a 520-byte SeedLink data packet.
pub fn wrap_packet(sequence: &[u8; 6], record: &[u8]) -> Vec<u8> {
    assert_eq!(record.len(), 512);
    let mut out = Vec::with_capacity(520);
    out.extend_from_slice(b"SL");
    out.extend_from_slice(sequence);
    out.extend_from_slice(record);
    out
}

/// A minimal INFO response packet: enough miniSEED shape for the client to
/// find the XML payload at the data offset.
pub fn info_packet(sequence: &[u8; 6], xml: &str) -> Vec<u8> {
    assert!(xml.len() <= 512 - 56, "xml chunk too large for one packet");
    let mut record = vec![0u8; 512];
    record[44..46].copy_from_slice(&56u16.to_be_bytes());
    record[56..56 + xml.len()].copy_from_slice(xml.as_bytes());
    wrap_packet(sequence, &record)
}

/// Scripted SeedLink server for one connection.
///
/// Answers HELLO with a banner advertising `capabilities`, serves a
/// two-packet INFO CAPABILITIES document, acknowledges every modifier
/// command with OK, and streams `records` after END. Every received
/// command line lands in `log`.
pub async fn mock_seedlink(
    listener: TcpListener,
    capabilities: &str,
    records: Vec<Vec<u8>>,
    log: mpsc::UnboundedSender<String>,
) -> anyhow::Result<()> {
    let (stream, _) = listener.accept().await?;
    let (read_half, mut write) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end().to_owned();
        let _ = log.send(line.clone());

        if line == "HELLO" {
            let banner = format!(
                "SeedLink v3.1 (2020.075 RingServer) :: SLPROTO:3.1 CAP {capabilities}\r\n\
                 Terrane Test Server\r\n"
            );
            write.write_all(banner.as_bytes()).await?;
        } else if line == "INFO CAPABILITIES" {
            let xml = r#"<?xml version="1.0"?><seedlink software="test" organization="terrane"><capability name="info:id"/><capability name="info:capabilities"/></seedlink>"#;
            let (head, tail) = xml.split_at(64);
            write.write_all(&info_packet(b"TERRA*", head)).await?;
            write.write_all(&info_packet(b"TERRAN", tail)).await?;
        } else if line == "INFO ID" {
            let xml = r#"<seedlink software="test" organization="terrane"/>"#;
            write.write_all(&info_packet(b"TERRAN", xml)).await?;
        } else if line == "END" {
            for record in &records {
                write.write_all(record).await?;
            }
        } else {
            write.write_all(b"OK\r\n").await?;
        }
    }
}

// ── Mock DataLink server ──────────────────────────────────────────────────────

/// How the mock DataLink server acknowledges WRITE commands.
#[derive(Clone, Copy)]
pub enum WriteReply {
    Ok,
    Error,
}

/// Scripted DataLink server for one connection: negotiates the ID
/// handshake (optionally granting WRITE) and acknowledges writes. Command
/// headers land in `log`.
pub async fn mock_datalink(
    listener: TcpListener,
    grant_write: bool,
    reply: WriteReply,
    log: mpsc::UnboundedSender<String>,
) -> anyhow::Result<()> {
    let (mut stream, _) = listener.accept().await?;

    loop {
        let mut preheader = [0u8; 3];
        if stream.read_exact(&mut preheader).await.is_err() {
            return Ok(());
        }
        anyhow::ensure!(&preheader[..2] == b"DL", "bad magic from client");

        let mut header = vec![0u8; usize::from(preheader[2])];
        stream.read_exact(&mut header).await?;
        let header = String::from_utf8_lossy(&header).into_owned();
        let _ = log.send(header.clone());

        if header.starts_with("ID ") {
            let tokens = if grant_write {
                "DLPROTO:1.0 PACKETSIZE:512 WRITE"
            } else {
                "DLPROTO:1.0 PACKETSIZE:512"
            };
            let reply_header = format!("ID DataLink 2020.075 :: {tokens}");
            let mut frame = vec![b'D', b'L', reply_header.len() as u8];
            frame.extend_from_slice(reply_header.as_bytes());
            stream.write_all(&frame).await?;
        } else if header.starts_with("WRITE ") {
            // body length is the last header token
            let size: usize = header
                .split_whitespace()
                .last()
                .and_then(|t| t.parse().ok())
                .unwrap_or(0);
            let mut body = vec![0u8; size];
            stream.read_exact(&mut body).await?;

            let (reply_header, reply_body): (&str, &[u8]) = match reply {
                WriteReply::Ok => ("OK 1 4", b"GOOD"),
                WriteReply::Error => ("ERROR WRITE 6", b"denied"),
            };
            let mut frame = vec![b'D', b'L', reply_header.len() as u8];
            frame.extend_from_slice(reply_header.as_bytes());
            frame.extend_from_slice(reply_body);
            stream.write_all(&frame).await?;
        } else {
            anyhow::bail!("unexpected command: {header}");
        }
    }
}

/// Drain whatever is currently in an unbounded log channel.
pub fn drain_log(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(line) = rx.try_recv() {
        out.push(line);
    }
    out
}
