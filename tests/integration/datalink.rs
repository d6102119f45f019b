//! DataLink client scenarios against the scripted mock server.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use terrane_datalink::{DataLink, DataLinkError};
use terrane_mseed::Record;

use crate::{drain_log, encode_stream, mock_datalink, WriteReply};

async fn server(
    grant_write: bool,
    reply: WriteReply,
) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (log_tx, log_rx) = mpsc::unbounded_channel();
    tokio::spawn(mock_datalink(listener, grant_write, reply, log_tx));
    (address, log_rx)
}

#[tokio::test]
async fn handshake_negotiates_capabilities() {
    let (address, mut log_rx) = server(true, WriteReply::Ok).await;

    let conn = DataLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .with_program("terrane-test")
        .with_username("ops")
        .connect()
        .await
        .unwrap();

    assert!(conn.writable());
    assert_eq!(conn.packet_size(), 512);
    assert!(conn.id().starts_with("terrane-test:ops:"));

    let log = drain_log(&mut log_rx);
    assert_eq!(log.len(), 1);
    assert!(log[0].starts_with("ID terrane-test:ops:"), "log: {log:?}");
}

#[tokio::test]
async fn acknowledged_write_round_trip() {
    let (address, mut log_rx) = server(true, WriteReply::Ok).await;

    let start = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
    let records = encode_stream("NZ", "WEL", "20", "BNE", 50, start, &[10, 20, 30], 1);
    let record = Record::parse(&records[0]).unwrap();

    let mut conn = DataLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .connect()
        .await
        .unwrap();

    conn.write_record(
        &record.srcname(false),
        record.start_time(),
        record.end_time(),
        &records[0],
    )
    .await
    .unwrap();

    let log = drain_log(&mut log_rx);
    let write = log
        .iter()
        .find(|line| line.starts_with("WRITE "))
        .expect("no WRITE seen");
    assert!(
        write.starts_with("WRITE NZ_WEL_20_BNE/MSEED "),
        "header: {write}"
    );
    assert!(write.ends_with(" A 512"), "header: {write}");

    // timestamps are epoch microseconds of the first and last sample
    let tokens: Vec<&str> = write.split_whitespace().collect();
    assert_eq!(tokens[2], record.start_time().timestamp_micros().to_string());
    assert_eq!(tokens[3], record.end_time().timestamp_micros().to_string());
}

#[tokio::test]
async fn wrong_size_fails_before_the_socket() {
    let (address, mut log_rx) = server(true, WriteReply::Ok).await;

    let mut conn = DataLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .connect()
        .await
        .unwrap();
    drain_log(&mut log_rx); // discard the ID exchange

    let start = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
    let outcome = conn
        .write_record("NZ_WEL_20_BNE", start, start, &[0u8; 100])
        .await;
    assert!(
        matches!(
            outcome,
            Err(DataLinkError::SizeMismatch {
                expected: 512,
                got: 100
            })
        ),
        "unexpected outcome: {outcome:?}"
    );

    // the command never reached the server
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain_log(&mut log_rx).is_empty());
}

#[tokio::test]
async fn write_requires_capability() {
    let (address, _log_rx) = server(false, WriteReply::Ok).await;

    let mut conn = DataLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .connect()
        .await
        .unwrap();
    assert!(!conn.writable());

    let start = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
    let outcome = conn
        .write_record("NZ_WEL_20_BNE", start, start, &[0u8; 512])
        .await;
    assert!(
        matches!(outcome, Err(DataLinkError::NotWritable)),
        "unexpected outcome: {outcome:?}"
    );
}

#[tokio::test]
async fn server_error_carries_token_and_body() {
    let (address, _log_rx) = server(true, WriteReply::Error).await;

    let mut conn = DataLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .connect()
        .await
        .unwrap();

    let start = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
    let outcome = conn
        .write_record("NZ_WEL_20_BNE", start, start, &[0u8; 512])
        .await;
    match outcome {
        Err(DataLinkError::Server { token, body }) => {
            assert_eq!(token, "WRITE");
            assert_eq!(body, "denied");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
