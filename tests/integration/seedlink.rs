//! SeedLink client scenarios against the scripted mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::TimeZone;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use terrane_seedlink::{SeedLink, SeedLinkError, StateRegistry, Station};

use crate::{drain_log, encode_stream, mock_seedlink, wrap_packet};

fn wel_state() -> Station {
    Station {
        network: "NZ".into(),
        station: "WEL".into(),
        sequence: 123_456,
        timestamp: Utc.with_ymd_and_hms(2020, 10, 28, 9, 36, 24).unwrap()
            + chrono::Duration::microseconds(733_165),
    }
}

#[tokio::test]
async fn resume_command_state_and_state_file() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let start = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
    let records = encode_stream("NZ", "WEL", "20", "BNE", 50, start, &[1, 2, 3, 4], 123_457);
    let packets = vec![wrap_packet(b"01E241", &records[0])];

    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(mock_seedlink(listener, "NSWILDCARD", packets, log_tx));

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let client = SeedLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .with_streams("NZ_WEL")
        .with_selectors("BNE")
        .with_state([wel_state()])
        .with_state_file(&state_path);

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let seen: Arc<Mutex<Vec<(String, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let outcome = client
        .collect(shutdown_rx, move |sequence, record| {
            sink.lock().unwrap().push((sequence.to_owned(), record.to_vec()));
            Ok(true) // one packet is enough
        })
        .await;
    assert!(outcome.is_ok(), "collect failed: {outcome:?}");
    server.abort();

    // the handler saw the record we streamed
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "01E241");
    assert_eq!(seen[0].1, records[0]);

    // the subscription handshake resumed from the saved state, literally
    let log = drain_log(&mut log_rx);
    assert!(log.contains(&"STATION WEL NZ".to_owned()), "log: {log:?}");
    assert!(log.contains(&"SELECT BNE".to_owned()), "log: {log:?}");
    assert!(
        log.contains(&"DATA 01E241 2020,10,28,09,36,24".to_owned()),
        "log: {log:?}"
    );
    assert!(log.contains(&"END".to_owned()), "log: {log:?}");

    // delivered packet updated the in-memory state
    let station = client.state().find("NZ", "WEL").unwrap();
    assert_eq!(station.sequence, 0x01E241);
    assert_eq!(
        station.timestamp,
        Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap()
    );

    // and the state file round-trips losslessly
    let registry = StateRegistry::new();
    registry.load(&state_path);
    assert_eq!(registry.snapshot(), client.state().snapshot());
    assert_eq!(registry.to_json(), client.state().to_json());
}

#[tokio::test]
async fn wildcard_station_requires_capability() {
    // without NSWILDCARD the wildcard subscription must fail client-side
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (log_tx, _log_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(mock_seedlink(listener, "", Vec::new(), log_tx));

    let client = SeedLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .with_streams("NZ_???T:4??TT");

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let outcome = client.collect(shutdown_rx, |_, _| Ok(true)).await;
    assert!(
        matches!(
            outcome,
            Err(SeedLinkError::CapabilityMissing { ref capability }) if capability == "NSWILDCARD"
        ),
        "unexpected outcome: {outcome:?}"
    );
    server.abort();
}

#[tokio::test]
async fn wildcard_station_decomposes_with_capability() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let start = Utc.with_ymd_and_hms(2021, 3, 5, 12, 0, 0).unwrap();
    let records = encode_stream("NZ", "AUCT", "40", "BTT", 10, start, &[7, 8, 9], 1);
    let packets = vec![wrap_packet(b"000001", &records[0])];

    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(mock_seedlink(listener, "NSWILDCARD", packets, log_tx));

    let client = SeedLink::new(address)
        .with_timeout(Duration::from_secs(2))
        .with_streams("NZ_???T:4??TT");

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let outcome = client.collect(shutdown_rx, |_, _| Ok(true)).await;
    assert!(outcome.is_ok(), "collect failed: {outcome:?}");
    server.abort();

    let log = drain_log(&mut log_rx);
    assert!(log.contains(&"STATION ???T NZ".to_owned()), "log: {log:?}");
    assert!(log.contains(&"SELECT 4??TT".to_owned()), "log: {log:?}");
}

#[tokio::test]
async fn keepalive_probes_idle_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(mock_seedlink(listener, "", Vec::new(), log_tx));

    // short read deadline, fast keep-alive, no network timeout
    let client = SeedLink::new(address)
        .with_streams("XX_ZZZZ")
        .with_timeout(Duration::from_millis(100))
        .with_keep_alive(Duration::from_millis(250))
        .with_net_timeout(Duration::ZERO);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(900)).await;
        let _ = shutdown_tx.send(());
    });

    let outcome = client.collect(shutdown_rx, |_, _| Ok(false)).await;
    assert!(
        matches!(outcome, Err(SeedLinkError::Cancelled)),
        "unexpected outcome: {outcome:?}"
    );
    server.abort();

    let log = drain_log(&mut log_rx);
    assert!(
        log.iter().any(|line| line == "INFO ID"),
        "no keep-alive probe seen: {log:?}"
    );
}

#[tokio::test]
async fn silent_server_trips_network_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (log_tx, _log_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(mock_seedlink(listener, "", Vec::new(), log_tx));

    let client = SeedLink::new(address)
        .with_streams("XX_ZZZZ")
        .with_timeout(Duration::from_millis(100))
        .with_keep_alive(Duration::ZERO)
        .with_net_timeout(Duration::from_millis(500));

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client.collect(shutdown_rx, |_, _| Ok(false)),
    )
    .await
    .expect("collection should end on its own");
    assert!(
        matches!(outcome, Err(SeedLinkError::NetTimeout)),
        "unexpected outcome: {outcome:?}"
    );
    server.abort();
}
