//! Object fetcher scenarios: ordering, backpressure, oversize handling.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use terrane_fetch::{FetchError, Fetcher, Listing, ObjectInfo, ObjectStore};

/// Flat in-memory store; keys list in sorted order.
struct FlatStore {
    objects: HashMap<String, Bytes>,
}

impl FlatStore {
    fn with_numbered_keys(total: usize, size: usize) -> FlatStore {
        FlatStore {
            objects: (0..total)
                .map(|i| (format!("k-{i:02}"), Bytes::from(vec![i as u8; size])))
                .collect(),
        }
    }
}

#[async_trait]
impl ObjectStore for FlatStore {
    async fn get(&self, _bucket: &str, key: &str) -> anyhow::Result<Bytes> {
        // a small delay keeps many fetches in flight at once
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such key: {key}"))
    }

    async fn list(
        &self,
        _bucket: &str,
        prefix: &str,
        _continuation: Option<String>,
    ) -> anyhow::Result<Listing> {
        let mut keys: Vec<&String> = self
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(Listing {
            objects: keys
                .into_iter()
                .map(|k| ObjectInfo::new(k.clone(), self.objects[k].len() as u64))
                .collect(),
            next: None,
        })
    }
}

#[tokio::test]
async fn ordered_fan_out_restores_pools() {
    let fetcher = Fetcher::new(FlatStore::with_numbered_keys(20, 9), 100, 10, 10, 1000).unwrap();

    let objects = fetcher.list_all("bucket", "").await.unwrap();
    assert_eq!(objects.len(), 20);

    let mut rx = fetcher.fetch_all("bucket", objects.clone());
    let mut keys = Vec::new();
    while let Some(hydrated) = rx.recv().await {
        assert_eq!(hydrated.body.unwrap().len(), 9);
        keys.push(hydrated.key);
    }

    let want: Vec<String> = objects.into_iter().map(|o| o.key).collect();
    assert_eq!(keys, want);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fetcher.available_workers(), 100);
    assert_eq!(fetcher.available_memory_chunks(), 100);
}

#[tokio::test]
async fn exhausted_memory_blocks_the_request() {
    let fetcher = Fetcher::new(FlatStore::with_numbered_keys(20, 9), 100, 10, 10, 1000).unwrap();
    let objects = fetcher.list_all("bucket", "").await.unwrap();

    let reservation = fetcher.reserve_memory(1000).await.unwrap();

    let mut rx = fetcher.fetch_all("bucket", objects);
    let blocked = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(blocked.is_err(), "expected no output, got {blocked:?}");

    drop(reservation);
    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("request should resume")
        .expect("first result");
    assert_eq!(first.key, "k-00");
}

#[tokio::test]
async fn oversize_descriptor_is_an_error_record() {
    let fetcher = Fetcher::new(FlatStore::with_numbered_keys(2, 9), 100, 10, 10, 1000).unwrap();

    let objects = vec![
        ObjectInfo::new("k-00", 9),
        ObjectInfo::new("k-too-big", 1100),
        ObjectInfo::new("k-01", 11),
    ];
    let mut rx = fetcher.fetch_all("bucket", objects);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.key, "k-00");
    assert!(first.body.is_ok());

    // the oversize entry fails in order without wedging the pool
    let second = rx.recv().await.unwrap();
    assert_eq!(second.key, "k-too-big");
    assert!(matches!(
        second.body,
        Err(FetchError::PoolExhausted {
            need: 110,
            have: 100
        })
    ));

    // a declared 11-byte object takes two chunks; the declared size only
    // drives memory accounting, the store still returns what it holds
    let third = rx.recv().await.unwrap();
    assert_eq!(third.key, "k-01");
    assert_eq!(third.body.unwrap().len(), 9);

    assert!(rx.recv().await.is_none());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fetcher.available_memory_chunks(), 100);
    assert_eq!(fetcher.available_workers(), 100);
}

#[tokio::test]
async fn concurrent_listing_orders_by_prefix() {
    let mut objects = HashMap::new();
    for prefix in ["x", "y"] {
        for i in 0..4 {
            objects.insert(format!("{prefix}/o-{i}"), Bytes::from_static(b"data"));
        }
    }
    let fetcher = Fetcher::new(FlatStore { objects }, 10, 2, 10, 1000).unwrap();

    let prefixes = vec!["x/".to_owned(), "y/".to_owned()];
    let listed = fetcher.list_all_concurrent("bucket", &prefixes).await.unwrap();
    let keys: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "x/o-0", "x/o-1", "x/o-2", "x/o-3", "y/o-0", "y/o-1", "y/o-2", "y/o-3"
        ]
    );
}
