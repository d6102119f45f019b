//! Per-station resumption state.
//!
//! The collection loop records the last sequence and start time seen for
//! every `(network, station)` pair, so a reconnect can resume where the
//! previous session stopped. Snapshots persist as a sorted, pretty-printed
//! JSON array; reading is best-effort so a corrupt file never wedges a
//! restart loop.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::SeedLinkError;

/// Latest state for one network/station pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub network: String,
    pub station: String,
    /// Last SeedLink sequence number seen, -1 when unknown.
    pub sequence: i64,
    /// Start time of the last record seen.
    pub timestamp: DateTime<Utc>,
}

/// Shared station state, keyed on `(network, station)`.
///
/// Cheap to clone; the collection loop updates it while callers read
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    inner: Arc<DashMap<(String, String), Station>>,
}

impl StateRegistry {
    pub fn new() -> StateRegistry {
        StateRegistry::default()
    }

    /// Insert or replace the entry for the station's key.
    pub fn update(&self, station: Station) {
        self.inner
            .insert((station.network.clone(), station.station.clone()), station);
    }

    /// Look up state with `*`/`?` wildcard patterns, matching the stored
    /// concrete keys. First match wins; iteration order is unspecified.
    pub fn find(&self, network_pat: &str, station_pat: &str) -> Option<Station> {
        self.inner.iter().find_map(|entry| {
            let (network, station) = entry.key();
            (wildcard_match(network_pat, network) && wildcard_match(station_pat, station))
                .then(|| entry.value().clone())
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All entries sorted lexicographically by network then station.
    pub fn snapshot(&self) -> Vec<Station> {
        let mut stations: Vec<Station> = self.inner.iter().map(|e| e.value().clone()).collect();
        stations.sort_by(|a, b| {
            (a.network.as_str(), a.station.as_str()).cmp(&(b.network.as_str(), b.station.as_str()))
        });
        stations
    }

    /// Fold a JSON snapshot into the registry.
    pub fn merge_json(&self, data: &[u8]) -> Result<(), serde_json::Error> {
        let stations: Vec<Station> = serde_json::from_slice(data)?;
        for station in stations {
            self.update(station);
        }
        Ok(())
    }

    /// Sorted snapshot as a two-space-indented JSON array.
    pub fn to_json(&self) -> String {
        // a Vec<Station> cannot fail to serialise
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "[]".to_owned())
    }

    /// Best-effort load: a missing or corrupt file leaves the registry
    /// unchanged so collection proceeds from configured defaults.
    pub fn load(&self, path: &Path) {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "no state file loaded");
                return;
            }
        };
        if let Err(err) = self.merge_json(&data) {
            tracing::warn!(path = %path.display(), error = %err, "ignoring corrupt state file");
        }
    }

    /// Write the full snapshot to `path`.
    pub fn save(&self, path: &Path) -> Result<(), SeedLinkError> {
        std::fs::write(path, self.to_json()).map_err(|source| SeedLinkError::State {
            path: path.to_owned(),
            source,
        })
    }
}

/// Glob-style match: `*` spans any run of characters, `?` exactly one.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    fn matches(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..])),
            Some(b'?') => !t.is_empty() && matches(&p[1..], &t[1..]),
            Some(&c) => t.first() == Some(&c) && matches(&p[1..], &t[1..]),
        }
    }
    matches(pattern.as_bytes(), text.as_bytes())
}
