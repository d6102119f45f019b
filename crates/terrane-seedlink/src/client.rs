//! The SeedLink client: subscription handshake, packet collection,
//! resumption state.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use terrane_mseed::Record;

use crate::conn::Conn;
use crate::error::SeedLinkError;
use crate::state::{StateRegistry, Station};
use crate::streamspec::parse_streams;

/// Errors a packet handler may raise; wrapped into
/// [`SeedLinkError::Handler`] when collection stops because of one.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A configured SeedLink client.
///
/// One `collect` call owns one connection: it loads saved state,
/// subscribes the configured streams, then hands every received packet to
/// the caller until the handler stops it, the server stalls past the
/// network timeout, or the shutdown channel fires.
#[derive(Debug, Clone)]
pub struct SeedLink {
    server: String,

    timeout: Duration,
    net_timeout: Duration,
    keep_alive: Duration,
    refresh: Duration,

    streams: String,
    selectors: String,
    sequence: i64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,

    state_file: Option<PathBuf>,
    registry: StateRegistry,
}

impl SeedLink {
    /// Client for `server` with protocol defaults: 5 s command timeout,
    /// 300 s network timeout, 30 s keep-alive, 300 s state refresh, all
    /// streams (`*_*`) with `???` selectors, no saved sequence.
    pub fn new(server: impl Into<String>) -> SeedLink {
        SeedLink {
            server: server.into(),
            timeout: Duration::from_secs(5),
            net_timeout: Duration::from_secs(300),
            keep_alive: Duration::from_secs(30),
            refresh: Duration::from_secs(300),
            streams: "*_*".to_owned(),
            selectors: "???".to_owned(),
            sequence: -1,
            start_time: None,
            end_time: None,
            state_file: None,
            registry: StateRegistry::new(),
        }
    }

    /// Per-command and per-read deadline. Zero disables deadlines.
    pub fn with_timeout(mut self, timeout: Duration) -> SeedLink {
        self.timeout = timeout;
        self
    }

    /// Collection fails once no packet has arrived for this long. Zero
    /// disables the check.
    pub fn with_net_timeout(mut self, net_timeout: Duration) -> SeedLink {
        self.net_timeout = net_timeout;
        self
    }

    /// Idle interval after which an `INFO ID` probe keeps the connection
    /// warm. Zero disables keep-alives.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> SeedLink {
        self.keep_alive = keep_alive;
        self
    }

    /// State-file flush interval; zero falls back to one hour.
    pub fn with_refresh(mut self, refresh: Duration) -> SeedLink {
        self.refresh = refresh;
        self
    }

    /// Stream list, e.g. `"NZ_AUCT:40BTT 41BTT,NZ_WEL"`.
    pub fn with_streams(mut self, streams: impl Into<String>) -> SeedLink {
        self.streams = streams.into();
        self
    }

    /// Default selectors for streams without their own.
    pub fn with_selectors(mut self, selectors: impl Into<String>) -> SeedLink {
        self.selectors = selectors.into();
        self
    }

    /// Starting sequence for streams with no saved state; -1 means none.
    pub fn with_sequence(mut self, sequence: i64) -> SeedLink {
        self.sequence = sequence;
        self
    }

    pub fn with_start_time(mut self, start: DateTime<Utc>) -> SeedLink {
        self.start_time = Some(start);
        self
    }

    pub fn with_end_time(mut self, end: DateTime<Utc>) -> SeedLink {
        self.end_time = Some(end);
        self
    }

    /// Path for persisted resumption state.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> SeedLink {
        self.state_file = Some(path.into());
        self
    }

    /// Seed the in-memory state before any file is loaded.
    pub fn with_state(mut self, stations: impl IntoIterator<Item = Station>) -> SeedLink {
        for station in stations {
            self.registry.update(station);
        }
        self
    }

    /// The live resumption state shared with the collection loop.
    pub fn state(&self) -> &StateRegistry {
        &self.registry
    }

    /// Connect, subscribe, and stream packets into `handler`.
    ///
    /// The handler receives the 6-character sequence text and the 512-byte
    /// record; returning `Ok(true)` stops collection cleanly, an error
    /// stops it with [`SeedLinkError::Handler`]. Per-station state is
    /// updated after every delivered packet and flushed to the state file
    /// on the refresh interval and on every exit path.
    ///
    /// Cancellation is two-tier: `shutdown` is observed between packets,
    /// while a stalled read is bounded by the per-read deadline, which
    /// also drives keep-alive probes and the network timeout.
    pub async fn collect<F>(
        &self,
        mut shutdown: broadcast::Receiver<()>,
        mut handler: F,
    ) -> Result<(), SeedLinkError>
    where
        F: FnMut(&str, &[u8]) -> Result<bool, HandlerError>,
    {
        if let Some(path) = &self.state_file {
            self.registry.load(path);
        }

        let mut conn = self.subscribe().await?;

        let refresh = if self.refresh.is_zero() {
            Duration::from_secs(3600)
        } else {
            self.refresh
        };
        let mut flush = tokio::time::interval_at(Instant::now() + refresh, refresh);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last = Instant::now();

        let outcome = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!("collection shutdown requested");
                    break Err(SeedLinkError::Cancelled);
                }

                _ = flush.tick() => {
                    if let Some(path) = &self.state_file {
                        if let Err(err) = self.registry.save(path) {
                            break Err(err);
                        }
                    }
                }

                packet = conn.collect() => match packet {
                    Ok(pkt) => {
                        let sequence = pkt.sequence_str();
                        let verdict = handler(&sequence, &pkt.record);

                        // drain the packet into the state map before acting
                        // on the verdict; header-only decode, undecodable
                        // records still count as traffic
                        let number = pkt.sequence_number();
                        if let Some(number) = number {
                            if let Ok(record) = Record::parse_header(&pkt.record) {
                                self.registry.update(Station {
                                    network: record.network(),
                                    station: record.station(),
                                    sequence: number,
                                    timestamp: record.start_time(),
                                });
                            }
                        }
                        last = Instant::now();

                        match verdict {
                            Ok(true) => break Ok(()),
                            Err(err) => break Err(SeedLinkError::Handler(err)),
                            Ok(false) => {
                                if number.is_none() {
                                    break Err(SeedLinkError::Protocol(format!(
                                        "unparsable packet sequence: {sequence:?}"
                                    )));
                                }
                            }
                        }
                    }

                    Err(SeedLinkError::Timeout) => {
                        if !self.net_timeout.is_zero() && last.elapsed() > self.net_timeout {
                            break Err(SeedLinkError::NetTimeout);
                        }
                        if !self.keep_alive.is_zero() && last.elapsed() > self.keep_alive {
                            tracing::trace!("sending keep-alive probe");
                            match conn.command_id().await {
                                Ok(_) => last = Instant::now(),
                                Err(err) => break Err(err),
                            }
                        }
                    }

                    Err(err) => break Err(err),
                },
            }
        };

        // flush state on every exit path; a flush failure only surfaces
        // when collection itself ended cleanly
        if let Some(path) = &self.state_file {
            match (self.registry.save(path), &outcome) {
                (Err(err), Ok(())) => return Err(err),
                (Err(err), Err(_)) => {
                    tracing::warn!(error = %err, "state flush failed during shutdown")
                }
                (Ok(()), _) => {}
            }
        }

        outcome
    }

    /// Connect and run the subscription handshake for every configured
    /// stream, ending with `END`.
    async fn subscribe(&self) -> Result<Conn, SeedLinkError> {
        let mut conn = Conn::connect(&self.server, self.timeout).await?;

        for spec in parse_streams(&self.streams, &self.selectors) {
            conn.command_station(&spec.station, &spec.network).await?;
            conn.command_select(&spec.selector).await?;

            // resume from saved state when the pattern matches one
            let (mut sequence, mut start) = (self.sequence, self.start_time);
            if let Some(saved) = self.registry.find(&spec.network, &spec.station) {
                sequence = saved.sequence;
                start = Some(saved.timestamp);
            }

            if let Some(end) = self.end_time {
                // an explicit window overrides any saved state
                if let Some(begin) = self.start_time {
                    conn.command_time(begin, Some(end)).await?;
                }
            } else if sequence >= 0 {
                let resume = resume_sequence(sequence);
                conn.command_data(Some(&resume), start).await?;
            } else if let Some(begin) = start {
                conn.command_time(begin, None).await?;
            } else {
                conn.command_data(None, None).await?;
            }
        }

        conn.command_end().await?;
        Ok(conn)
    }
}

/// The 6-hex-digit resume token: the next sequence, wrapped to 24 bits.
fn resume_sequence(sequence: i64) -> String {
    format!("{:06X}", (sequence + 1) & 0xffffff)
}
