//! Bounded, ordered, backpressured object fetching.
//!
//! Two semaphore pools cap the work in flight: one permit per concurrent
//! fetch, and one permit per `chunk_bytes` of in-flight memory. Memory for
//! an object is taken atomically (all chunks or wait), workers afterwards,
//! and both flow back as fetches complete. Results come out of a bounded
//! channel in exactly the input order, however fetches finish.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::error::FetchError;
use crate::store::{ObjectInfo, ObjectStore};

/// One fetched object: its key and either the body or the error that
/// stopped it. Failures never abort sibling fetches.
#[derive(Debug)]
pub struct Hydrated {
    pub key: String,
    pub body: Result<Bytes, FetchError>,
}

/// Concurrent object fetcher with hard caps on workers and in-flight bytes.
///
/// The pools are shared by every request made through one `Fetcher`;
/// callers that start a request while the pools are drained block inside
/// the first acquisition until capacity returns.
pub struct Fetcher<S> {
    store: Arc<S>,

    workers: Arc<Semaphore>,
    memory: Arc<Semaphore>,

    chunk_bytes: u64,
    total_chunks: usize,
    per_request: usize,
}

impl<S: ObjectStore + 'static> Fetcher<S> {
    /// Build a fetcher over `store`.
    ///
    /// * `workers` — total simultaneous fetches across all requests.
    /// * `per_request` — fetch cap within one request, at most `workers`.
    /// * `chunk_bytes` — memory accounting granularity.
    /// * `total_bytes` — total in-flight memory cap; must be a positive
    ///   multiple of `chunk_bytes`.
    pub fn new(
        store: S,
        workers: usize,
        per_request: usize,
        chunk_bytes: u64,
        total_bytes: u64,
    ) -> Result<Fetcher<S>, FetchError> {
        if workers == 0 {
            return Err(FetchError::Config("worker count must be positive"));
        }
        if per_request == 0 || per_request > workers {
            return Err(FetchError::Config(
                "per-request worker cap must be between 1 and the worker count",
            ));
        }
        if chunk_bytes == 0 {
            return Err(FetchError::Config("memory chunk size must be positive"));
        }
        if total_bytes < chunk_bytes || total_bytes % chunk_bytes != 0 {
            return Err(FetchError::Config(
                "total memory must be a positive multiple of the chunk size",
            ));
        }
        let total_chunks = usize::try_from(total_bytes / chunk_bytes)
            .ok()
            .filter(|&n| n <= Semaphore::MAX_PERMITS && n <= u32::MAX as usize)
            .ok_or(FetchError::Config("memory pool has too many chunks"))?;

        Ok(Fetcher {
            store: Arc::new(store),
            workers: Arc::new(Semaphore::new(workers)),
            memory: Arc::new(Semaphore::new(total_chunks)),
            chunk_bytes,
            total_chunks,
            per_request,
        })
    }

    /// Memory chunks an object of `size` bytes occupies while in flight.
    fn chunks_needed(&self, size: u64) -> usize {
        (size.div_ceil(self.chunk_bytes)).min(usize::MAX as u64) as usize
    }

    /// Worker permits currently free.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Memory chunks currently free.
    pub fn available_memory_chunks(&self) -> usize {
        self.memory.available_permits()
    }

    /// Reserve `bytes` of pool memory, blocking until available. The
    /// reservation is returned to the pool on drop.
    pub async fn reserve_memory(&self, bytes: u64) -> Result<MemoryReservation, FetchError> {
        let need = self.chunks_needed(bytes);
        if need > self.total_chunks {
            return Err(FetchError::PoolExhausted {
                need,
                have: self.total_chunks,
            });
        }
        let permit = self
            .memory
            .clone()
            .acquire_many_owned(need as u32)
            .await
            .map_err(|_| FetchError::Config("memory pool closed"))?;
        Ok(MemoryReservation { _permit: permit })
    }

    // ── Listing ──────────────────────────────────────────────────────────────

    /// List every object under `prefix`, following continuation tokens
    /// until the store is exhausted. Keys come back in the store's natural
    /// order.
    pub async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, FetchError> {
        let mut objects = Vec::new();
        let mut continuation = None;

        loop {
            let listing = self
                .store
                .list(bucket, prefix, continuation)
                .await
                .map_err(FetchError::Store)?;
            objects.extend(listing.objects);
            match listing.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(bucket, prefix, count = objects.len(), "listing complete");
        Ok(objects)
    }

    /// List several prefixes concurrently, at most the per-request worker
    /// cap in flight, concatenating results in input-prefix order.
    pub async fn list_all_concurrent(
        &self,
        bucket: &str,
        prefixes: &[String],
    ) -> Result<Vec<ObjectInfo>, FetchError> {
        let pages: Vec<Vec<ObjectInfo>> = stream::iter(prefixes)
            .map(|prefix| self.list_all(bucket, prefix))
            .buffered(self.per_request)
            .try_collect()
            .await?;
        Ok(pages.into_iter().flatten().collect())
    }

    // ── Fetching ─────────────────────────────────────────────────────────────

    /// Fetch every descriptor concurrently and stream the results back in
    /// input order through a bounded channel.
    ///
    /// The producing side blocks on the memory and worker pools, which is
    /// what bounds the whole pipeline; dropping the receiver cancels
    /// cleanly, with in-flight fetches completing and returning their
    /// permits.
    pub fn fetch_all(&self, bucket: &str, objects: Vec<ObjectInfo>) -> mpsc::Receiver<Hydrated> {
        let (out_tx, out_rx) = mpsc::channel(1);

        let mut slots = Vec::with_capacity(objects.len());
        let mut handles = Vec::with_capacity(objects.len());
        for _ in &objects {
            let (tx, rx) = oneshot::channel();
            slots.push(tx);
            handles.push(rx);
        }

        // Forwarder: slot results out in input-index order. A fetch that
        // finishes early parks in its slot until its turn.
        tokio::spawn(async move {
            for handle in handles {
                match handle.await {
                    Ok(hydrated) => {
                        if out_tx.send(hydrated).await.is_err() {
                            // receiver gone; stop forwarding
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
        });

        // Producer: acquire memory, then workers, strictly in input order.
        let store = Arc::clone(&self.store);
        let workers = Arc::clone(&self.workers);
        let memory = Arc::clone(&self.memory);
        let request = Arc::new(Semaphore::new(self.per_request));
        let chunk_bytes = self.chunk_bytes;
        let total_chunks = self.total_chunks;
        let bucket = bucket.to_owned();

        tokio::spawn(async move {
            for (object, slot) in objects.into_iter().zip(slots) {
                let need = (object.size.div_ceil(chunk_bytes)).min(usize::MAX as u64) as usize;

                if need > total_chunks {
                    tracing::debug!(key = %object.key, need, total_chunks, "object exceeds memory pool");
                    let _ = slot.send(Hydrated {
                        key: object.key,
                        body: Err(FetchError::PoolExhausted {
                            need,
                            have: total_chunks,
                        }),
                    });
                    continue;
                }

                // All-or-wait: the chunks for one object are taken in a
                // single atomic acquisition.
                let mem = match memory.clone().acquire_many_owned(need as u32).await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let slot_permit = match request.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let worker = match workers.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let store = Arc::clone(&store);
                let bucket = bucket.clone();
                tokio::spawn(async move {
                    let body = store
                        .get(&bucket, &object.key)
                        .await
                        .map_err(FetchError::Store);

                    // workers free up as soon as the fetch is done so peers
                    // can start; memory is held until the body has been
                    // handed over
                    drop(worker);
                    drop(slot_permit);
                    let _ = slot.send(Hydrated {
                        key: object.key,
                        body,
                    });
                    drop(mem);
                });
            }
        });

        out_rx
    }
}

/// RAII memory reservation from [`Fetcher::reserve_memory`].
pub struct MemoryReservation {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
