//! terrane-fetch — bounded-parallelism object fetching.
//!
//! Retrieves many blobs from a remote object store at once while holding
//! hard caps on concurrent fetches and in-flight bytes, emitting results
//! in input order and blocking producers when either pool is exhausted.

pub mod error;
pub mod fetcher;
pub mod store;

pub use error::FetchError;
pub use fetcher::{Fetcher, Hydrated, MemoryReservation};
pub use store::{Listing, ObjectInfo, ObjectStore};
