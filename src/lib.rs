//! Keep a model fresh from a shared store and an upstream API.
//!
//! A [`CachedModel`] runs two independent refresh loops:
//!
//! - **store sync** loads `<key>-data` whenever `<key>-last-modified` is
//!   newer than what the model already holds;
//! - **API sync** fetches from the upstream API once `<key>-next-check`
//!   is due, reserving the next check first, then writes the data and its
//!   timestamp back to the store.
//!
//! Processes sharing a store therefore mostly fetch once per API interval
//! between them, and everyone else picks the result up from the store.

pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod redis;
pub mod resp;
mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Options;
pub use error::{Error, Result};
pub use fetch::{Fetch, FetchRequest, HttpFetcher};
pub use model::{normalize, Attributes, CachedModel, Flow, Source, SyncEvent};
pub use redis::RedisStore;
pub use store::{MemoryStore, Store, StoreKeys};
