use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};

use crate::{
    clock::{Clock, SystemClock},
    config::Options,
    error::{Error, Result},
    fetch::{Fetch, FetchRequest},
    scheduler::Timers,
    store::{Store, StoreKeys},
};

pub type Attributes = Map<String, Value>;

const EVENT_CAPACITY: usize = 16;

/// Outcome of a pipeline step that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Nothing to do this run. Not an error.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Store,
    Api,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The model's attributes were replaced.
    Updated { source: Source },
    /// A refresh run failed. Aborted runs are never reported.
    Error { source: Source, error: Arc<Error> },
}

#[derive(Debug, Default)]
struct ModelState {
    attributes: Attributes,
    last_modified: Option<u64>,
}

/// A model whose attributes are kept fresh from a shared store and an
/// upstream API, each on its own interval.
///
/// The API loop writes what it fetches back to the store, and several
/// instances (in this process or others) sharing a store use the
/// `<key>-next-check` value to avoid all fetching at once.
pub struct CachedModel {
    pub(crate) inner: Arc<Inner>,
    pub(crate) timers: Mutex<Timers>,
}

pub(crate) struct Inner {
    keys: StoreKeys,
    name: String,
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetch>,
    clock: Arc<dyn Clock>,
    pub(crate) store_interval: Option<Duration>,
    pub(crate) api_interval: Option<Duration>,
    request: FetchRequest,
    state: RwLock<ModelState>,
    events: broadcast::Sender<SyncEvent>,
}

impl CachedModel {
    pub fn new(options: Options, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        Self::with_clock(options, fetcher, Arc::new(SystemClock))
    }

    pub fn with_clock(
        options: Options,
        fetcher: Arc<dyn Fetch>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let key = options
            .key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::Config("key must be supplied in options".to_string()))?;
        let store = options
            .store
            .ok_or_else(|| Error::Config("store must be supplied in options".to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(CachedModel {
            inner: Arc::new(Inner {
                keys: StoreKeys::new(&key),
                name: options.name.unwrap_or(key),
                store,
                fetcher,
                clock,
                store_interval: options.store_interval.filter(|d| !d.is_zero()),
                api_interval: options.api_interval.filter(|d| !d.is_zero()),
                request: FetchRequest { url: options.url },
                state: RwLock::new(ModelState::default()),
                events,
            }),
            timers: Mutex::new(Timers::default()),
        })
    }

    pub fn keys(&self) -> &StoreKeys {
        &self.inner.keys
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Receive update and error events from both refresh loops.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub async fn attributes(&self) -> Attributes {
        self.inner.state.read().await.attributes.clone()
    }

    pub async fn get(&self, field: &str) -> Option<Value> {
        self.inner.state.read().await.attributes.get(field).cloned()
    }

    /// When the attributes were last replaced, in epoch milliseconds.
    pub async fn last_modified(&self) -> Option<u64> {
        self.inner.state.read().await.last_modified
    }

    pub async fn to_json(&self) -> Result<String> {
        self.inner.to_json().await
    }

    /// Run the store pipeline once and return its outcome without
    /// publishing it.
    pub async fn refresh_from_store(&self) -> Result<Flow> {
        self.inner.refresh_from_store().await
    }

    /// Run the API pipeline once and return its outcome without
    /// publishing it.
    pub async fn refresh_from_api(&self) -> Result<Flow> {
        self.inner.refresh_from_api().await
    }

    /// Run the store pipeline once, publishing a failure to subscribers.
    pub async fn load_from_store(&self) {
        self.inner.load_from_store().await
    }

    /// Run the API pipeline once, publishing a failure to subscribers.
    pub async fn load_from_api(&self) {
        self.inner.load_from_api().await
    }
}

impl Inner {
    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    async fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state.read().await.attributes)?)
    }

    async fn replace(&self, source: Source, attributes: Attributes) {
        {
            let mut state = self.state.write().await;
            state.last_modified = Some(self.now());
            state.attributes = attributes;
        }
        // No subscribers is fine
        let _ = self.events.send(SyncEvent::Updated { source });
    }

    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn check_store_last_modified(&self) -> Result<Flow> {
        let last_modified = match self.state.read().await.last_modified {
            Some(t) => t,
            None => return Ok(Flow::Continue),
        };
        let stored = parse_millis(self.store.get(&self.keys.last_modified).await?);
        if stored != 0 && stored > last_modified {
            Ok(Flow::Continue)
        } else {
            tracing::debug!(stored, last_modified, "store data has not been modified");
            Ok(Flow::Abort)
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn load_store_data(&self) -> Result<()> {
        let data = self
            .store
            .get(&self.keys.data)
            .await?
            .ok_or_else(|| Error::MissingData(self.keys.data.clone()))?;
        let value: Value = serde_json::from_str(&data)?;
        // Attributes are always a map, whoever wrote the key
        self.replace(Source::Store, normalize(value)).await;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn check_next_check_time(&self) -> Result<Flow> {
        let next_check = parse_millis(self.store.get(&self.keys.next_check).await?);
        if next_check <= self.now() {
            Ok(Flow::Continue)
        } else {
            tracing::debug!(next_check, "api check not due yet");
            Ok(Flow::Abort)
        }
    }

    /// Claim the next check before fetching so other instances sharing the
    /// store skip theirs.
    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn reserve_next_check_time(&self) -> Result<()> {
        let interval = self
            .api_interval
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let next_check = self.now().saturating_add(interval);
        self.store
            .set(&self.keys.next_check, next_check.to_string())
            .await
    }

    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn fetch_from_api(&self) -> Result<()> {
        let value = self.fetcher.fetch(&self.request).await?;
        self.replace(Source::Api, normalize(value)).await;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn persist_data(&self) -> Result<()> {
        let data = self.to_json().await?;
        self.store.set(&self.keys.data, data).await
    }

    #[tracing::instrument(level = "debug", skip(self), fields(name = %self.name))]
    async fn persist_last_modified(&self) -> Result<()> {
        let last_modified = self.state.read().await.last_modified.unwrap_or(0);
        self.store
            .set(&self.keys.last_modified, last_modified.to_string())
            .await
    }

    async fn refresh_from_store(&self) -> Result<Flow> {
        if self.check_store_last_modified().await? == Flow::Abort {
            return Ok(Flow::Abort);
        }
        self.load_store_data().await?;
        Ok(Flow::Continue)
    }

    async fn refresh_from_api(&self) -> Result<Flow> {
        if self.check_next_check_time().await? == Flow::Abort {
            return Ok(Flow::Abort);
        }
        self.reserve_next_check_time().await?;
        self.fetch_from_api().await?;
        self.persist_data().await?;
        self.persist_last_modified().await?;
        Ok(Flow::Continue)
    }

    pub(crate) async fn load_from_store(&self) {
        let outcome = self.refresh_from_store().await;
        self.report(Source::Store, outcome);
    }

    pub(crate) async fn load_from_api(&self) {
        let outcome = self.refresh_from_api().await;
        self.report(Source::Api, outcome);
    }

    fn report(&self, source: Source, outcome: Result<Flow>) {
        match outcome {
            Ok(Flow::Continue) => {
                tracing::debug!(name = %self.name, ?source, "refresh complete");
            }
            Ok(Flow::Abort) => {
                tracing::trace!(name = %self.name, ?source, "refresh skipped");
            }
            Err(error) => {
                tracing::warn!(name = %self.name, ?source, %error, "refresh failed");
                let _ = self.events.send(SyncEvent::Error {
                    source,
                    error: Arc::new(error),
                });
            }
        }
    }
}

/// Objects become the attribute set as-is; anything else (scalars, arrays,
/// null) is wrapped as `{"data": value}`.
pub fn normalize(value: Value) -> Attributes {
    match value {
        Value::Object(attributes) => attributes,
        other => {
            let mut attributes = Attributes::new();
            attributes.insert("data".to_string(), other);
            attributes
        }
    }
}

/// Missing or non-numeric timestamps count as 0.
fn parse_millis(value: Option<String>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
}
