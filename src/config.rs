use std::{fmt, sync::Arc, time::Duration};

use crate::store::Store;

/// Construction-time settings for a [`CachedModel`](crate::CachedModel).
///
/// `key` and `store` are required; either interval may be left unset (or
/// zero) to disable the matching refresh loop.
#[derive(Clone, Default)]
pub struct Options {
    pub key: Option<String>,
    pub store: Option<Arc<dyn Store>>,
    pub store_interval: Option<Duration>,
    pub api_interval: Option<Duration>,
    pub url: Option<String>,
    /// Label attached to log records for this model.
    pub name: Option<String>,
}

impl Options {
    pub fn new(key: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Options {
            key: Some(key.into()),
            store: Some(store),
            ..Options::default()
        }
    }

    pub fn with_store_interval(mut self, interval: Duration) -> Self {
        self.store_interval = Some(interval);
        self
    }

    pub fn with_api_interval(mut self, interval: Duration) -> Self {
        self.api_interval = Some(interval);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("key", &self.key)
            .field("store", &self.store.as_ref().map(|_| "<store>"))
            .field("store_interval", &self.store_interval)
            .field("api_interval", &self.api_interval)
            .field("url", &self.url)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::Options;
    use crate::store::MemoryStore;

    #[test]
    fn builder() {
        let options = Options::new("root-key", Arc::new(MemoryStore::new()))
            .with_store_interval(Duration::from_millis(1000))
            .with_api_interval(Duration::from_millis(2000))
            .with_url("http://localhost/data")
            .with_name("countries");
        assert_eq!(options.key.as_deref(), Some("root-key"));
        assert!(options.store.is_some());
        assert_eq!(options.store_interval, Some(Duration::from_millis(1000)));
        assert_eq!(options.api_interval, Some(Duration::from_millis(2000)));
        assert_eq!(options.url.as_deref(), Some("http://localhost/data"));
        assert_eq!(options.name.as_deref(), Some("countries"));

        let debug = format!("{:?}", options);
        assert!(debug.contains("<store>"));
    }

    #[test]
    fn default_is_empty() {
        let options = Options::default();
        assert!(options.key.is_none());
        assert!(options.store.is_none());
        assert!(options.store_interval.is_none());
        assert!(options.api_interval.is_none());
    }
}
