use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("cached-model/", env!("CARGO_PKG_VERSION"));
const TIMEOUT_SECS: u64 = 30;

/// Endpoint parameters handed to a [`Fetch`] implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Option<String>,
}

/// Retrieves fresh data from the upstream API.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value>;
}

/// Fetches JSON with a plain GET request.
pub struct HttpFetcher {
    inner: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Value> {
        let url = request
            .url
            .as_deref()
            .ok_or_else(|| Error::Fetch("no url configured".to_string()))?;
        let resp = self.inner.get(url).send().await?.error_for_status()?;
        Ok(resp.json::<Value>().await?)
    }
}
