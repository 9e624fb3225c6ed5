use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// Keyed string storage shared between processes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;
}

/// The three store keys a model coordinates through, all sharing one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub data: String,
    pub next_check: String,
    pub last_modified: String,
}

impl StoreKeys {
    pub fn new(key: &str) -> Self {
        StoreKeys {
            data: format!("{key}-data"),
            next_check: format!("{key}-next-check"),
            last_modified: format!("{key}-last-modified"),
        }
    }
}

/// In-process store. Clones share the same underlying map, so several
/// models in one process can coordinate through it like separate
/// processes would through Redis.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.data.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
