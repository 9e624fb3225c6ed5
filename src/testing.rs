use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    fetch::{Fetch, FetchRequest},
    store::Store,
};

/// Store that records every call and can be switched into failing.
#[derive(Default)]
pub struct MockStore {
    values: Mutex<HashMap<String, String>>,
    gets: Mutex<Vec<String>>,
    sets: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MockStore {
    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub fn sets(&self) -> Vec<(String, String)> {
        self.sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.lock().unwrap().push(key.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Store("store unavailable".to_string()));
        }
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Store("store unavailable".to_string()));
        }
        self.sets
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone()));
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Fetcher returning a canned response.
pub struct MockFetch {
    response: Mutex<std::result::Result<Value, String>>,
    calls: AtomicUsize,
}

impl Default for MockFetch {
    fn default() -> Self {
        MockFetch::returning(Value::Null)
    }
}

impl MockFetch {
    pub fn returning(value: Value) -> Self {
        MockFetch {
            response: Mutex::new(Ok(value)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(&self, value: Value) {
        *self.response.lock().unwrap() = Ok(value);
    }

    pub fn fail(&self, message: &str) {
        *self.response.lock().unwrap() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(Error::Fetch)
    }
}
