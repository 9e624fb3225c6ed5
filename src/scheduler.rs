use std::{future::Future, sync::PoisonError, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::model::CachedModel;

/// Ticker tasks for the two refresh loops.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    store: Option<JoinHandle<()>>,
    api: Option<JoinHandle<()>>,
}

impl Timers {
    fn cancel(&mut self) {
        for handle in [self.store.take(), self.api.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

/// Spawn one run of `run` right away, then a ticker task that spawns
/// another run once per `period`.
///
/// Each run is spawned separately, so a slow run never delays the next
/// tick and runs of the same pipeline may overlap. Aborting the returned
/// handle stops future ticks but leaves spawned runs, including the first
/// one, to finish.
fn spawn_timer<F, Fut>(period: Duration, run: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(run());
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tokio::spawn(run());
        }
    })
}

impl CachedModel {
    /// Start both refresh loops, replacing any that are already running.
    ///
    /// Each loop runs once immediately and then on its interval. A loop
    /// whose interval isn't configured doesn't run at all. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.cancel();

        if let Some(period) = self.inner.store_interval {
            let inner = self.inner.clone();
            timers.store = Some(spawn_timer(period, move || {
                let inner = inner.clone();
                async move { inner.load_from_store().await }
            }));
        }

        if let Some(period) = self.inner.api_interval {
            let inner = self.inner.clone();
            timers.api = Some(spawn_timer(period, move || {
                let inner = inner.clone();
                async move { inner.load_from_api().await }
            }));
        }

        tracing::debug!(
            name = %self.name(),
            store = timers.store.is_some(),
            api = timers.api.is_some(),
            "refresh started"
        );
    }

    /// Stop both refresh loops. Runs already in flight complete.
    pub fn stop(&self) {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    pub fn has_store_timer(&self) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .store
            .is_some()
    }

    pub fn has_api_timer(&self) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .api
            .is_some()
    }

    pub fn is_running(&self) -> bool {
        self.has_store_timer() || self.has_api_timer()
    }
}

impl Drop for CachedModel {
    fn drop(&mut self) {
        self.stop();
    }
}
