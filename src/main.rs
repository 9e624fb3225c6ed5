use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use args::{parse_args, Parameter};
use cached_model::{CachedModel, HttpFetcher, MemoryStore, RedisStore, Store, SyncEvent};

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = parse_args(std::env::args())?;
    let store: Arc<dyn Store> = match config.get(Parameter::Redis) {
        Some(addr) => Arc::new(RedisStore::connect(addr).await?),
        None => {
            tracing::warn!("no --redis address given; using an in-process store");
            Arc::new(MemoryStore::new())
        }
    };

    let model = CachedModel::new(config.into_options(store)?, Arc::new(HttpFetcher::new()?))?;
    let mut events = model.subscribe();
    model.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SyncEvent::Updated { source }) => {
                    tracing::info!(?source, data = %model.to_json().await?, "model updated");
                }
                Ok(SyncEvent::Error { source, error }) => {
                    tracing::error!(?source, %error, "refresh failed");
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("event receiver lagged by {} messages", n);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    model.stop();
    Ok(())
}
