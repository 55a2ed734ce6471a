use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dao::{club_store::ClubStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, load its snapshot, and keep the shared state in degraded
/// mode whenever it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ClubStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        if let Err(err) = state.install_store(store.clone()).await {
            if matches!(err, StorageError::Corrupt(_)) {
                error!(error = %err, "refusing to seed the ledger; staying degraded");
            } else {
                warn!(error = %err, "failed to load club snapshot from storage");
            }
            sleep(delay).await;
            delay = (delay * 2).min(MAX_DELAY);
            continue;
        }
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        while watch_health(&state, store.as_ref()).await {
            sleep(HEALTH_POLL_INTERVAL).await;
        }

        warn!("exhausted storage reconnect attempts; dropping the store");
        state.clear_store().await;
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Ping the store once, reconnecting on failure. Returns `false` when the store is lost.
async fn watch_health(state: &SharedState, store: &dyn ClubStore) -> bool {
    if store.health_check().await.is_ok() {
        if state.is_degraded().await {
            info!("storage healthy again; leaving degraded mode");
            state.update_degraded(false).await;
        }
        return true;
    }

    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                state.update_degraded(false).await;
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::club_store::memory::MemoryClubStore, state::AppState};

    #[tokio::test(start_paused = true)]
    async fn supervisor_installs_the_store_and_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        let store = MemoryClubStore::new();
        let task = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok(Arc::new(store) as Arc<dyn ClubStore>) }
        }));

        let mut watcher = state.degraded_watcher();
        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert!(state.store().await.is_some());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_health_checks_enter_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryClubStore::new();
        let handle = store.clone();
        let task = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok(Arc::new(store) as Arc<dyn ClubStore>) }
        }));

        let mut watcher = state.degraded_watcher();
        watcher.wait_for(|degraded| !degraded).await.unwrap();

        handle.set_offline(true);
        watcher.wait_for(|degraded| *degraded).await.unwrap();
        task.abort();
    }
}
