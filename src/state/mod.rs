pub mod events;
pub mod ledger;
pub mod lifecycle;
mod sse;
pub mod transitions;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, RwLock, RwLockReadGuard, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::{
        club_store::ClubStore,
        storage::{StorageError, verify_snapshot},
    },
    error::ServiceError,
    state::{
        events::ClubEvent,
        ledger::{Draft, Ledger},
    },
};

pub use self::sse::BookingFeed;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;
/// Upper bound on how long a mutation may wait for the store to persist its changes.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state: configuration, the in-memory ledger and the storage handle.
pub struct AppState {
    config: Arc<AppConfig>,
    store: RwLock<Option<Arc<dyn ClubStore>>>,
    ledger: RwLock<Ledger>,
    events: BookingFeed,
    degraded: watch::Sender<bool>,
    mutation_gate: Mutex<()>,
    commit_timeout: Duration,
    // Set when a commit failed without telling whether the store kept it.
    stale: AtomicBool,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_commit_timeout(config, DEFAULT_COMMIT_TIMEOUT)
    }

    /// Like [`AppState::new`], with a custom bound on store commits.
    pub fn with_commit_timeout(config: AppConfig, commit_timeout: Duration) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            store: RwLock::new(None),
            ledger: RwLock::new(Ledger::new()),
            events: BookingFeed::new(64),
            degraded: degraded_tx,
            mutation_gate: Mutex::new(()),
            commit_timeout,
            stale: AtomicBool::new(false),
        })
    }

    /// Club configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Feed backing the bookings SSE stream.
    pub fn events(&self) -> &BookingFeed {
        &self.events
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn ClubStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn ClubStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Load the store's rows into the ledger, install the store and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn ClubStore>) -> Result<(), StorageError> {
        let _gate = self.mutation_gate.lock().await;
        let records = store.load_snapshot().await?;
        verify_snapshot(&records)?;
        info!(
            users = records.users.len(),
            slots = records.slots.len(),
            bookings = records.bookings.len(),
            transactions = records.transactions.len(),
            "loaded club snapshot from storage"
        );

        *self.ledger.write().await = Ledger::from_records(records);
        *self.store.write().await = Some(store);
        self.stale.store(false, Ordering::SeqCst);
        self.update_degraded(false).await;
        Ok(())
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Read-only access to the ledger.
    pub async fn ledger(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().await
    }

    /// Run `op` against a draft of the ledger, persist what it changed, then apply it.
    ///
    /// Mutations are serialized by a gate so drafts never race each other. When `op` fails,
    /// or the store rejects or times out on the commit, the ledger is left untouched; in the
    /// latter case it is reloaded from the store before the next mutation runs, since the
    /// commit may have landed anyway.
    pub async fn run_mutation<F, T>(&self, op: F) -> Result<(T, Vec<ClubEvent>), ServiceError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<T, ServiceError>,
    {
        let gate = self.mutation_gate.lock().await;
        let store = self.require_store().await?;
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        if self.stale.load(Ordering::SeqCst) {
            self.resync(store.as_ref()).await?;
        }

        let (value, changes) = {
            let ledger = self.ledger.read().await;
            let mut draft = Draft::new(&ledger);
            let value = op(&mut draft)?;
            (value, draft.into_changes())
        };

        if changes.is_empty() {
            drop(gate);
            return Ok((value, changes.events));
        }

        let committed = timeout(self.commit_timeout, store.commit(changes.records.clone()))
            .await
            .map_err(|_| ServiceError::Timeout)
            .and_then(|result| result.map_err(ServiceError::from));
        if let Err(err) = committed {
            warn!(error = %err, "commit outcome unknown; ledger will be reloaded");
            self.stale.store(true, Ordering::SeqCst);
            return Err(err);
        }

        let events = {
            let mut ledger = self.ledger.write().await;
            let events = ledger.apply(changes)?;
            debug!(version = ledger.version(), "ledger advanced");
            events
        };
        drop(gate);

        Ok((value, events))
    }

    /// Replace the ledger with what the store holds. Callers hold the mutation gate.
    async fn resync(&self, store: &dyn ClubStore) -> Result<(), ServiceError> {
        let records = store.load_snapshot().await?;
        verify_snapshot(&records)?;
        *self.ledger.write().await = Ledger::from_records(records);
        self.stale.store(false, Ordering::SeqCst);
        info!("ledger reloaded from storage after an uncertain commit");
        Ok(())
    }
}
