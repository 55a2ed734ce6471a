use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    club_store::{
        ClubStore,
        journal::{JournalEntry, RowJournal, commit_journaled, load_journaled},
    },
    models::{BookingEntity, ClubRecords, TimeSlotEntity, TransactionEntity, UserEntity},
    storage::{StorageError, StorageResult},
};

const NO_INTERRUPTION: usize = usize::MAX;

/// Failure reported by [`MemoryClubStore`] when it has been switched offline.
#[derive(Debug, Error)]
#[error("memory store is offline")]
pub struct MemoryStoreOffline;

impl From<MemoryStoreOffline> for StorageError {
    fn from(err: MemoryStoreOffline) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Failure injected by [`MemoryClubStore::interrupt_next_write_after`].
#[derive(Debug, Error)]
#[error("memory store write interrupted")]
pub struct MemoryWriteInterrupted;

impl From<MemoryWriteInterrupted> for StorageError {
    fn from(err: MemoryWriteInterrupted) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Process-local store, used for development runs and tests.
#[derive(Clone, Default)]
pub struct MemoryClubStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    users: DashMap<Uuid, UserEntity>,
    slots: DashMap<Uuid, TimeSlotEntity>,
    bookings: DashMap<Uuid, BookingEntity>,
    transactions: DashMap<Uuid, TransactionEntity>,
    journal: Mutex<Vec<JournalEntry>>,
    offline: AtomicBool,
    row_budget: AtomicUsize,
}

impl Default for MemoryInner {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            slots: DashMap::new(),
            bookings: DashMap::new(),
            transactions: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            row_budget: AtomicUsize::new(NO_INTERRUPTION),
        }
    }
}

impl MemoryClubStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `records`.
    pub fn with_records(records: ClubRecords) -> Self {
        let store = Self::new();
        for user in records.users {
            store.inner.users.insert(user.id, user);
        }
        for slot in records.slots {
            store.inner.slots.insert(slot.id, slot);
        }
        for booking in records.bookings {
            store.inner.bookings.insert(booking.id, booking);
        }
        for transaction in records.transactions {
            store.inner.transactions.insert(transaction.id, transaction);
        }
        store
    }

    /// Make every subsequent call fail (or succeed again) to simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Let the next row write persist only its first `rows` rows, then fail, the way a
    /// connection dropped in the middle of a commit would.
    pub fn interrupt_next_write_after(&self, rows: usize) {
        self.inner.row_budget.store(rows, Ordering::SeqCst);
    }

    /// Number of transactions persisted so far.
    pub fn transaction_count(&self) -> usize {
        self.inner.transactions.len()
    }

    fn ensure_online(&self) -> Result<(), MemoryStoreOffline> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(MemoryStoreOffline);
        }
        Ok(())
    }

    fn spend_row(&self) -> Result<(), MemoryWriteInterrupted> {
        match self.inner.row_budget.load(Ordering::SeqCst) {
            NO_INTERRUPTION => Ok(()),
            0 => {
                self.inner
                    .row_budget
                    .store(NO_INTERRUPTION, Ordering::SeqCst);
                Err(MemoryWriteInterrupted)
            }
            left => {
                self.inner.row_budget.store(left - 1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Same order as the MongoDB store: slots, bookings, users, then transactions.
    fn write(&self, rows: &ClubRecords) -> Result<(), MemoryWriteInterrupted> {
        for slot in &rows.slots {
            self.spend_row()?;
            self.inner.slots.insert(slot.id, slot.clone());
        }
        for booking in &rows.bookings {
            self.spend_row()?;
            self.inner.bookings.insert(booking.id, booking.clone());
        }
        for user in &rows.users {
            self.spend_row()?;
            self.inner.users.insert(user.id, user.clone());
        }
        for transaction in &rows.transactions {
            self.spend_row()?;
            self.inner
                .transactions
                .insert(transaction.id, transaction.clone());
        }
        // A budget larger than the write is not carried over to the next one.
        self.inner
            .row_budget
            .store(NO_INTERRUPTION, Ordering::SeqCst);
        Ok(())
    }

    fn snapshot(&self) -> ClubRecords {
        let mut users: Vec<_> = self.inner.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|user| user.created_at);
        let mut slots: Vec<_> = self.inner.slots.iter().map(|e| e.value().clone()).collect();
        slots.sort_by_key(|slot| slot.created_at);
        let mut bookings: Vec<_> = self
            .inner
            .bookings
            .iter()
            .map(|e| e.value().clone())
            .collect();
        bookings.sort_by_key(|booking| booking.created_at);
        let mut transactions: Vec<_> = self
            .inner
            .transactions
            .iter()
            .map(|e| e.value().clone())
            .collect();
        transactions.sort_by_key(|transaction| transaction.created_at);

        ClubRecords {
            users,
            slots,
            bookings,
            transactions,
        }
    }
}

impl RowJournal for MemoryClubStore {
    fn append_entry<'a>(&'a self, entry: &'a JournalEntry) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.ensure_online()?;
            self.inner.journal.lock().await.push(entry.clone());
            Ok(())
        })
    }

    fn pending_entries(&self) -> BoxFuture<'_, StorageResult<Vec<JournalEntry>>> {
        Box::pin(async move {
            self.ensure_online()?;
            Ok(self.inner.journal.lock().await.clone())
        })
    }

    fn write_rows<'a>(&'a self, rows: &'a ClubRecords) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.ensure_online()?;
            self.write(rows)?;
            Ok(())
        })
    }

    fn drop_entry(&self, id: Uuid) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.ensure_online()?;
            self.inner.journal.lock().await.retain(|entry| entry.id != id);
            Ok(())
        })
    }

    fn read_rows(&self) -> BoxFuture<'_, StorageResult<ClubRecords>> {
        Box::pin(async move {
            self.ensure_online()?;
            Ok(self.snapshot())
        })
    }
}

impl ClubStore for MemoryClubStore {
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<ClubRecords>> {
        let store = self.clone();
        Box::pin(async move { load_journaled(&store).await })
    }

    fn commit(&self, changes: ClubRecords) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { commit_journaled(&store, changes).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online().map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::Level;
    use time::OffsetDateTime;

    fn user(name: &str) -> UserEntity {
        let now = OffsetDateTime::now_utc();
        UserEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            email: format!("{name}@club.test"),
            level: Level::Intermediate,
            credits_cents: 0,
            blocked_cents: 0,
            points: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn committed_rows_come_back_in_snapshot() {
        let store = MemoryClubStore::new();
        let mut alice = user("alice");
        store
            .commit(ClubRecords {
                users: vec![alice.clone()],
                ..ClubRecords::default()
            })
            .await
            .unwrap();

        alice.credits_cents = 1_000;
        store
            .commit(ClubRecords {
                users: vec![alice.clone()],
                ..ClubRecords::default()
            })
            .await
            .unwrap();

        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.users, vec![alice]);
    }

    #[tokio::test]
    async fn offline_store_rejects_commits() {
        let store = MemoryClubStore::new();
        store.set_offline(true);
        assert!(store.commit(ClubRecords::default()).await.is_err());
        assert!(store.health_check().await.is_err());

        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
