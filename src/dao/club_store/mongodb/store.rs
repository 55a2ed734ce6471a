use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        BOOKING_COLLECTION_NAME, JOURNAL_COLLECTION_NAME, SLOT_COLLECTION_NAME,
        TRANSACTION_COLLECTION_NAME, USER_COLLECTION_NAME, id_filter,
    },
};
use crate::dao::{
    club_store::{
        ClubStore,
        journal::{JournalEntry, RowJournal, commit_journaled, load_journaled},
    },
    models::{BookingEntity, ClubRecords, TimeSlotEntity, TransactionEntity, UserEntity},
    storage::StorageResult,
};

/// MongoDB implementation of [`ClubStore`].
#[derive(Clone)]
pub struct MongoClubStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle it produced.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = self.config.connect().await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoClubStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = config.connect().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        for collection in [
            USER_COLLECTION_NAME,
            SLOT_COLLECTION_NAME,
            BOOKING_COLLECTION_NAME,
            TRANSACTION_COLLECTION_NAME,
            JOURNAL_COLLECTION_NAME,
        ] {
            self.create_index(collection, "id", doc! { "id": 1 }, true)
                .await?;
        }

        self.create_index(USER_COLLECTION_NAME, "email", doc! { "email": 1 }, true)
            .await?;
        self.create_index(
            SLOT_COLLECTION_NAME,
            "starts_at",
            doc! { "starts_at": 1 },
            false,
        )
        .await?;
        self.create_index(
            BOOKING_COLLECTION_NAME,
            "slot_id,user_id",
            doc! { "slot_id": 1, "user_id": 1 },
            false,
        )
        .await?;
        self.create_index(
            TRANSACTION_COLLECTION_NAME,
            "user_id",
            doc! { "user_id": 1 },
            false,
        )
        .await?;

        Ok(())
    }

    async fn create_index(
        &self,
        collection: &'static str,
        index: &'static str,
        keys: Document,
        unique: bool,
    ) -> MongoResult<()> {
        let database = self.database().await;
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(Some(format!("{collection}_{}_idx", index.replace(',', "_"))))
                    .unique(Some(unique))
                    .build(),
            )
            .build();

        database
            .collection::<Document>(collection)
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection,
                index,
                source,
            })?;
        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn load_all<T>(&self, collection: &'static str) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        self.collection::<T>(collection)
            .await
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|source| MongoDaoError::Load { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load { collection, source })
    }

    async fn upsert<T>(&self, collection: &'static str, id: Uuid, row: &T) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        self.collection::<T>(collection)
            .await
            .replace_one(id_filter(id), row)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection,
                id,
                source,
            })?;
        Ok(())
    }

    async fn load_rows(&self) -> MongoResult<ClubRecords> {
        Ok(ClubRecords {
            users: self.load_all::<UserEntity>(USER_COLLECTION_NAME).await?,
            slots: self.load_all::<TimeSlotEntity>(SLOT_COLLECTION_NAME).await?,
            bookings: self
                .load_all::<BookingEntity>(BOOKING_COLLECTION_NAME)
                .await?,
            transactions: self
                .load_all::<TransactionEntity>(TRANSACTION_COLLECTION_NAME)
                .await?,
        })
    }

    /// Rows are upserted one by one without a multi-document transaction, so a standalone
    /// server works too; the commit journal covers a write that stops halfway.
    async fn upsert_rows(&self, rows: &ClubRecords) -> MongoResult<()> {
        for slot in &rows.slots {
            self.upsert(SLOT_COLLECTION_NAME, slot.id, slot).await?;
        }
        for booking in &rows.bookings {
            self.upsert(BOOKING_COLLECTION_NAME, booking.id, booking)
                .await?;
        }
        for user in &rows.users {
            self.upsert(USER_COLLECTION_NAME, user.id, user).await?;
        }
        for transaction in &rows.transactions {
            self.upsert(TRANSACTION_COLLECTION_NAME, transaction.id, transaction)
                .await?;
        }

        debug!(
            slots = rows.slots.len(),
            bookings = rows.bookings.len(),
            users = rows.users.len(),
            transactions = rows.transactions.len(),
            "wrote club rows to MongoDB"
        );
        Ok(())
    }

    async fn journal_append(&self, entry: &JournalEntry) -> MongoResult<()> {
        self.collection::<JournalEntry>(JOURNAL_COLLECTION_NAME)
            .await
            .insert_one(entry)
            .await
            .map_err(|source| MongoDaoError::Journal {
                action: "append to",
                source,
            })?;
        Ok(())
    }

    async fn journal_pending(&self) -> MongoResult<Vec<JournalEntry>> {
        self.collection::<JournalEntry>(JOURNAL_COLLECTION_NAME)
            .await
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|source| MongoDaoError::Journal {
                action: "read",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Journal {
                action: "read",
                source,
            })
    }

    async fn journal_drop(&self, id: Uuid) -> MongoResult<()> {
        self.collection::<JournalEntry>(JOURNAL_COLLECTION_NAME)
            .await
            .delete_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::Journal {
                action: "prune",
                source,
            })?;
        Ok(())
    }
}

impl RowJournal for MongoClubStore {
    fn append_entry<'a>(&'a self, entry: &'a JournalEntry) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move { self.journal_append(entry).await.map_err(Into::into) })
    }

    fn pending_entries(&self) -> BoxFuture<'_, StorageResult<Vec<JournalEntry>>> {
        Box::pin(async move { self.journal_pending().await.map_err(Into::into) })
    }

    fn write_rows<'a>(&'a self, rows: &'a ClubRecords) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move { self.upsert_rows(rows).await.map_err(Into::into) })
    }

    fn drop_entry(&self, id: Uuid) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.journal_drop(id).await.map_err(Into::into) })
    }

    fn read_rows(&self) -> BoxFuture<'_, StorageResult<ClubRecords>> {
        Box::pin(async move { self.load_rows().await.map_err(Into::into) })
    }
}

impl ClubStore for MongoClubStore {
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
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
