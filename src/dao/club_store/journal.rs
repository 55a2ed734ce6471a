//! Write-ahead journal that makes a multi-row commit all-or-nothing on stores without
//! multi-document transactions.
//!
//! A commit is durable once its [`JournalEntry`] is appended. Rows are written afterwards and
//! the entry is dropped; an entry still pending is replayed before the next commit and before
//! every snapshot load. Replays are safe to repeat because row writes are upserts by id.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::{models::ClubRecords, storage::StorageResult};

/// Every row changed by one mutation, recorded before any of them is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// When the commit was journaled.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Rows to write.
    pub changes: ClubRecords,
}

impl JournalEntry {
    /// Wrap a change set in a fresh entry.
    pub fn new(changes: ClubRecords) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            changes,
        }
    }
}

/// Primitive operations a backend exposes to run journaled commits.
pub trait RowJournal: Send + Sync {
    /// Durably record `entry`. This is the commit point.
    fn append_entry<'a>(&'a self, entry: &'a JournalEntry) -> BoxFuture<'a, StorageResult<()>>;
    /// Entries not yet dropped, oldest first.
    fn pending_entries(&self) -> BoxFuture<'_, StorageResult<Vec<JournalEntry>>>;
    /// Upsert every row of `rows` by id.
    fn write_rows<'a>(&'a self, rows: &'a ClubRecords) -> BoxFuture<'a, StorageResult<()>>;
    /// Forget an entry whose rows are all written.
    fn drop_entry(&self, id: Uuid) -> BoxFuture<'_, StorageResult<()>>;
    /// Every persisted row, as written so far.
    fn read_rows(&self) -> BoxFuture<'_, StorageResult<ClubRecords>>;
}

/// Journal `changes`, then write them.
///
/// Fails only when the entry could not be appended, in which case nothing was committed.
/// A failure while writing the rows is logged and left to the next replay.
pub async fn commit_journaled<J>(journal: &J, changes: ClubRecords) -> StorageResult<()>
where
    J: RowJournal + ?Sized,
{
    replay_pending(journal).await?;

    let entry = JournalEntry::new(changes);
    journal.append_entry(&entry).await?;

    let written = match journal.write_rows(&entry.changes).await {
        Ok(()) => journal.drop_entry(entry.id).await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        warn!(entry = %entry.id, error = %err, "journaled commit left for replay");
    }
    Ok(())
}

/// Finish pending commits, then read every row.
pub async fn load_journaled<J>(journal: &J) -> StorageResult<ClubRecords>
where
    J: RowJournal + ?Sized,
{
    replay_pending(journal).await?;
    journal.read_rows().await
}

async fn replay_pending<J>(journal: &J) -> StorageResult<()>
where
    J: RowJournal + ?Sized,
{
    for entry in journal.pending_entries().await? {
        journal.write_rows(&entry.changes).await?;
        journal.drop_entry(entry.id).await?;
        info!(entry = %entry.id, "replayed journaled commit");
    }
    Ok(())
}
