pub mod journal;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::ClubRecords;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for club rows.
///
/// The in-memory ledger is the source of truth while the process runs; a store only has to
/// hand back everything it holds at startup and durably persist the rows of each committed
/// mutation. Both backends go through [`journal`] so a commit is never seen half-written.
pub trait ClubStore: Send + Sync {
    /// Load every persisted row.
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<ClubRecords>>;
    /// Persist every row of one mutation, or none of them when the call fails.
    fn commit(&self, changes: ClubRecords) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness check.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
