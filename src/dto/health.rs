use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of the storage ping run by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageStatus {
    /// The store answered its health check.
    Reachable,
    /// A store is installed but did not answer.
    Unreachable,
    /// No store is installed yet, or it was dropped after failed reconnects.
    Missing,
}

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" while no storage backend is usable.
    pub status: String,
    /// Name of the club served by this instance.
    pub club: String,
    /// Whether bookings and wallet operations are currently accepted.
    pub accepting_mutations: bool,
    /// Result of pinging the store for this request.
    pub storage: StorageStatus,
    /// Clients connected to the bookings stream.
    pub live_subscribers: usize,
}

impl HealthResponse {
    /// Build the response for the given club and degraded flag.
    pub fn new(
        club: impl Into<String>,
        degraded: bool,
        storage: StorageStatus,
        live_subscribers: usize,
    ) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            club: club.into(),
            accepting_mutations: !degraded,
            storage,
            live_subscribers,
        }
    }
}
