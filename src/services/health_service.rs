use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageStatus},
    state::SharedState,
};

/// Ping the store and report whether the club is accepting mutations.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => StorageStatus::Reachable,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                StorageStatus::Unreachable
            }
        },
        None => StorageStatus::Missing,
    };

    HealthResponse::new(
        state.config().club_name.clone(),
        state.is_degraded().await,
        storage,
        state.events().subscribers(),
    )
}
