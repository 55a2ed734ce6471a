use crate::{
    error::ServiceError,
    services::sse_events::broadcast_club_events,
    state::{SharedState, ledger::Draft},
};

/// Execute a ledger mutation, then broadcast the events it raised.
pub async fn run_mutation_with_broadcast<F, T>(state: &SharedState, op: F) -> Result<T, ServiceError>
where
    F: FnOnce(&mut Draft<'_>) -> Result<T, ServiceError>,
{
    let (value, events) = state.run_mutation(op).await?;
    broadcast_club_events(state, &events);
    Ok(value)
}
