use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{dto::sse::StreamQuery, error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/bookings",
    tag = "sse",
    params(StreamQuery),
    responses(
        (status = 200, description = "Bookings SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown time slot", body = crate::error::ErrorBody)
    )
)]
/// Stream booking and time slot changes, optionally for a single slot.
pub async fn bookings_stream(
    State(state): State<SharedState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, handshake) = sse_service::subscribe(&state, query.slot_id).await?;
    info!(slot_id = ?query.slot_id, "new bookings SSE connection");
    Ok(sse_service::to_sse_stream(receiver, handshake, query.slot_id))
}

/// Server-sent event routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/sse/bookings", get(bookings_stream))
}
