use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    config::{Court, Instructor},
    dto::timeslot::{
        CalendarQuery, GenerateProposalsRequest, ProposeClassRequest, ProposeMatchRequest,
        SlotSummary,
    },
    error::{AppError, ErrorBody},
    services::slot_service,
    state::SharedState,
};

/// Club resources, proposals and the calendar.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/courts", get(list_courts))
        .route("/instructors", get(list_instructors))
        .route("/timeslots", post(propose_class))
        .route("/timeslots/generate", post(generate_proposals))
        .route("/timeslots/{id}", get(get_slot))
        .route("/timeslots/{id}/cancel", post(cancel_slot))
        .route("/matches", post(propose_match))
        .route("/calendar", get(calendar))
}

/// Courts of the club, in allocation order.
#[utoipa::path(
    get,
    path = "/courts",
    tag = "club",
    responses((status = 200, description = "Courts", body = [Court]))
)]
pub async fn list_courts(State(state): State<SharedState>) -> Json<Vec<Court>> {
    Json(slot_service::courts(&state))
}

/// Instructor roster.
#[utoipa::path(
    get,
    path = "/instructors",
    tag = "club",
    responses((status = 200, description = "Instructors", body = [Instructor]))
)]
pub async fn list_instructors(State(state): State<SharedState>) -> Json<Vec<Instructor>> {
    Json(slot_service::instructors(&state))
}

/// Publish a class proposal.
#[utoipa::path(
    post,
    path = "/timeslots",
    tag = "timeslots",
    request_body = ProposeClassRequest,
    responses(
        (status = 200, description = "Class proposed", body = SlotSummary),
        (status = 400, description = "Invalid start or duration", body = ErrorBody),
        (status = 409, description = "Instructor already busy", body = ErrorBody)
    )
)]
pub async fn propose_class(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ProposeClassRequest>>,
) -> Result<Json<SlotSummary>, AppError> {
    let slot = slot_service::propose_class(&state, payload).await?;
    Ok(Json(slot))
}

/// Publish every free class start of an instructor on a day.
#[utoipa::path(
    post,
    path = "/timeslots/generate",
    tag = "timeslots",
    request_body = GenerateProposalsRequest,
    responses((status = 200, description = "Proposals created", body = [SlotSummary]))
)]
pub async fn generate_proposals(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GenerateProposalsRequest>>,
) -> Result<Json<Vec<SlotSummary>>, AppError> {
    let slots = slot_service::generate_proposals(&state, payload).await?;
    Ok(Json(slots))
}

/// Fetch a time slot with the state of its race.
#[utoipa::path(
    get,
    path = "/timeslots/{id}",
    tag = "timeslots",
    params(("id" = Uuid, Path, description = "Time slot identifier")),
    responses(
        (status = 200, description = "Time slot", body = SlotSummary),
        (status = 404, description = "Unknown time slot", body = ErrorBody)
    )
)]
pub async fn get_slot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotSummary>, AppError> {
    let slot = slot_service::get_slot(&state, id).await?;
    Ok(Json(slot))
}

/// Cancel a time slot, refunding its players.
#[utoipa::path(
    post,
    path = "/timeslots/{id}/cancel",
    tag = "timeslots",
    params(("id" = Uuid, Path, description = "Time slot identifier")),
    responses(
        (status = 200, description = "Time slot cancelled", body = SlotSummary),
        (status = 409, description = "Already started, played or cancelled", body = ErrorBody)
    )
)]
pub async fn cancel_slot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotSummary>, AppError> {
    let slot = slot_service::cancel_slot(&state, id).await?;
    Ok(Json(slot))
}

/// Open a match to four players.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "timeslots",
    request_body = ProposeMatchRequest,
    responses(
        (status = 200, description = "Match proposed", body = SlotSummary),
        (status = 400, description = "Invalid start or duration", body = ErrorBody)
    )
)]
pub async fn propose_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ProposeMatchRequest>>,
) -> Result<Json<SlotSummary>, AppError> {
    let slot = slot_service::propose_match(&state, payload).await?;
    Ok(Json(slot))
}

/// Time slots starting in a window, in start order.
#[utoipa::path(
    get,
    path = "/calendar",
    tag = "timeslots",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Time slots", body = [SlotSummary]),
        (status = 400, description = "Invalid window", body = ErrorBody)
    )
)]
pub async fn calendar(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<CalendarQuery>>,
) -> Result<Json<Vec<SlotSummary>>, AppError> {
    let slots = slot_service::calendar(&state, query).await?;
    Ok(Json(slots))
}
