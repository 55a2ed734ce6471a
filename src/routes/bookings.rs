use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::SlotKind,
    dto::booking::{BookRequest, BookingOutcome, CancelBookingRequest},
    error::{AppError, ErrorBody},
    services::booking_service,
    state::SharedState,
};

/// Booking race and cancellation endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/classes/book", post(book_class))
        .route("/matchgames/book", post(book_match))
        .route("/bookings/{id}/cancel", post(cancel_booking))
}

/// Join the race for a class, or take a recycled spot of a confirmed one.
#[utoipa::path(
    post,
    path = "/classes/book",
    tag = "bookings",
    request_body = BookRequest,
    responses(
        (status = 200, description = "Booking recorded", body = BookingOutcome),
        (status = 400, description = "Invalid group size or payment method", body = ErrorBody),
        (status = 402, description = "Not enough credits or points", body = ErrorBody),
        (status = 409, description = "Slot unavailable or no court free", body = ErrorBody)
    )
)]
pub async fn book_class(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<BookRequest>>,
) -> Result<Json<BookingOutcome>, AppError> {
    let outcome = booking_service::book(&state, payload, SlotKind::Class).await?;
    Ok(Json(outcome))
}

/// Join the race for an open match, or take a recycled spot of a confirmed one.
#[utoipa::path(
    post,
    path = "/matchgames/book",
    tag = "bookings",
    request_body = BookRequest,
    responses(
        (status = 200, description = "Booking recorded", body = BookingOutcome),
        (status = 402, description = "Not enough credits or points", body = ErrorBody),
        (status = 409, description = "Slot unavailable or no court free", body = ErrorBody)
    )
)]
pub async fn book_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<BookRequest>>,
) -> Result<Json<BookingOutcome>, AppError> {
    let outcome = booking_service::book(&state, payload, SlotKind::Match).await?;
    Ok(Json(outcome))
}

/// Withdraw from a booking.
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Booking identifier")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = BookingOutcome),
        (status = 403, description = "Not the owner of the booking", body = ErrorBody),
        (status = 409, description = "Already cancelled or started", body = ErrorBody)
    )
)]
pub async fn cancel_booking(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CancelBookingRequest>>,
) -> Result<Json<BookingOutcome>, AppError> {
    let outcome = booking_service::cancel_booking(&state, id, payload).await?;
    Ok(Json(outcome))
}
