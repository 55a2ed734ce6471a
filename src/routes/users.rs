use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        booking::BookingSummary,
        user::{CreateUserRequest, TopUpRequest, TransactionSummary, UserSummary},
    },
    error::{AppError, ErrorBody},
    services::{booking_service, wallet_service},
    state::SharedState,
};

/// Player registration and wallet endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/credits", post(top_up))
        .route("/users/{id}/transactions", get(list_transactions))
        .route("/users/{id}/bookings", get(list_bookings))
}

/// Register a player with an empty wallet.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User registered", body = UserSummary),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateUserRequest>>,
) -> Result<Json<UserSummary>, AppError> {
    let user = wallet_service::create_user(&state, payload).await?;
    Ok(Json(user))
}

/// Fetch a player and their wallet.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User found", body = UserSummary),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSummary>, AppError> {
    let user = wallet_service::get_user(&state, id).await?;
    Ok(Json(user))
}

/// Load credits into a player's wallet.
#[utoipa::path(
    post,
    path = "/users/{id}/credits",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "Wallet topped up", body = UserSummary),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn top_up(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<TopUpRequest>>,
) -> Result<Json<UserSummary>, AppError> {
    let user = wallet_service::top_up(&state, id, payload).await?;
    Ok(Json(user))
}

/// Wallet history of a player, newest first.
#[utoipa::path(
    get,
    path = "/users/{id}/transactions",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Wallet history", body = [TransactionSummary]),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn list_transactions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransactionSummary>>, AppError> {
    let transactions = wallet_service::list_transactions(&state, id).await?;
    Ok(Json(transactions))
}

/// Bookings of a player, newest first.
#[utoipa::path(
    get,
    path = "/users/{id}/bookings",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Bookings of the user", body = [BookingSummary]),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn list_bookings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    let bookings = booking_service::user_bookings(&state, id).await?;
    Ok(Json(bookings))
}
