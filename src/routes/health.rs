use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, description = "Accepting bookings", body = HealthResponse),
        (status = 503, description = "Degraded: reads only", body = HealthResponse)
    )
)]
/// Report storage reachability; answers 503 while mutations are refused.
pub async fn healthcheck(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let health = health_service::health_status(&state).await;
    let code = if health.accepting_mutations {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}

/// Health routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/healthcheck", get(healthcheck))
}
