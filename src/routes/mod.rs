use axum::Router;

use crate::state::SharedState;

pub mod bookings;
pub mod docs;
pub mod health;
pub mod sse;
pub mod timeslots;
pub mod users;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(users::router())
        .merge(timeslots::router())
        .merge(bookings::router())
        .merge(docs::router())
        .with_state(state)
}
