use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the padel club back-end.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::bookings_stream,
        crate::routes::users::create_user,
        crate::routes::users::get_user,
        crate::routes::users::top_up,
        crate::routes::users::list_transactions,
        crate::routes::users::list_bookings,
        crate::routes::timeslots::list_courts,
        crate::routes::timeslots::list_instructors,
        crate::routes::timeslots::propose_class,
        crate::routes::timeslots::generate_proposals,
        crate::routes::timeslots::get_slot,
        crate::routes::timeslots::cancel_slot,
        crate::routes::timeslots::propose_match,
        crate::routes::timeslots::calendar,
        crate::routes::bookings::book_class,
        crate::routes::bookings::book_match,
        crate::routes::bookings::cancel_booking,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageStatus,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::BookingChangedEvent,
            crate::dto::sse::SlotChangedEvent,
            crate::dto::user::CreateUserRequest,
            crate::dto::user::TopUpRequest,
            crate::dto::user::UserSummary,
            crate::dto::user::TransactionSummary,
            crate::dto::timeslot::ProposeClassRequest,
            crate::dto::timeslot::ProposeMatchRequest,
            crate::dto::timeslot::GenerateProposalsRequest,
            crate::dto::timeslot::SlotSummary,
            crate::dto::timeslot::GroupOptionSummary,
            crate::dto::booking::BookRequest,
            crate::dto::booking::CancelBookingRequest,
            crate::dto::booking::BookingOutcome,
            crate::dto::booking::BookingSummary,
            crate::dto::booking::PaymentSummary,
            crate::dto::booking::PaymentMethod,
            crate::config::Court,
            crate::config::Instructor,
            crate::dao::models::Level,
            crate::dao::models::SlotKind,
            crate::dao::models::SlotStatus,
            crate::dao::models::BookingStatus,
            crate::dao::models::CancelReason,
            crate::dao::models::Currency,
            crate::dao::models::TransactionKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "users", description = "Players and their credits/points wallet"),
        (name = "club", description = "Courts and instructors"),
        (name = "timeslots", description = "Class and match proposals, calendar"),
        (name = "bookings", description = "Booking race and cancellations"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/sse/bookings",
            "/users",
            "/users/{id}/credits",
            "/timeslots/{id}/cancel",
            "/calendar",
            "/classes/book",
            "/matchgames/book",
            "/bookings/{id}/cancel",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
