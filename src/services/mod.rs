/// Court and instructor allocation when a race completes.
pub mod allocation;
/// Booking race, recycled spots and cancellations.
pub mod booking_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Background expiry and completion of time slots.
pub mod expiry_sweeper;
/// Health check service.
pub mod health_service;
/// Class and match proposals, calendar queries.
pub mod slot_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Users, wallet top-ups and wallet movements.
pub mod wallet_service;

#[cfg(test)]
pub(crate) mod test_support;
