use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{BookingChangedEvent, ServerEvent, SlotChangedEvent, SystemStatus},
    state::{SharedState, events::ClubEvent},
};

const EVENT_BOOKING_CREATED: &str = "booking_created";
const EVENT_BOOKING_CANCELLED: &str = "booking_cancelled";
const EVENT_SLOT_PROPOSED: &str = "slot_proposed";
const EVENT_SLOT_CONFIRMED: &str = "slot_confirmed";
const EVENT_SLOT_CANCELLED: &str = "slot_cancelled";
const EVENT_SLOT_COMPLETED: &str = "slot_completed";
const EVENT_SPOT_RECYCLED: &str = "spot_recycled";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast every event raised by a committed mutation, in order.
pub fn broadcast_club_events(state: &SharedState, events: &[ClubEvent]) {
    for event in events {
        let scope = Some(event.slot_id());
        match *event {
            ClubEvent::SlotProposed { slot_id } => {
                send_event(state, scope, EVENT_SLOT_PROPOSED, &SlotChangedEvent::bare(slot_id))
            }
            ClubEvent::SlotConfirmed {
                slot_id,
                court_id,
                group_size,
            } => send_event(
                state,
                scope,
                EVENT_SLOT_CONFIRMED,
                &SlotChangedEvent {
                    slot_id,
                    court_id: Some(court_id),
                    group_size: Some(group_size),
                    recycled_spots: None,
                },
            ),
            ClubEvent::SlotCancelled { slot_id } => {
                send_event(state, scope, EVENT_SLOT_CANCELLED, &SlotChangedEvent::bare(slot_id))
            }
            ClubEvent::SlotCompleted { slot_id } => {
                send_event(state, scope, EVENT_SLOT_COMPLETED, &SlotChangedEvent::bare(slot_id))
            }
            ClubEvent::SpotRecycled {
                slot_id,
                recycled_spots,
            } => send_event(
                state,
                scope,
                EVENT_SPOT_RECYCLED,
                &SlotChangedEvent {
                    recycled_spots: Some(recycled_spots),
                    ..SlotChangedEvent::bare(slot_id)
                },
            ),
            ClubEvent::BookingCreated {
                booking_id,
                slot_id,
                group_size,
            } => send_event(
                state,
                scope,
                EVENT_BOOKING_CREATED,
                &BookingChangedEvent {
                    booking_id,
                    slot_id,
                    group_size: Some(group_size),
                    reason: None,
                },
            ),
            ClubEvent::BookingCancelled {
                booking_id,
                slot_id,
                reason,
            } => send_event(
                state,
                scope,
                EVENT_BOOKING_CANCELLED,
                &BookingChangedEvent {
                    booking_id,
                    slot_id,
                    group_size: None,
                    reason: Some(reason),
                },
            ),
        }
    }
}

/// Broadcast the degraded flag after it changed.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_event(state, None, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Forward every change of the degraded flag to SSE subscribers.
pub async fn forward_system_status(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        info!(degraded, "system status changed");
        broadcast_system_status(&state, degraded);
    }
}

fn send_event(state: &SharedState, scope: Option<Uuid>, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => {
            state.events().publish(event.scoped_to(scope));
        }
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
