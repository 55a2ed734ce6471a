use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::dao::models::CancelReason;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// Slot the event is about; `None` for club-wide events.
    pub slot_id: Option<Uuid>,
}

impl ServerEvent {
    /// Event carrying a raw text payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self {
            event,
            data,
            slot_id: None,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
            slot_id: None,
        })
    }

    /// Attach the slot the event is about.
    pub fn scoped_to(mut self, slot_id: Option<Uuid>) -> Self {
        self.slot_id = slot_id;
        self
    }

    /// Whether a subscriber following `filter` should receive the event.
    pub fn matches(&self, filter: Option<Uuid>) -> bool {
        match (filter, self.slot_id) {
            (Some(wanted), Some(slot_id)) => wanted == slot_id,
            _ => true,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First message sent to a client when it subscribes.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a booking is created or cancelled.
pub struct BookingChangedEvent {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CancelReason>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a time slot changes status or frees a spot.
pub struct SlotChangedEvent {
    pub slot_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recycled_spots: Option<u8>,
}

impl SlotChangedEvent {
    /// Event carrying only the slot identifier.
    pub fn bare(slot_id: Uuid) -> Self {
        Self {
            slot_id,
            court_id: None,
            group_size: None,
            recycled_spots: None,
        }
    }
}

/// Query string of `/sse/bookings`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// Only forward events about this time slot (club-wide events are always sent).
    pub slot_id: Option<Uuid>,
}
