use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{BookingEntity, BookingStatus, CancelReason, Payment},
    dto::timeslot::SlotSummary,
};

/// Currency a booking is paid with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Credits, blocked until the race completes. Required on proposals.
    #[default]
    Credits,
    /// Points, only accepted for recycled spots of confirmed slots.
    Points,
}

/// Payload used to join a slot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BookRequest {
    pub user_id: Uuid,
    pub slot_id: Uuid,
    /// Group option to race for. Ignored for recycled spots, which keep the confirmed size.
    #[serde(default)]
    #[validate(range(min = 1, max = 4))]
    pub group_size: Option<u8>,
    #[serde(default)]
    pub payment: PaymentMethod,
}

/// Payload used to cancel a booking.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CancelBookingRequest {
    /// Must be the owner of the booking.
    pub user_id: Uuid,
}

/// Payment attached to a booking, as exposed by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSummary {
    pub method: PaymentMethod,
    /// Cents for credits, units for points.
    pub amount: i64,
}

impl From<Payment> for PaymentSummary {
    fn from(payment: Payment) -> Self {
        match payment {
            Payment::Credits { amount_cents } => Self {
                method: PaymentMethod::Credits,
                amount: amount_cents,
            },
            Payment::Points { points } => Self {
                method: PaymentMethod::Points,
                amount: points,
            },
        }
    }
}

/// A player's booking.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingSummary {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub group_size: u8,
    pub status: BookingStatus,
    pub cancel_reason: Option<CancelReason>,
    pub payment: PaymentSummary,
    pub recycled: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<BookingEntity> for BookingSummary {
    fn from(booking: BookingEntity) -> Self {
        Self {
            id: booking.id,
            slot_id: booking.slot_id,
            user_id: booking.user_id,
            group_size: booking.group_size,
            status: booking.status,
            cancel_reason: booking.cancel_reason,
            payment: booking.payment.into(),
            recycled: booking.recycled,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

/// Result of a booking or cancellation: the booking and the slot as it now stands.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingOutcome {
    pub booking: BookingSummary,
    pub slot: SlotSummary,
}
