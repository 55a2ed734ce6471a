use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{
        BookingEntity, BookingStatus, Level, SlotKind, SlotStatus, TimeSlotEntity,
    },
    dto::validation::validate_duration_minutes,
};

/// Payload used by an instructor to publish a class proposal.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeClassRequest {
    pub instructor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    /// 60 or 90.
    pub duration_minutes: u16,
}

/// Payload used to open a match to four players.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeMatchRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    /// 60 or 90.
    pub duration_minutes: u16,
}

/// Payload used to publish every free class start of an instructor on a given day.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateProposalsRequest {
    pub instructor_id: Uuid,
    /// Day to fill, `YYYY-MM-DD` (UTC).
    #[schema(value_type = String, format = Date)]
    pub date: Date,
    /// 60 or 90.
    pub duration_minutes: u16,
}

macro_rules! validate_duration {
    ($($request:ty),+) => {
        $(
            impl Validate for $request {
                fn validate(&self) -> Result<(), ValidationErrors> {
                    let mut errors = ValidationErrors::new();
                    if let Err(e) = validate_duration_minutes(self.duration_minutes) {
                        errors.add("duration_minutes", e);
                    }

                    if errors.is_empty() {
                        Ok(())
                    } else {
                        Err(errors)
                    }
                }
            }
        )+
    };
}

validate_duration!(ProposeClassRequest, ProposeMatchRequest, GenerateProposalsRequest);

/// Time window requested from the calendar.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    /// Inclusive lower bound on slot starts (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    #[param(value_type = String, format = DateTime)]
    pub from: OffsetDateTime,
    /// Exclusive upper bound on slot starts (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    #[param(value_type = String, format = DateTime)]
    pub to: OffsetDateTime,
}

/// Racing state of one group option of a slot.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupOptionSummary {
    pub group_size: u8,
    pub price_per_player_cents: i64,
    /// Active bookings on this option.
    pub booked: u8,
    /// Spots still open: missing players while racing, recycled spots once confirmed.
    pub remaining: u8,
}

/// Time slot as shown on the calendar.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotSummary {
    pub id: Uuid,
    pub kind: SlotKind,
    pub status: SlotStatus,
    pub instructor_id: Option<Uuid>,
    pub court_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub duration_minutes: u16,
    pub total_price_cents: i64,
    pub level: Option<Level>,
    pub confirmed_group_size: Option<u8>,
    pub recycled_spots: u8,
    /// Points needed to take a recycled spot, when one is open.
    pub recycled_spot_points: Option<i64>,
    pub options: Vec<GroupOptionSummary>,
}

impl SlotSummary {
    /// Summarise `slot` given the bookings made against it.
    pub fn build<'b>(
        slot: &TimeSlotEntity,
        bookings: impl IntoIterator<Item = &'b BookingEntity>,
        cents_per_point: i64,
    ) -> Self {
        let bookings: Vec<&BookingEntity> = bookings
            .into_iter()
            .filter(|booking| booking.slot_id == slot.id)
            .collect();

        let options = match (slot.status, slot.confirmed_group_size) {
            (SlotStatus::Proposed, _) => slot
                .kind
                .group_sizes()
                .iter()
                .map(|&group_size| {
                    let booked = count(&bookings, group_size, BookingStatus::Pending);
                    GroupOptionSummary {
                        group_size,
                        price_per_player_cents: slot.price_per_player(group_size),
                        booked,
                        remaining: group_size.saturating_sub(booked),
                    }
                })
                .collect(),
            (SlotStatus::Confirmed | SlotStatus::Completed, Some(group_size)) => {
                vec![GroupOptionSummary {
                    group_size,
                    price_per_player_cents: slot.price_per_player(group_size),
                    booked: count(&bookings, group_size, BookingStatus::Confirmed),
                    remaining: if slot.status == SlotStatus::Confirmed {
                        slot.recycled_spots
                    } else {
                        0
                    },
                }]
            }
            _ => Vec::new(),
        };

        let recycled_spot_points = match slot.confirmed_group_size {
            Some(group_size) if slot.status == SlotStatus::Confirmed && slot.recycled_spots > 0 => {
                Some(points_for(slot.price_per_player(group_size), cents_per_point))
            }
            _ => None,
        };

        Self {
            id: slot.id,
            kind: slot.kind,
            status: slot.status,
            instructor_id: slot.instructor_id,
            court_id: slot.court_id,
            starts_at: slot.starts_at,
            ends_at: slot.ends_at(),
            duration_minutes: slot.duration_minutes,
            total_price_cents: slot.total_price_cents,
            level: slot.level,
            confirmed_group_size: slot.confirmed_group_size,
            recycled_spots: slot.recycled_spots,
            recycled_spot_points,
            options,
        }
    }
}

fn count(bookings: &[&BookingEntity], group_size: u8, status: BookingStatus) -> u8 {
    let matching = bookings
        .iter()
        .filter(|booking| booking.group_size == group_size && booking.status == status)
        .count();
    u8::try_from(matching).unwrap_or(u8::MAX)
}

/// Points needed to cover `price_cents`, rounding up.
pub fn points_for(price_cents: i64, cents_per_point: i64) -> i64 {
    let rate = cents_per_point.max(1);
    (price_cents + rate - 1) / rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::Payment;
    use time::macros::datetime;

    fn slot() -> TimeSlotEntity {
        let at = datetime!(2030-01-07 10:00 UTC);
        TimeSlotEntity {
            id: Uuid::new_v4(),
            kind: SlotKind::Class,
            instructor_id: Some(Uuid::new_v4()),
            court_id: None,
            starts_at: at,
            duration_minutes: 60,
            total_price_cents: 4_000,
            level: None,
            status: SlotStatus::Proposed,
            confirmed_group_size: None,
            recycled_spots: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn booking(slot_id: Uuid, group_size: u8, status: BookingStatus) -> BookingEntity {
        let at = datetime!(2030-01-01 10:00 UTC);
        BookingEntity {
            id: Uuid::new_v4(),
            slot_id,
            user_id: Uuid::new_v4(),
            group_size,
            status,
            cancel_reason: None,
            payment: Payment::Credits { amount_cents: 1_000 },
            recycled: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn proposed_slot_lists_every_group_option() {
        let slot = slot();
        let bookings = [
            booking(slot.id, 2, BookingStatus::Pending),
            booking(slot.id, 4, BookingStatus::Pending),
            booking(slot.id, 4, BookingStatus::Cancelled),
        ];

        let summary = SlotSummary::build(&slot, &bookings, 100);
        let options: Vec<_> = summary
            .options
            .iter()
            .map(|o| (o.group_size, o.price_per_player_cents, o.booked, o.remaining))
            .collect();
        assert_eq!(
            options,
            vec![
                (1, 4_000, 0, 1),
                (2, 2_000, 1, 1),
                (3, 1_334, 0, 3),
                (4, 1_000, 1, 3)
            ]
        );
        assert_eq!(summary.recycled_spot_points, None);
    }

    #[test]
    fn confirmed_slot_prices_recycled_spots_in_points() {
        let mut slot = slot();
        slot.status = SlotStatus::Confirmed;
        slot.confirmed_group_size = Some(3);
        slot.recycled_spots = 1;
        let bookings = [
            booking(slot.id, 3, BookingStatus::Confirmed),
            booking(slot.id, 3, BookingStatus::Confirmed),
        ];

        let summary = SlotSummary::build(&slot, &bookings, 100);
        assert_eq!(summary.options.len(), 1);
        assert_eq!(summary.options[0].booked, 2);
        assert_eq!(summary.options[0].remaining, 1);
        assert_eq!(summary.recycled_spot_points, Some(14));
    }

    #[test]
    fn durations_are_validated_on_requests() {
        let request = ProposeMatchRequest {
            starts_at: datetime!(2030-01-07 10:00 UTC),
            duration_minutes: 45,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn generation_request_reads_a_calendar_date() {
        let request: GenerateProposalsRequest = serde_json::from_value(serde_json::json!({
            "instructor_id": Uuid::nil(),
            "date": "2030-01-07",
            "duration_minutes": 90,
        }))
        .unwrap();
        assert_eq!(request.date, time::macros::date!(2030 - 01 - 07));
        assert!(request.validate().is_ok());
    }
}
