use time::{OffsetDateTime, macros::datetime};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::models::{
        BookingEntity, BookingStatus, ClubRecords, Level, Payment, SlotKind, SlotStatus,
        TimeSlotEntity, UserEntity,
    },
};

/// A Monday far enough in the future for every fixture slot to be bookable.
pub const DAY: OffsetDateTime = datetime!(2030-01-07 00:00 UTC);
/// "Now" used by the unit tests.
pub const NOW: OffsetDateTime = datetime!(2030-01-01 12:00 UTC);

pub fn config() -> AppConfig {
    AppConfig::default()
}

/// Instructor available 9:00-14:00 at 20.00/h.
pub fn alex(config: &AppConfig) -> Uuid {
    config.instructors[0].id
}

pub fn user(name: &str, level: Level, credits_cents: i64) -> UserEntity {
    UserEntity {
        id: Uuid::new_v4(),
        name: name.into(),
        email: format!("{name}@club.test"),
        level,
        credits_cents,
        blocked_cents: 0,
        points: 0,
        created_at: NOW,
        updated_at: NOW,
    }
}

pub fn class_at(instructor_id: Uuid, hour: u8, minute: u8) -> TimeSlotEntity {
    slot(SlotKind::Class, Some(instructor_id), hour, minute, 4_000)
}

pub fn match_at(hour: u8, minute: u8) -> TimeSlotEntity {
    slot(SlotKind::Match, None, hour, minute, 2_000)
}

fn slot(
    kind: SlotKind,
    instructor_id: Option<Uuid>,
    hour: u8,
    minute: u8,
    total_price_cents: i64,
) -> TimeSlotEntity {
    let starts_at = DAY
        .replace_hour(hour)
        .and_then(|at| at.replace_minute(minute))
        .unwrap();
    TimeSlotEntity {
        id: Uuid::new_v4(),
        kind,
        instructor_id,
        court_id: None,
        starts_at,
        duration_minutes: 60,
        total_price_cents,
        level: None,
        status: SlotStatus::Proposed,
        confirmed_group_size: None,
        recycled_spots: 0,
        created_at: NOW,
        updated_at: NOW,
    }
}

pub fn confirmed_booking(slot: &TimeSlotEntity, user: &UserEntity, amount_cents: i64) -> BookingEntity {
    BookingEntity {
        id: Uuid::new_v4(),
        slot_id: slot.id,
        user_id: user.id,
        group_size: slot.confirmed_group_size.unwrap_or(4),
        status: BookingStatus::Confirmed,
        cancel_reason: None,
        payment: Payment::Credits { amount_cents },
        recycled: false,
        created_at: NOW,
        updated_at: NOW,
    }
}

pub fn records(
    users: &[&UserEntity],
    slots: &[&TimeSlotEntity],
    bookings: &[&BookingEntity],
) -> ClubRecords {
    ClubRecords {
        users: users.iter().map(|&u| u.clone()).collect(),
        slots: slots.iter().map(|&s| s.clone()).collect(),
        bookings: bookings.iter().map(|&b| b.clone()).collect(),
        transactions: Vec::new(),
    }
}
