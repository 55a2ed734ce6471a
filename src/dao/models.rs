use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Playing level of a user, also the level a class proposal gets locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Learning the basics.
    Beginner,
    /// Regular club player.
    Intermediate,
    /// Competition player.
    Advanced,
}

/// Member of the club together with their wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Contact email, unique across users.
    pub email: String,
    /// Declared playing level.
    pub level: Level,
    /// Total credit balance in cents, including blocked credits.
    pub credits_cents: i64,
    /// Credits held by pending bookings.
    pub blocked_cents: i64,
    /// Points balance.
    pub points: i64,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last time the wallet or profile changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserEntity {
    /// Credits that can still be spent or blocked.
    pub fn available_cents(&self) -> i64 {
        self.credits_cents - self.blocked_cents
    }
}

/// What a time slot is offered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Lesson given by an instructor, filled by a group of 1 to 4 players.
    Class,
    /// Open match between four players, no instructor.
    Match,
}

impl SlotKind {
    /// Group sizes players may race for on this kind of slot.
    pub fn group_sizes(self) -> &'static [u8] {
        match self {
            SlotKind::Class => &[1, 2, 3, 4],
            SlotKind::Match => &[4],
        }
    }

    /// Whether `size` is one of [`SlotKind::group_sizes`].
    pub fn allows_group_size(self, size: u8) -> bool {
        self.group_sizes().contains(&size)
    }
}

/// Lifecycle status of a time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Published and open to the booking race.
    Proposed,
    /// A group filled it and a court was assigned.
    Confirmed,
    /// Withdrawn or expired before being played.
    Cancelled,
    /// Played.
    Completed,
}

/// Proposed or confirmed block of court time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlotEntity {
    /// Stable identifier for the slot.
    pub id: Uuid,
    /// Class or match.
    pub kind: SlotKind,
    /// Instructor giving the class (`None` for matches).
    pub instructor_id: Option<Uuid>,
    /// Court assigned on confirmation.
    pub court_id: Option<Uuid>,
    /// Start of the slot.
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    /// Length of the slot in minutes.
    pub duration_minutes: u16,
    /// Price of the whole slot, split between the players of the winning group.
    pub total_price_cents: i64,
    /// Level fixed by the first booking.
    pub level: Option<Level>,
    /// Lifecycle status.
    pub status: SlotStatus,
    /// Group size of the option that won the race.
    pub confirmed_group_size: Option<u8>,
    /// Spots of the confirmed group freed by cancellations and not re-booked yet.
    pub recycled_spots: u8,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last modification timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TimeSlotEntity {
    /// End of the slot.
    pub fn ends_at(&self) -> OffsetDateTime {
        self.starts_at + time::Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether `[start, end)` intersects this slot.
    pub fn overlaps(&self, start: OffsetDateTime, end: OffsetDateTime) -> bool {
        self.starts_at < end && start < self.ends_at()
    }

    /// Share of the total price paid by each player of a group of `group_size`.
    pub fn price_per_player(&self, group_size: u8) -> i64 {
        price_per_player(self.total_price_cents, group_size)
    }

    /// Whether the slot still counts against court and instructor availability.
    pub fn is_active(&self) -> bool {
        matches!(self.status, SlotStatus::Proposed | SlotStatus::Confirmed)
    }
}

/// Split `total_cents` between `group_size` players, rounding up to the next cent.
pub fn price_per_player(total_cents: i64, group_size: u8) -> i64 {
    let players = i64::from(group_size.max(1));
    (total_cents + players - 1) / players
}

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Racing for its group option, credits blocked.
    Pending,
    /// Part of the confirmed group.
    Confirmed,
    /// No longer holds a spot.
    Cancelled,
}

/// Why a booking ended up cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The player cancelled it.
    Withdrawn,
    /// Another group option of the same slot won the race.
    Displaced,
    /// The player got confirmed in another slot on the same day.
    DayConflict,
    /// The slot itself was cancelled.
    SlotCancelled,
    /// The slot started before any group filled.
    Expired,
}

/// How a booking was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Payment {
    /// Credits blocked while pending, charged on confirmation.
    Credits {
        /// Price per player in cents.
        amount_cents: i64,
    },
    /// Points spent up front on a recycled spot.
    Points {
        /// Points spent.
        points: i64,
    },
}

/// A player's registration against a time slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingEntity {
    /// Stable identifier for the booking.
    pub id: Uuid,
    /// Slot being booked.
    pub slot_id: Uuid,
    /// Player holding the booking.
    pub user_id: Uuid,
    /// Group option raced for.
    pub group_size: u8,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Set once the booking is cancelled.
    pub cancel_reason: Option<CancelReason>,
    /// Payment attached to the booking.
    pub payment: Payment,
    /// Whether the booking took a recycled spot.
    pub recycled: bool,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last modification timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BookingEntity {
    /// Pending or confirmed.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        )
    }
}

/// Wallet currency a transaction moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Credits, in cents.
    Credits,
    /// Points.
    Points,
}

/// Kind of wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credits loaded into the wallet.
    TopUp,
    /// Credits held by a pending booking.
    Block,
    /// Held credits released.
    Unblock,
    /// Held credits consumed by a confirmed booking.
    Charge,
    /// Charged credits given back.
    Refund,
    /// Points granted for freeing a confirmed spot.
    PointsAward,
    /// Points spent on a recycled spot.
    PointsSpend,
    /// Spent points given back.
    PointsRefund,
}

/// Append-only record of a wallet movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionEntity {
    /// Stable identifier for the transaction.
    pub id: Uuid,
    /// Wallet owner.
    pub user_id: Uuid,
    /// Booking that caused the movement, if any.
    pub booking_id: Option<Uuid>,
    /// Currency moved.
    pub currency: Currency,
    /// Kind of movement.
    pub kind: TransactionKind,
    /// Positive magnitude of the movement.
    pub amount: i64,
    /// Balance of `currency` after the movement.
    pub balance_after: i64,
    /// Blocked credits after the movement (always 0 for points).
    pub blocked_after: i64,
    /// Human readable description.
    pub concept: String,
    /// When the movement happened.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Set of rows loaded from, or written to, a store in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubRecords {
    /// Users and their wallets.
    pub users: Vec<UserEntity>,
    /// Time slots.
    pub slots: Vec<TimeSlotEntity>,
    /// Bookings.
    pub bookings: Vec<BookingEntity>,
    /// Wallet transactions.
    pub transactions: Vec<TransactionEntity>,
}

impl ClubRecords {
    /// True when no row is carried.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.slots.is_empty()
            && self.bookings.is_empty()
            && self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn slot(starts_at: OffsetDateTime, duration_minutes: u16) -> TimeSlotEntity {
        TimeSlotEntity {
            id: Uuid::new_v4(),
            kind: SlotKind::Class,
            instructor_id: None,
            court_id: None,
            starts_at,
            duration_minutes,
            total_price_cents: 5_000,
            level: None,
            status: SlotStatus::Proposed,
            confirmed_group_size: None,
            recycled_spots: 0,
            created_at: starts_at,
            updated_at: starts_at,
        }
    }

    #[test]
    fn price_is_rounded_up_per_player() {
        assert_eq!(price_per_player(5_000, 1), 5_000);
        assert_eq!(price_per_player(5_000, 3), 1_667);
        assert_eq!(price_per_player(5_000, 4), 1_250);
    }

    #[test]
    fn back_to_back_slots_do_not_overlap() {
        let first = slot(datetime!(2026-10-20 10:00 UTC), 90);
        assert!(!first.overlaps(datetime!(2026-10-20 11:30 UTC), datetime!(2026-10-20 12:30 UTC)));
        assert!(first.overlaps(datetime!(2026-10-20 11:00 UTC), datetime!(2026-10-20 12:00 UTC)));
        assert!(first.overlaps(datetime!(2026-10-20 09:30 UTC), datetime!(2026-10-20 10:30 UTC)));
    }

    #[test]
    fn matches_only_accept_full_groups() {
        assert!(SlotKind::Match.allows_group_size(4));
        assert!(!SlotKind::Match.allows_group_size(2));
        assert!(SlotKind::Class.allows_group_size(1));
        assert!(!SlotKind::Class.allows_group_size(5));
    }
}
