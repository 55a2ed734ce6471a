use uuid::Uuid;

use crate::dao::models::CancelReason;

/// Domain events raised by a mutation, broadcast once it has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClubEvent {
    /// A new proposal (class or match) was published.
    SlotProposed {
        /// Slot identifier.
        slot_id: Uuid,
    },
    /// A group option won the race.
    SlotConfirmed {
        /// Slot identifier.
        slot_id: Uuid,
        /// Court assigned to the slot.
        court_id: Uuid,
        /// Winning group size.
        group_size: u8,
    },
    /// A slot was cancelled or expired.
    SlotCancelled {
        /// Slot identifier.
        slot_id: Uuid,
    },
    /// A confirmed slot was played.
    SlotCompleted {
        /// Slot identifier.
        slot_id: Uuid,
    },
    /// A player booked a slot.
    BookingCreated {
        /// Booking identifier.
        booking_id: Uuid,
        /// Slot identifier.
        slot_id: Uuid,
        /// Group option raced for.
        group_size: u8,
    },
    /// A booking was cancelled.
    BookingCancelled {
        /// Booking identifier.
        booking_id: Uuid,
        /// Slot identifier.
        slot_id: Uuid,
        /// Why it was cancelled.
        reason: CancelReason,
    },
    /// The number of recycled spots of a confirmed slot changed.
    SpotRecycled {
        /// Slot identifier.
        slot_id: Uuid,
        /// Spots now available to points bookings.
        recycled_spots: u8,
    },
}

impl ClubEvent {
    /// Slot the event is about.
    pub fn slot_id(&self) -> Uuid {
        match *self {
            ClubEvent::SlotProposed { slot_id }
            | ClubEvent::SlotConfirmed { slot_id, .. }
            | ClubEvent::SlotCancelled { slot_id }
            | ClubEvent::SlotCompleted { slot_id }
            | ClubEvent::BookingCreated { slot_id, .. }
            | ClubEvent::BookingCancelled { slot_id, .. }
            | ClubEvent::SpotRecycled { slot_id, .. } => slot_id,
        }
    }
}
