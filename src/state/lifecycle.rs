//! Explicit lifecycles of bookings and time slots.
//!
//! Every status change goes through [`BookingEntity::apply`] or [`TimeSlotEntity::apply`], so
//! an event that does not fit the current status is rejected instead of silently rewriting
//! the row.

use std::fmt;

use thiserror::Error;
use time::OffsetDateTime;

use crate::dao::models::{BookingEntity, BookingStatus, CancelReason, SlotStatus, TimeSlotEntity};

/// Events a booking reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    /// Its group option won the race (or it took a recycled spot).
    Confirm,
    /// It no longer holds a spot.
    Cancel(CancelReason),
}

/// Events a time slot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// A group option filled and a court was assigned.
    Confirm,
    /// Withdrawn or expired.
    Cancel,
    /// The slot has been played.
    Complete,
}

/// Which row kind rejected an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// A booking.
    Booking,
    /// A time slot.
    Slot,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Booking => f.write_str("booking"),
            Subject::Slot => f.write_str("time slot"),
        }
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {subject} cannot {event} while {from}")]
pub struct InvalidTransition {
    /// Row kind.
    pub subject: Subject,
    /// Status the row was in.
    pub from: String,
    /// Event that cannot be applied.
    pub event: String,
}

fn compute_booking_transition(
    from: BookingStatus,
    event: BookingEvent,
) -> Result<BookingStatus, InvalidTransition> {
    let next = match (from, event) {
        (BookingStatus::Pending, BookingEvent::Confirm) => BookingStatus::Confirmed,
        (BookingStatus::Pending, BookingEvent::Cancel(_)) => BookingStatus::Cancelled,
        (
            BookingStatus::Confirmed,
            BookingEvent::Cancel(CancelReason::Withdrawn | CancelReason::SlotCancelled),
        ) => BookingStatus::Cancelled,
        (from, event) => {
            return Err(InvalidTransition {
                subject: Subject::Booking,
                from: format!("{from:?}").to_lowercase(),
                event: format!("{event:?}").to_lowercase(),
            });
        }
    };
    Ok(next)
}

fn compute_slot_transition(
    from: SlotStatus,
    event: SlotEvent,
) -> Result<SlotStatus, InvalidTransition> {
    let next = match (from, event) {
        (SlotStatus::Proposed, SlotEvent::Confirm) => SlotStatus::Confirmed,
        (SlotStatus::Proposed | SlotStatus::Confirmed, SlotEvent::Cancel) => SlotStatus::Cancelled,
        (SlotStatus::Confirmed, SlotEvent::Complete) => SlotStatus::Completed,
        (from, event) => {
            return Err(InvalidTransition {
                subject: Subject::Slot,
                from: format!("{from:?}").to_lowercase(),
                event: format!("{event:?}").to_lowercase(),
            });
        }
    };
    Ok(next)
}

impl BookingEntity {
    /// Move the booking to the status `event` leads to, stamping `now`.
    pub fn apply(&mut self, event: BookingEvent, now: OffsetDateTime) -> Result<(), InvalidTransition> {
        self.status = compute_booking_transition(self.status, event)?;
        if let BookingEvent::Cancel(reason) = event {
            self.cancel_reason = Some(reason);
        }
        self.updated_at = now;
        Ok(())
    }
}

impl TimeSlotEntity {
    /// Move the slot to the status `event` leads to, stamping `now`.
    pub fn apply(&mut self, event: SlotEvent, now: OffsetDateTime) -> Result<(), InvalidTransition> {
        self.status = compute_slot_transition(self.status, event)?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_booking_confirms_then_withdraws() {
        let confirmed =
            compute_booking_transition(BookingStatus::Pending, BookingEvent::Confirm).unwrap();
        assert_eq!(confirmed, BookingStatus::Confirmed);
        assert_eq!(
            compute_booking_transition(confirmed, BookingEvent::Cancel(CancelReason::Withdrawn))
                .unwrap(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn pending_booking_accepts_any_cancel_reason() {
        for reason in [
            CancelReason::Withdrawn,
            CancelReason::Displaced,
            CancelReason::DayConflict,
            CancelReason::SlotCancelled,
            CancelReason::Expired,
        ] {
            assert_eq!(
                compute_booking_transition(BookingStatus::Pending, BookingEvent::Cancel(reason))
                    .unwrap(),
                BookingStatus::Cancelled
            );
        }
    }

    #[test]
    fn confirmed_booking_cannot_be_displaced() {
        let err = compute_booking_transition(
            BookingStatus::Confirmed,
            BookingEvent::Cancel(CancelReason::Displaced),
        )
        .unwrap_err();
        assert_eq!(err.subject, Subject::Booking);
        assert_eq!(err.from, "confirmed");
    }

    #[test]
    fn cancelled_booking_is_terminal() {
        assert!(
            compute_booking_transition(BookingStatus::Cancelled, BookingEvent::Confirm).is_err()
        );
        assert!(
            compute_booking_transition(
                BookingStatus::Cancelled,
                BookingEvent::Cancel(CancelReason::Withdrawn)
            )
            .is_err()
        );
    }

    #[test]
    fn slot_happy_path_and_terminal_states() {
        let confirmed = compute_slot_transition(SlotStatus::Proposed, SlotEvent::Confirm).unwrap();
        assert_eq!(
            compute_slot_transition(confirmed, SlotEvent::Complete).unwrap(),
            SlotStatus::Completed
        );
        assert!(compute_slot_transition(SlotStatus::Completed, SlotEvent::Cancel).is_err());
        assert!(compute_slot_transition(SlotStatus::Cancelled, SlotEvent::Confirm).is_err());
        assert!(compute_slot_transition(SlotStatus::Proposed, SlotEvent::Complete).is_err());
    }

    #[test]
    fn invalid_transition_message_names_the_row() {
        let err = compute_slot_transition(SlotStatus::Cancelled, SlotEvent::Confirm).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition: time slot cannot confirm while cancelled"
        );
    }
}
