//! Court and instructor allocation, and the completion of a booking race.
//!
//! A race completes inside the draft of the booking that fills a group option, so the slot,
//! every booking of the slot and every wallet involved change together or not at all.

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Court},
    dao::models::{
        BookingStatus, CancelReason, Payment, SlotStatus, TimeSlotEntity, TransactionKind,
    },
    error::ServiceError,
    services::{
        booking_service::cancel_booking_in_draft,
        slot_service::cancel_slot_in_draft,
        wallet_service::{Movement, apply_movement},
    },
    state::{
        events::ClubEvent,
        ledger::Draft,
        lifecycle::{BookingEvent, SlotEvent},
    },
};

/// Whether the instructor already gives a confirmed class overlapping `[start, end)`.
pub fn instructor_busy(
    draft: &Draft<'_>,
    instructor_id: Uuid,
    start: OffsetDateTime,
    end: OffsetDateTime,
    except: Uuid,
) -> bool {
    draft.slots().any(|slot| {
        slot.id != except
            && slot.status == SlotStatus::Confirmed
            && slot.instructor_id == Some(instructor_id)
            && slot.overlaps(start, end)
    })
}

/// Lowest numbered court with no confirmed slot overlapping `[start, end)`.
pub fn free_court<'c>(
    draft: &Draft<'_>,
    courts: &'c [Court],
    start: OffsetDateTime,
    end: OffsetDateTime,
    except: Uuid,
) -> Option<&'c Court> {
    courts.iter().find(|court| {
        !draft.slots().any(|slot| {
            slot.id != except
                && slot.status == SlotStatus::Confirmed
                && slot.court_id == Some(court.id)
                && slot.overlaps(start, end)
        })
    })
}

/// Same calendar day (UTC) as `slot`.
pub fn same_day(slot: &TimeSlotEntity, other: &TimeSlotEntity) -> bool {
    slot.starts_at.date() == other.starts_at.date()
}

/// Confirm `slot_id` for the option of `group_size`, whose pending bookings have just filled it.
pub fn complete_race(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    slot_id: Uuid,
    group_size: u8,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    let slot = draft
        .slot(slot_id)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(format!("time slot `{slot_id}` not found")))?;
    let (start, end) = (slot.starts_at, slot.ends_at());

    if let Some(instructor_id) = slot.instructor_id {
        if instructor_busy(draft, instructor_id, start, end, slot_id) {
            return Err(ServiceError::InvalidState(
                "the instructor already gives a class at that time".into(),
            ));
        }
    }
    let court = free_court(draft, &config.courts, start, end, slot_id)
        .ok_or_else(|| ServiceError::InvalidState("no court is free for this time slot".into()))?;
    let court_id = court.id;

    if let Some(slot) = draft.slot_mut(slot_id) {
        slot.apply(SlotEvent::Confirm, now)?;
        slot.court_id = Some(court_id);
        slot.confirmed_group_size = Some(group_size);
        slot.recycled_spots = 0;
    }
    draft.emit(ClubEvent::SlotConfirmed {
        slot_id,
        court_id,
        group_size,
    });

    let pending: Vec<(Uuid, Uuid, u8)> = draft
        .bookings()
        .filter(|booking| booking.slot_id == slot_id && booking.status == BookingStatus::Pending)
        .map(|booking| (booking.id, booking.user_id, booking.group_size))
        .collect();

    let mut winners = Vec::new();
    for (booking_id, user_id, size) in pending {
        if size != group_size {
            cancel_booking_in_draft(draft, config, booking_id, CancelReason::Displaced, now)?;
            continue;
        }

        let payment = match draft.booking_mut(booking_id) {
            Some(booking) => {
                booking.apply(BookingEvent::Confirm, now)?;
                booking.payment
            }
            None => continue,
        };
        if let Payment::Credits { amount_cents } = payment {
            apply_movement(
                draft,
                Movement {
                    user_id,
                    booking_id: Some(booking_id),
                    kind: TransactionKind::Charge,
                    amount: amount_cents,
                    concept: "booking confirmed".into(),
                },
                now,
            )?;
        }
        winners.push(user_id);
    }

    for user_id in winners {
        cancel_same_day_pending(draft, config, user_id, &slot, now)?;
    }

    if let Some(instructor_id) = slot.instructor_id {
        let clashing: Vec<Uuid> = draft
            .slots()
            .filter(|other| {
                other.id != slot_id
                    && other.status == SlotStatus::Proposed
                    && other.instructor_id == Some(instructor_id)
                    && other.overlaps(start, end)
            })
            .map(|other| other.id)
            .collect();
        for other in clashing {
            cancel_slot_in_draft(draft, config, other, now)?;
        }
    }

    debug!(%slot_id, %court_id, group_size, "booking race completed");
    Ok(())
}

/// Cancel the user's pending bookings on other slots of the same day as `slot`.
pub fn cancel_same_day_pending(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    user_id: Uuid,
    slot: &TimeSlotEntity,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    let conflicting: Vec<Uuid> = draft
        .bookings()
        .filter(|booking| {
            booking.user_id == user_id
                && booking.slot_id != slot.id
                && booking.status == BookingStatus::Pending
                && draft
                    .slot(booking.slot_id)
                    .is_some_and(|other| same_day(slot, other))
        })
        .map(|booking| booking.id)
        .collect();

    for booking_id in conflicting {
        cancel_booking_in_draft(draft, config, booking_id, CancelReason::DayConflict, now)?;
    }
    Ok(())
}
