//! Booking race, recycled spots and booking cancellation.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::models::{
        BookingEntity, BookingStatus, CancelReason, Payment, SlotKind, SlotStatus,
        TimeSlotEntity, TransactionKind, UserEntity,
    },
    dto::{
        booking::{BookRequest, BookingOutcome, BookingSummary, CancelBookingRequest, PaymentMethod},
        timeslot::{SlotSummary, points_for},
    },
    error::ServiceError,
    services::{
        allocation::{cancel_same_day_pending, complete_race, same_day},
        wallet_service::{Movement, apply_movement, require_user},
    },
    state::{
        SharedState, events::ClubEvent, ledger::Draft, lifecycle::BookingEvent,
        transitions::run_mutation_with_broadcast,
    },
};

/// Book a slot of the given kind: join the race on a proposal or take a recycled spot.
pub async fn book(
    state: &SharedState,
    request: BookRequest,
    kind: SlotKind,
) -> Result<BookingOutcome, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let config = state.config();

    let outcome = run_mutation_with_broadcast(state, |draft| {
        let booking_id = book_in_draft(draft, config, &request, kind, now)?;
        outcome(draft, config, booking_id)
    })
    .await?;

    info!(
        booking_id = %outcome.booking.id,
        slot_id = %outcome.slot.id,
        user_id = %outcome.booking.user_id,
        status = ?outcome.booking.status,
        slot_status = ?outcome.slot.status,
        "slot booked"
    );
    Ok(outcome)
}

/// Cancel a booking on behalf of its owner.
pub async fn cancel_booking(
    state: &SharedState,
    booking_id: Uuid,
    request: CancelBookingRequest,
) -> Result<BookingOutcome, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let config = state.config();

    let outcome = run_mutation_with_broadcast(state, |draft| {
        let booking = draft
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("booking `{booking_id}` not found")))?;
        if booking.user_id != request.user_id {
            return Err(ServiceError::Forbidden(
                "only the owner may cancel a booking".into(),
            ));
        }
        if booking.status == BookingStatus::Confirmed {
            let slot = require_slot(draft, booking.slot_id)?;
            if slot.starts_at <= now {
                return Err(ServiceError::InvalidState(
                    "the time slot has already started".into(),
                ));
            }
        }

        cancel_booking_in_draft(draft, config, booking_id, CancelReason::Withdrawn, now)?;
        outcome(draft, config, booking_id)
    })
    .await?;

    info!(%booking_id, slot_id = %outcome.slot.id, "booking withdrawn");
    Ok(outcome)
}

/// Bookings of a user, newest first.
pub async fn user_bookings(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<BookingSummary>, ServiceError> {
    let ledger = state.ledger().await;
    if ledger.user(user_id).is_none() {
        return Err(ServiceError::NotFound(format!("user `{user_id}` not found")));
    }

    Ok(ledger
        .bookings()
        .rev()
        .filter(|booking| booking.user_id == user_id)
        .cloned()
        .map(Into::into)
        .collect())
}

/// Validate and record a booking, completing the race when it fills its group option.
pub fn book_in_draft(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    request: &BookRequest,
    kind: SlotKind,
    now: OffsetDateTime,
) -> Result<Uuid, ServiceError> {
    let slot = require_slot(draft, request.slot_id)?.clone();
    if slot.kind != kind {
        return Err(ServiceError::InvalidInput(format!(
            "time slot `{}` is not a {}",
            slot.id,
            kind_name(kind)
        )));
    }
    let user = require_user(draft, request.user_id)?.clone();

    if slot.starts_at <= now {
        return Err(ServiceError::InvalidState(
            "the time slot has already started".into(),
        ));
    }
    if draft.bookings().any(|booking| {
        booking.slot_id == slot.id && booking.user_id == user.id && booking.is_active()
    }) {
        return Err(ServiceError::InvalidState(
            "the user already holds a booking on this time slot".into(),
        ));
    }
    if has_confirmed_booking_that_day(draft, user.id, &slot) {
        return Err(ServiceError::InvalidState(
            "the user already has a confirmed booking that day".into(),
        ));
    }
    if let Some(level) = slot.level {
        if level != user.level {
            return Err(ServiceError::InvalidState(format!(
                "this time slot is reserved to {level:?} players"
            )
            .to_lowercase()));
        }
    }

    match slot.status {
        SlotStatus::Proposed => join_race(draft, config, &slot, &user, request, now),
        SlotStatus::Confirmed => take_recycled_spot(draft, config, &slot, &user, request.payment, now),
        status => Err(ServiceError::InvalidState(
            format!("the time slot is {status:?}").to_lowercase(),
        )),
    }
}

fn join_race(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    slot: &TimeSlotEntity,
    user: &UserEntity,
    request: &BookRequest,
    now: OffsetDateTime,
) -> Result<Uuid, ServiceError> {
    if request.payment != PaymentMethod::Credits {
        return Err(ServiceError::InvalidInput(
            "proposals can only be booked with credits".into(),
        ));
    }
    let group_size = match (request.group_size, slot.kind) {
        (Some(size), _) => size,
        (None, SlotKind::Match) => 4,
        (None, SlotKind::Class) => {
            return Err(ServiceError::InvalidInput(
                "group_size is required to book a class".into(),
            ));
        }
    };
    if !slot.kind.allows_group_size(group_size) {
        return Err(ServiceError::InvalidInput(format!(
            "a {} cannot be booked for a group of {group_size}",
            kind_name(slot.kind)
        )));
    }

    let price = slot.price_per_player(group_size);
    let booking_id = Uuid::new_v4();
    apply_movement(
        draft,
        Movement {
            user_id: user.id,
            booking_id: Some(booking_id),
            kind: TransactionKind::Block,
            amount: price,
            concept: format!("hold for a group of {group_size}"),
        },
        now,
    )?;

    if slot.level.is_none() {
        if let Some(slot) = draft.slot_mut(slot.id) {
            slot.level = Some(user.level);
            slot.updated_at = now;
        }
    }

    draft.insert_booking(BookingEntity {
        id: booking_id,
        slot_id: slot.id,
        user_id: user.id,
        group_size,
        status: BookingStatus::Pending,
        cancel_reason: None,
        payment: Payment::Credits {
            amount_cents: price,
        },
        recycled: false,
        created_at: now,
        updated_at: now,
    });
    draft.emit(ClubEvent::BookingCreated {
        booking_id,
        slot_id: slot.id,
        group_size,
    });

    let racing = draft
        .bookings()
        .filter(|booking| {
            booking.slot_id == slot.id
                && booking.status == BookingStatus::Pending
                && booking.group_size == group_size
        })
        .count();
    if racing >= usize::from(group_size) {
        complete_race(draft, config, slot.id, group_size, now)?;
    }

    Ok(booking_id)
}

fn take_recycled_spot(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    slot: &TimeSlotEntity,
    user: &UserEntity,
    payment: PaymentMethod,
    now: OffsetDateTime,
) -> Result<Uuid, ServiceError> {
    if payment != PaymentMethod::Points {
        return Err(ServiceError::InvalidInput(
            "confirmed time slots only sell recycled spots, paid with points".into(),
        ));
    }
    if slot.recycled_spots == 0 {
        return Err(ServiceError::InvalidState(
            "no recycled spot is available on this time slot".into(),
        ));
    }
    let group_size = slot.confirmed_group_size.ok_or_else(|| {
        ServiceError::InvalidState("confirmed time slot has no group size".into())
    })?;

    let points = points_for(slot.price_per_player(group_size), config.cents_per_point);
    let booking_id = Uuid::new_v4();
    apply_movement(
        draft,
        Movement {
            user_id: user.id,
            booking_id: Some(booking_id),
            kind: TransactionKind::PointsSpend,
            amount: points,
            concept: "recycled spot".into(),
        },
        now,
    )?;

    let recycled_spots = match draft.slot_mut(slot.id) {
        Some(slot) => {
            slot.recycled_spots -= 1;
            slot.updated_at = now;
            slot.recycled_spots
        }
        None => 0,
    };

    draft.insert_booking(BookingEntity {
        id: booking_id,
        slot_id: slot.id,
        user_id: user.id,
        group_size,
        status: BookingStatus::Confirmed,
        cancel_reason: None,
        payment: Payment::Points { points },
        recycled: true,
        created_at: now,
        updated_at: now,
    });
    draft.emit(ClubEvent::BookingCreated {
        booking_id,
        slot_id: slot.id,
        group_size,
    });
    draft.emit(ClubEvent::SpotRecycled {
        slot_id: slot.id,
        recycled_spots,
    });

    cancel_same_day_pending(draft, config, user.id, slot, now)?;
    Ok(booking_id)
}

/// Cancel a booking for `reason`, settling its payment.
///
/// Pending holds are released. Confirmed bookings are refunded when their slot is cancelled;
/// when the player withdraws, the spot is recycled and credit-paid bookings earn points.
pub fn cancel_booking_in_draft(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    booking_id: Uuid,
    reason: CancelReason,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    let booking = draft
        .booking_mut(booking_id)
        .ok_or_else(|| ServiceError::NotFound(format!("booking `{booking_id}` not found")))?;
    let was = booking.status;
    booking.apply(BookingEvent::Cancel(reason), now)?;
    let (slot_id, user_id, payment) = (booking.slot_id, booking.user_id, booking.payment);
    draft.emit(ClubEvent::BookingCancelled {
        booking_id,
        slot_id,
        reason,
    });

    let settlement = match (was, payment, reason) {
        (BookingStatus::Pending, Payment::Credits { amount_cents }, _) => {
            Some((TransactionKind::Unblock, amount_cents, "hold released"))
        }
        (BookingStatus::Pending, Payment::Points { points }, _) => {
            Some((TransactionKind::PointsRefund, points, "points returned"))
        }
        (_, Payment::Credits { amount_cents }, CancelReason::SlotCancelled) => {
            Some((TransactionKind::Refund, amount_cents, "time slot cancelled"))
        }
        (_, Payment::Points { points }, CancelReason::SlotCancelled) => {
            Some((TransactionKind::PointsRefund, points, "time slot cancelled"))
        }
        (_, Payment::Credits { amount_cents }, _) => Some((
            TransactionKind::PointsAward,
            amount_cents / config.cents_per_point.max(1),
            "spot freed",
        )),
        (_, Payment::Points { .. }, _) => None,
    };
    if let Some((kind, amount, concept)) = settlement {
        apply_movement(
            draft,
            Movement {
                user_id,
                booking_id: Some(booking_id),
                kind,
                amount,
                concept: concept.into(),
            },
            now,
        )?;
    }

    match was {
        BookingStatus::Confirmed if reason != CancelReason::SlotCancelled => {
            recycle_spot(draft, slot_id, now)
        }
        BookingStatus::Pending => reset_level_when_unbooked(draft, slot_id, now),
        _ => {}
    }
    Ok(())
}

fn recycle_spot(draft: &mut Draft<'_>, slot_id: Uuid, now: OffsetDateTime) {
    let Some(slot) = draft.slot_mut(slot_id) else {
        return;
    };
    slot.recycled_spots = slot.recycled_spots.saturating_add(1);
    slot.updated_at = now;
    let recycled_spots = slot.recycled_spots;
    draft.emit(ClubEvent::SpotRecycled {
        slot_id,
        recycled_spots,
    });
}

/// A proposal nobody races for any more accepts players of any level again.
fn reset_level_when_unbooked(draft: &mut Draft<'_>, slot_id: Uuid, now: OffsetDateTime) {
    let locked = draft
        .slot(slot_id)
        .is_some_and(|slot| slot.status == SlotStatus::Proposed && slot.level.is_some());
    let racing = draft
        .bookings()
        .any(|booking| booking.slot_id == slot_id && booking.status == BookingStatus::Pending);
    if !locked || racing {
        return;
    }

    if let Some(slot) = draft.slot_mut(slot_id) {
        slot.level = None;
        slot.updated_at = now;
    }
}

fn has_confirmed_booking_that_day(draft: &Draft<'_>, user_id: Uuid, slot: &TimeSlotEntity) -> bool {
    draft.bookings().any(|booking| {
        booking.user_id == user_id
            && booking.status == BookingStatus::Confirmed
            && booking.slot_id != slot.id
            && draft
                .slot(booking.slot_id)
                .is_some_and(|other| same_day(slot, other))
    })
}

fn require_slot<'d>(draft: &'d Draft<'_>, id: Uuid) -> Result<&'d TimeSlotEntity, ServiceError> {
    draft
        .slot(id)
        .ok_or_else(|| ServiceError::NotFound(format!("time slot `{id}` not found")))
}

fn outcome(
    draft: &Draft<'_>,
    config: &AppConfig,
    booking_id: Uuid,
) -> Result<BookingOutcome, ServiceError> {
    let booking = draft
        .booking(booking_id)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(format!("booking `{booking_id}` not found")))?;
    let slot = require_slot(draft, booking.slot_id)?;
    Ok(BookingOutcome {
        slot: SlotSummary::build(slot, draft.bookings(), config.cents_per_point),
        booking: booking.into(),
    })
}

fn kind_name(kind: SlotKind) -> &'static str {
    match kind {
        SlotKind::Class => "class",
        SlotKind::Match => "match",
    }
}
