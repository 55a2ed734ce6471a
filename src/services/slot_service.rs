//! Class and match proposals, slot cancellation and calendar queries.

use time::{Date, Duration, OffsetDateTime, UtcOffset};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Court, Instructor},
    dao::models::{CancelReason, SlotKind, SlotStatus, TimeSlotEntity},
    dto::timeslot::{
        CalendarQuery, GenerateProposalsRequest, ProposeClassRequest, ProposeMatchRequest,
        SlotSummary,
    },
    error::ServiceError,
    services::booking_service::cancel_booking_in_draft,
    state::{
        SharedState, events::ClubEvent, ledger::Draft, lifecycle::SlotEvent,
        transitions::run_mutation_with_broadcast,
    },
};

/// Widest window the calendar serves in one request.
const MAX_CALENDAR_SPAN: Duration = Duration::days(62);

/// Publish a class proposal for an instructor.
pub async fn propose_class(
    state: &SharedState,
    request: ProposeClassRequest,
) -> Result<SlotSummary, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let config = state.config();
    let instructor = require_instructor(config, request.instructor_id)?;
    let starts_at = request.starts_at.to_offset(UtcOffset::UTC);

    validate_start(config, starts_at, request.duration_minutes, now)?;
    if !within_hours(
        starts_at,
        request.duration_minutes,
        instructor.available_from_hour,
        instructor.available_to_hour,
    ) {
        return Err(ServiceError::InvalidInput(format!(
            "{} does not teach at that time",
            instructor.name
        )));
    }

    let summary = run_mutation_with_broadcast(state, |draft| {
        let conflict =
            instructor_conflict(draft, instructor.id, starts_at, request.duration_minutes);
        if let Some(reason) = conflict {
            return Err(ServiceError::InvalidState(reason.into()));
        }
        let slot = insert_proposal(
            draft,
            SlotKind::Class,
            Some(instructor),
            starts_at,
            request.duration_minutes,
            class_price(config, instructor, request.duration_minutes),
            now,
        );
        Ok(SlotSummary::build(&slot, draft.bookings(), config.cents_per_point))
    })
    .await?;

    info!(
        slot_id = %summary.id,
        instructor = %instructor.name,
        starts_at = %summary.starts_at,
        "class proposed"
    );
    Ok(summary)
}

/// Open a match to four players.
pub async fn propose_match(
    state: &SharedState,
    request: ProposeMatchRequest,
) -> Result<SlotSummary, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let config = state.config();
    let starts_at = request.starts_at.to_offset(UtcOffset::UTC);
    validate_start(config, starts_at, request.duration_minutes, now)?;

    let summary = run_mutation_with_broadcast(state, |draft| {
        let slot = insert_proposal(
            draft,
            SlotKind::Match,
            None,
            starts_at,
            request.duration_minutes,
            match_price(config, request.duration_minutes),
            now,
        );
        Ok(SlotSummary::build(&slot, draft.bookings(), config.cents_per_point))
    })
    .await?;

    info!(slot_id = %summary.id, starts_at = %summary.starts_at, "match proposed");
    Ok(summary)
}

/// Publish a proposal at every free start of an instructor's day.
pub async fn generate_proposals(
    state: &SharedState,
    request: GenerateProposalsRequest,
) -> Result<Vec<SlotSummary>, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let config = state.config();
    let instructor = require_instructor(config, request.instructor_id)?;

    let created = run_mutation_with_broadcast(state, |draft| {
        let slots = generate_in_draft(
            draft,
            config,
            instructor,
            request.date,
            request.duration_minutes,
            now,
        );
        Ok(slots
            .iter()
            .map(|slot| SlotSummary::build(slot, draft.bookings(), config.cents_per_point))
            .collect::<Vec<_>>())
    })
    .await?;

    info!(
        instructor = %instructor.name,
        date = %request.date,
        created = created.len(),
        "class proposals generated"
    );
    Ok(created)
}

/// Propose every step of `date` inside the instructor's hours and the opening hours that
/// is still ahead of `now` and free for the instructor.
pub fn generate_in_draft(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    instructor: &Instructor,
    date: Date,
    duration_minutes: u16,
    now: OffsetDateTime,
) -> Vec<TimeSlotEntity> {
    let from = u16::from(config.open_hour.max(instructor.available_from_hour)) * 60;
    let to = u16::from(config.close_hour.min(instructor.available_to_hour)) * 60;
    let midnight = date.midnight().assume_utc();
    let candidates: Vec<OffsetDateTime> = (from..)
        .step_by(usize::from(config.slot_step_minutes))
        .take_while(|start| start + duration_minutes <= to)
        .map(|start| midnight + Duration::minutes(i64::from(start)))
        .filter(|starts_at| *starts_at > now)
        .collect();

    let mut created = Vec::new();
    for starts_at in candidates {
        if instructor_conflict(draft, instructor.id, starts_at, duration_minutes).is_some() {
            continue;
        }
        created.push(insert_proposal(
            draft,
            SlotKind::Class,
            Some(instructor),
            starts_at,
            duration_minutes,
            class_price(config, instructor, duration_minutes),
            now,
        ));
    }
    created
}

/// Cancel a slot that has not started, refunding everyone booked on it.
pub async fn cancel_slot(state: &SharedState, slot_id: Uuid) -> Result<SlotSummary, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let config = state.config();

    let summary = run_mutation_with_broadcast(state, |draft| {
        let slot = draft
            .slot(slot_id)
            .ok_or_else(|| ServiceError::NotFound(format!("time slot `{slot_id}` not found")))?;
        if slot.is_active() && slot.starts_at <= now {
            return Err(ServiceError::InvalidState(
                "the time slot has already started".into(),
            ));
        }

        cancel_slot_in_draft(draft, config, slot_id, now)?;
        let slot = draft
            .slot(slot_id)
            .ok_or_else(|| ServiceError::NotFound(format!("time slot `{slot_id}` not found")))?;
        Ok(SlotSummary::build(slot, draft.bookings(), config.cents_per_point))
    })
    .await?;

    info!(%slot_id, "time slot cancelled");
    Ok(summary)
}

/// Cancel a proposed or confirmed slot and every active booking on it.
pub fn cancel_slot_in_draft(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    slot_id: Uuid,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    let slot = draft
        .slot_mut(slot_id)
        .ok_or_else(|| ServiceError::NotFound(format!("time slot `{slot_id}` not found")))?;
    slot.apply(SlotEvent::Cancel, now)?;
    slot.recycled_spots = 0;
    draft.emit(ClubEvent::SlotCancelled { slot_id });

    let active: Vec<Uuid> = draft
        .bookings()
        .filter(|booking| booking.slot_id == slot_id && booking.is_active())
        .map(|booking| booking.id)
        .collect();
    for booking_id in active {
        cancel_booking_in_draft(draft, config, booking_id, CancelReason::SlotCancelled, now)?;
    }
    Ok(())
}

/// Fetch a single slot.
pub async fn get_slot(state: &SharedState, slot_id: Uuid) -> Result<SlotSummary, ServiceError> {
    let ledger = state.ledger().await;
    let slot = ledger
        .slot(slot_id)
        .ok_or_else(|| ServiceError::NotFound(format!("time slot `{slot_id}` not found")))?;
    Ok(SlotSummary::build(
        slot,
        ledger.bookings(),
        state.config().cents_per_point,
    ))
}

/// Slots starting within `[from, to)`, in start order.
pub async fn calendar(
    state: &SharedState,
    query: CalendarQuery,
) -> Result<Vec<SlotSummary>, ServiceError> {
    if query.from >= query.to {
        return Err(ServiceError::InvalidInput(
            "`from` must be earlier than `to`".into(),
        ));
    }
    if query.to - query.from > MAX_CALENDAR_SPAN {
        return Err(ServiceError::InvalidInput(format!(
            "the calendar spans at most {} days",
            MAX_CALENDAR_SPAN.whole_days()
        )));
    }

    let ledger = state.ledger().await;
    let mut slots: Vec<_> = ledger
        .slots()
        .filter(|slot| slot.starts_at >= query.from && slot.starts_at < query.to)
        .collect();
    slots.sort_by_key(|slot| slot.starts_at);

    let cents_per_point = state.config().cents_per_point;
    Ok(slots
        .into_iter()
        .map(|slot| SlotSummary::build(slot, ledger.bookings(), cents_per_point))
        .collect())
}

/// Courts of the club.
pub fn courts(state: &SharedState) -> Vec<Court> {
    state.config().courts.clone()
}

/// Instructor roster.
pub fn instructors(state: &SharedState) -> Vec<Instructor> {
    state.config().instructors.clone()
}

/// Class price: court and instructor time for the whole slot.
pub fn class_price(config: &AppConfig, instructor: &Instructor, duration_minutes: u16) -> i64 {
    (config.court_rate_cents_per_hour + instructor.rate_cents_per_hour)
        * i64::from(duration_minutes)
        / 60
}

/// Match price: court time only.
pub fn match_price(config: &AppConfig, duration_minutes: u16) -> i64 {
    config.court_rate_cents_per_hour * i64::from(duration_minutes) / 60
}

fn require_instructor(config: &AppConfig, id: Uuid) -> Result<&Instructor, ServiceError> {
    config
        .instructor(id)
        .ok_or_else(|| ServiceError::NotFound(format!("instructor `{id}` not found")))
}

/// Checks shared by every proposal: future start, step alignment and opening hours.
fn validate_start(
    config: &AppConfig,
    starts_at: OffsetDateTime,
    duration_minutes: u16,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    if starts_at <= now {
        return Err(ServiceError::InvalidInput(
            "time slots must start in the future".into(),
        ));
    }
    let aligned = starts_at.second() == 0
        && starts_at.nanosecond() == 0
        && u16::from(starts_at.minute()) % config.slot_step_minutes == 0;
    if !aligned {
        return Err(ServiceError::InvalidInput(format!(
            "time slots start on {}-minute boundaries",
            config.slot_step_minutes
        )));
    }
    if !within_hours(starts_at, duration_minutes, config.open_hour, config.close_hour) {
        return Err(ServiceError::InvalidInput(format!(
            "the club is open from {}:00 to {}:00",
            config.open_hour, config.close_hour
        )));
    }
    Ok(())
}

/// Whether `[starts_at, starts_at + duration)` fits between two hours of the same day.
fn within_hours(
    starts_at: OffsetDateTime,
    duration_minutes: u16,
    from_hour: u8,
    to_hour: u8,
) -> bool {
    let start = u16::from(starts_at.hour()) * 60 + u16::from(starts_at.minute());
    start >= u16::from(from_hour) * 60 && start + duration_minutes <= u16::from(to_hour) * 60
}

/// Why the instructor cannot take a new class at `starts_at`, if anything prevents it.
fn instructor_conflict(
    draft: &Draft<'_>,
    instructor_id: Uuid,
    starts_at: OffsetDateTime,
    duration_minutes: u16,
) -> Option<&'static str> {
    let ends_at = starts_at + Duration::minutes(i64::from(duration_minutes));
    let mut slots = draft
        .slots()
        .filter(|slot| slot.instructor_id == Some(instructor_id));

    slots.find_map(|slot| {
        if slot.status != SlotStatus::Cancelled && slot.starts_at == starts_at {
            Some("the instructor already has a time slot starting then")
        } else if slot.status == SlotStatus::Confirmed && slot.overlaps(starts_at, ends_at) {
            Some("the instructor already gives a class at that time")
        } else {
            None
        }
    })
}

fn insert_proposal(
    draft: &mut Draft<'_>,
    kind: SlotKind,
    instructor: Option<&Instructor>,
    starts_at: OffsetDateTime,
    duration_minutes: u16,
    total_price_cents: i64,
    now: OffsetDateTime,
) -> TimeSlotEntity {
    let slot = TimeSlotEntity {
        id: Uuid::new_v4(),
        kind,
        instructor_id: instructor.map(|instructor| instructor.id),
        court_id: None,
        starts_at,
        duration_minutes,
        total_price_cents,
        level: None,
        status: SlotStatus::Proposed,
        confirmed_group_size: None,
        recycled_spots: 0,
        created_at: now,
        updated_at: now,
    };
    draft.insert_slot(slot.clone());
    draft.emit(ClubEvent::SlotProposed { slot_id: slot.id });
    slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{BookingEntity, Level, Payment},
        services::test_support::{self, DAY, NOW, alex, class_at, confirmed_booking, user},
        state::ledger::Ledger,
    };
    use time::macros::datetime;

    #[test]
    fn prices_follow_the_hourly_rates() {
        let config = test_support::config();
        let alex = &config.instructors[0];
        assert_eq!(class_price(&config, alex, 60), 4_000);
        assert_eq!(class_price(&config, alex, 90), 6_000);
        assert_eq!(match_price(&config, 90), 3_000);
    }

    #[test]
    fn starts_must_be_aligned_and_inside_opening_hours() {
        let config = test_support::config();
        assert!(validate_start(&config, datetime!(2030-01-07 10:30 UTC), 90, NOW).is_ok());
        assert!(validate_start(&config, datetime!(2030-01-07 10:15 UTC), 60, NOW).is_err());
        assert!(validate_start(&config, datetime!(2030-01-07 07:00 UTC), 60, NOW).is_err());
        assert!(validate_start(&config, datetime!(2030-01-07 21:00 UTC), 90, NOW).is_err());
        assert!(validate_start(&config, datetime!(2029-12-31 10:00 UTC), 60, NOW).is_err());
    }

    #[test]
    fn instructor_cannot_double_book_a_start() {
        let config = test_support::config();
        let existing = class_at(alex(&config), 10, 0);
        let ledger = Ledger::from_records(test_support::records(&[], &[&existing], &[]));
        let draft = Draft::new(&ledger);

        assert!(instructor_conflict(&draft, alex(&config), existing.starts_at, 60).is_some());
        let half_past = existing.starts_at + Duration::minutes(30);
        assert!(instructor_conflict(&draft, alex(&config), half_past, 60).is_none());
    }

    #[test]
    fn confirmed_classes_block_overlapping_proposals() {
        let config = test_support::config();
        let mut existing = class_at(alex(&config), 10, 0);
        existing.status = SlotStatus::Confirmed;
        let ledger = Ledger::from_records(test_support::records(&[], &[&existing], &[]));
        let draft = Draft::new(&ledger);

        let clash = DAY + Duration::minutes(10 * 60 + 30);
        assert!(instructor_conflict(&draft, alex(&config), clash, 60).is_some());
        let after = DAY + Duration::hours(11);
        assert!(instructor_conflict(&draft, alex(&config), after, 60).is_none());
    }

    fn starts(slots: &[TimeSlotEntity]) -> Vec<(u8, u8)> {
        slots
            .iter()
            .map(|slot| (slot.starts_at.hour(), slot.starts_at.minute()))
            .collect()
    }

    #[test]
    fn generation_fills_the_instructor_day_once() {
        let config = test_support::config();
        let alex = &config.instructors[0];
        let existing = class_at(alex.id, 10, 0);
        let ledger = Ledger::from_records(test_support::records(&[], &[&existing], &[]));
        let mut draft = Draft::new(&ledger);

        let created = generate_in_draft(&mut draft, &config, alex, DAY.date(), 90, NOW);
        assert_eq!(
            starts(&created),
            vec![(9, 0), (9, 30), (10, 30), (11, 0), (11, 30), (12, 0), (12, 30)]
        );
        assert!(created.iter().all(|slot| slot.total_price_cents == 6_000));
        assert!(created.iter().all(|slot| slot.status == SlotStatus::Proposed));

        let again = generate_in_draft(&mut draft, &config, alex, DAY.date(), 90, NOW);
        assert!(again.is_empty());
    }

    #[test]
    fn generation_skips_past_starts_and_confirmed_classes() {
        let config = test_support::config();
        let alex = &config.instructors[0];
        let mut confirmed = class_at(alex.id, 12, 0);
        confirmed.status = SlotStatus::Confirmed;
        let ledger = Ledger::from_records(test_support::records(&[], &[&confirmed], &[]));
        let mut draft = Draft::new(&ledger);

        let now = datetime!(2030-01-07 09:15 UTC);
        let created = generate_in_draft(&mut draft, &config, alex, DAY.date(), 90, now);
        assert_eq!(starts(&created), vec![(9, 30), (10, 0), (10, 30)]);
    }

    #[test]
    fn generation_stays_inside_opening_hours() {
        let mut config = test_support::config();
        config.open_hour = 10;
        config.close_hour = 12;
        let alex = config.instructors[0].clone();
        let ledger = Ledger::from_records(test_support::records(&[], &[], &[]));
        let mut draft = Draft::new(&ledger);

        let created = generate_in_draft(&mut draft, &config, &alex, DAY.date(), 60, NOW);
        assert_eq!(starts(&created), vec![(10, 0), (10, 30), (11, 0)]);
    }

    #[test]
    fn cancelling_a_slot_refunds_every_player() {
        let config = test_support::config();
        let mut slot = class_at(alex(&config), 10, 0);
        slot.status = SlotStatus::Confirmed;
        slot.confirmed_group_size = Some(2);
        slot.court_id = Some(config.courts[0].id);
        let ana = user("ana", Level::Beginner, 3_000);
        let mut ben = user("ben", Level::Beginner, 0);
        ben.points = 5;
        let paid = confirmed_booking(&slot, &ana, 2_000);
        let recycled = BookingEntity {
            payment: Payment::Points { points: 20 },
            recycled: true,
            ..confirmed_booking(&slot, &ben, 0)
        };
        let ledger = Ledger::from_records(test_support::records(
            &[&ana, &ben],
            &[&slot],
            &[&paid, &recycled],
        ));
        let mut draft = Draft::new(&ledger);

        cancel_slot_in_draft(&mut draft, &config, slot.id, NOW).unwrap();

        assert_eq!(draft.slot(slot.id).unwrap().status, SlotStatus::Cancelled);
        assert_eq!(draft.user(ana.id).unwrap().credits_cents, 5_000);
        assert_eq!(draft.user(ben.id).unwrap().points, 25);
        let paid = draft.booking(paid.id).unwrap();
        assert_eq!(paid.cancel_reason, Some(CancelReason::SlotCancelled));
        assert_eq!(draft.slot(slot.id).unwrap().recycled_spots, 0);
    }

    #[test]
    fn completed_slots_cannot_be_cancelled() {
        let config = test_support::config();
        let mut slot = class_at(alex(&config), 10, 0);
        slot.status = SlotStatus::Completed;
        let ledger = Ledger::from_records(test_support::records(&[], &[&slot], &[]));
        let mut draft = Draft::new(&ledger);

        let err = cancel_slot_in_draft(&mut draft, &config, slot.id, NOW).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
