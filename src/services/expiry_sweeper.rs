use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::models::{BookingStatus, CancelReason, SlotStatus},
    error::ServiceError,
    services::booking_service::cancel_booking_in_draft,
    state::{
        SharedState, events::ClubEvent, ledger::Draft, lifecycle::SlotEvent,
        transitions::run_mutation_with_broadcast,
    },
};

/// What a sweep changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Proposals that started without a full group.
    pub expired: usize,
    /// Confirmed slots that have been played.
    pub completed: usize,
}

/// Periodically expire stale proposals and complete played slots.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.is_degraded().await {
            debug!("skipping slot sweep while degraded");
            continue;
        }

        match sweep(&state, OffsetDateTime::now_utc()).await {
            Ok(report) if report == SweepReport::default() => {}
            Ok(report) => info!(
                expired = report.expired,
                completed = report.completed,
                "slot sweep applied"
            ),
            Err(err) => warn!(error = %err, "slot sweep failed"),
        }
    }
}

/// Run a single sweep as of `now`.
pub async fn sweep(state: &SharedState, now: OffsetDateTime) -> Result<SweepReport, ServiceError> {
    let config = state.config();
    {
        let ledger = state.ledger().await;
        let due = ledger.slots().any(|slot| {
            (slot.status == SlotStatus::Proposed && slot.starts_at <= now)
                || (slot.status == SlotStatus::Confirmed && slot.ends_at() <= now)
        });
        if !due {
            return Ok(SweepReport::default());
        }
    }

    run_mutation_with_broadcast(state, |draft| sweep_in_draft(draft, config, now)).await
}

/// Expire proposals that reached their start and complete confirmed slots that ended.
pub fn sweep_in_draft(
    draft: &mut Draft<'_>,
    config: &AppConfig,
    now: OffsetDateTime,
) -> Result<SweepReport, ServiceError> {
    let stale: Vec<Uuid> = draft
        .slots()
        .filter(|slot| slot.status == SlotStatus::Proposed && slot.starts_at <= now)
        .map(|slot| slot.id)
        .collect();
    let played: Vec<Uuid> = draft
        .slots()
        .filter(|slot| slot.status == SlotStatus::Confirmed && slot.ends_at() <= now)
        .map(|slot| slot.id)
        .collect();

    for &slot_id in &stale {
        if let Some(slot) = draft.slot_mut(slot_id) {
            slot.apply(SlotEvent::Cancel, now)?;
        }
        draft.emit(ClubEvent::SlotCancelled { slot_id });

        let pending: Vec<Uuid> = draft
            .bookings()
            .filter(|booking| {
                booking.slot_id == slot_id && booking.status == BookingStatus::Pending
            })
            .map(|booking| booking.id)
            .collect();
        for booking_id in pending {
            cancel_booking_in_draft(draft, config, booking_id, CancelReason::Expired, now)?;
        }
    }

    for &slot_id in &played {
        if let Some(slot) = draft.slot_mut(slot_id) {
            slot.apply(SlotEvent::Complete, now)?;
            slot.recycled_spots = 0;
        }
        draft.emit(ClubEvent::SlotCompleted { slot_id });
    }

    Ok(SweepReport {
        expired: stale.len(),
        completed: played.len(),
    })
}
