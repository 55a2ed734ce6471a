use std::{
    collections::{HashMap, HashSet},
    error::Error,
};

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{BookingStatus, ClubRecords, Payment};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend specific failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The persisted rows contradict each other and cannot seed the ledger.
    #[error("inconsistent club snapshot: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Reject a snapshot whose rows point at missing rows, hold impossible wallet balances or
/// block credits that no pending booking accounts for.
pub fn verify_snapshot(records: &ClubRecords) -> StorageResult<()> {
    let users: HashSet<Uuid> = records.users.iter().map(|user| user.id).collect();
    let slots: HashSet<Uuid> = records.slots.iter().map(|slot| slot.id).collect();
    let bookings: HashSet<Uuid> = records.bookings.iter().map(|booking| booking.id).collect();

    for user in &records.users {
        if user.blocked_cents < 0 || user.points < 0 || user.blocked_cents > user.credits_cents {
            return Err(StorageError::Corrupt(format!(
                "user `{}` has an impossible wallet",
                user.id
            )));
        }
    }
    for booking in &records.bookings {
        if !slots.contains(&booking.slot_id) {
            return Err(StorageError::Corrupt(format!(
                "booking `{}` points at missing time slot `{}`",
                booking.id, booking.slot_id
            )));
        }
        if !users.contains(&booking.user_id) {
            return Err(StorageError::Corrupt(format!(
                "booking `{}` points at missing user `{}`",
                booking.id, booking.user_id
            )));
        }
    }
    let mut held: HashMap<Uuid, i64> = HashMap::new();
    for booking in &records.bookings {
        if let (BookingStatus::Pending, Payment::Credits { amount_cents }) =
            (booking.status, &booking.payment)
        {
            *held.entry(booking.user_id).or_default() += amount_cents;
        }
    }
    for user in &records.users {
        let pending = held.get(&user.id).copied().unwrap_or(0);
        if user.blocked_cents != pending {
            return Err(StorageError::Corrupt(format!(
                "user `{}` blocks {} cents but pending bookings hold {pending}",
                user.id, user.blocked_cents
            )));
        }
    }
    for transaction in &records.transactions {
        let dangling_booking = transaction
            .booking_id
            .is_some_and(|booking_id| !bookings.contains(&booking_id));
        if !users.contains(&transaction.user_id) || dangling_booking {
            return Err(StorageError::Corrupt(format!(
                "transaction `{}` points at a missing row",
                transaction.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::Level,
        services::test_support::{self, alex, class_at, confirmed_booking, user},
    };

    #[test]
    fn consistent_snapshot_passes() {
        let config = test_support::config();
        let ana = user("ana", Level::Beginner, 5_000);
        let slot = class_at(alex(&config), 10, 0);
        let booking = confirmed_booking(&slot, &ana, 1_000);

        let records = test_support::records(&[&ana], &[&slot], &[&booking]);
        assert!(verify_snapshot(&records).is_ok());
    }

    #[test]
    fn booking_of_a_missing_slot_is_rejected() {
        let config = test_support::config();
        let ana = user("ana", Level::Beginner, 5_000);
        let slot = class_at(alex(&config), 10, 0);
        let booking = confirmed_booking(&slot, &ana, 1_000);

        let records = test_support::records(&[&ana], &[], &[&booking]);
        assert!(matches!(
            verify_snapshot(&records),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn holds_must_match_pending_credit_bookings() {
        let config = test_support::config();
        let mut ana = user("ana", Level::Beginner, 5_000);
        let slot = class_at(alex(&config), 10, 0);
        let mut pending = confirmed_booking(&slot, &ana, 1_000);
        pending.status = BookingStatus::Pending;

        let records = test_support::records(&[&ana], &[&slot], &[&pending]);
        assert!(matches!(
            verify_snapshot(&records),
            Err(StorageError::Corrupt(_))
        ));

        ana.blocked_cents = 1_000;
        let records = test_support::records(&[&ana], &[&slot], &[&pending]);
        assert!(verify_snapshot(&records).is_ok());

        ana.blocked_cents = 1_500;
        let records = test_support::records(&[&ana], &[&slot], &[&pending]);
        assert!(verify_snapshot(&records).is_err());
    }

    #[test]
    fn holds_above_the_balance_are_rejected() {
        let mut ana = user("ana", Level::Beginner, 1_000);
        ana.blocked_cents = 1_500;

        let records = test_support::records(&[&ana], &[], &[]);
        assert!(verify_snapshot(&records).is_err());
    }
}
