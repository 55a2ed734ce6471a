//! Credits/points wallet: user registration, top-ups and the movements bookings make.
//!
//! Every movement goes through [`apply_movement`], which checks the balances, updates the user
//! and appends the matching transaction in the same draft.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{Currency, TransactionEntity, TransactionKind, UserEntity},
    dto::user::{CreateUserRequest, TopUpRequest, TransactionSummary, UserSummary},
    error::ServiceError,
    state::{SharedState, ledger::Draft, transitions::run_mutation_with_broadcast},
};

/// Register a new player with an empty wallet.
pub async fn create_user(
    state: &SharedState,
    request: CreateUserRequest,
) -> Result<UserSummary, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let email = request.email.trim().to_lowercase();
    let name = request.name.trim().to_owned();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be empty".into()));
    }

    let user = run_mutation_with_broadcast(state, |draft| {
        if draft.users().any(|user| user.email == email) {
            return Err(ServiceError::InvalidState(format!(
                "a user with email `{email}` already exists"
            )));
        }

        let user = UserEntity {
            id: Uuid::new_v4(),
            name,
            email,
            level: request.level,
            credits_cents: 0,
            blocked_cents: 0,
            points: 0,
            created_at: now,
            updated_at: now,
        };
        draft.insert_user(user.clone());
        Ok(user)
    })
    .await?;

    info!(user_id = %user.id, "user registered");
    Ok(user.into())
}

/// Fetch a user and their wallet.
pub async fn get_user(state: &SharedState, id: Uuid) -> Result<UserSummary, ServiceError> {
    let ledger = state.ledger().await;
    ledger
        .user(id)
        .cloned()
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}

/// Load credits into a wallet.
pub async fn top_up(
    state: &SharedState,
    id: Uuid,
    request: TopUpRequest,
) -> Result<UserSummary, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let user = run_mutation_with_broadcast(state, |draft| {
        apply_movement(
            draft,
            Movement {
                user_id: id,
                booking_id: None,
                kind: TransactionKind::TopUp,
                amount: request.amount_cents,
                concept: "wallet top-up".into(),
            },
            now,
        )?;
        require_user(draft, id).cloned()
    })
    .await?;

    info!(user_id = %id, amount_cents = request.amount_cents, "wallet topped up");
    Ok(user.into())
}

/// Wallet history of a user, newest first.
pub async fn list_transactions(
    state: &SharedState,
    id: Uuid,
) -> Result<Vec<TransactionSummary>, ServiceError> {
    let ledger = state.ledger().await;
    if ledger.user(id).is_none() {
        return Err(ServiceError::NotFound(format!("user `{id}` not found")));
    }

    Ok(ledger
        .transactions()
        .iter()
        .rev()
        .filter(|transaction| transaction.user_id == id)
        .cloned()
        .map(Into::into)
        .collect())
}

pub(crate) fn require_user<'d>(draft: &'d Draft<'_>, id: Uuid) -> Result<&'d UserEntity, ServiceError> {
    draft
        .user(id)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}

/// A single wallet movement to apply.
#[derive(Debug, Clone)]
pub struct Movement {
    /// Wallet owner.
    pub user_id: Uuid,
    /// Booking that caused the movement.
    pub booking_id: Option<Uuid>,
    /// What happens to the balances.
    pub kind: TransactionKind,
    /// Positive amount, in cents for credits and units for points.
    pub amount: i64,
    /// Human readable description stored with the transaction.
    pub concept: String,
}

/// Update the user's balances according to `movement` and record the transaction.
///
/// A zero amount moves nothing and records nothing.
pub fn apply_movement(
    draft: &mut Draft<'_>,
    movement: Movement,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    if movement.amount < 0 {
        return Err(ServiceError::InvalidInput(format!(
            "wallet movements must be positive (got {})",
            movement.amount
        )));
    }
    if movement.amount == 0 {
        return Ok(());
    }

    let user = draft
        .user_mut(movement.user_id)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", movement.user_id)))?;
    let amount = movement.amount;

    let currency = match movement.kind {
        TransactionKind::TopUp | TransactionKind::Refund => {
            user.credits_cents += amount;
            Currency::Credits
        }
        TransactionKind::Block => {
            if user.available_cents() < amount {
                return Err(ServiceError::InsufficientFunds(format!(
                    "{} cents available, {amount} needed",
                    user.available_cents()
                )));
            }
            user.blocked_cents += amount;
            Currency::Credits
        }
        TransactionKind::Unblock => {
            if user.blocked_cents < amount {
                return Err(ServiceError::InvalidState(format!(
                    "cannot release {amount} cents, only {} blocked",
                    user.blocked_cents
                )));
            }
            user.blocked_cents -= amount;
            Currency::Credits
        }
        TransactionKind::Charge => {
            if user.blocked_cents < amount {
                return Err(ServiceError::InvalidState(format!(
                    "cannot charge {amount} cents, only {} blocked",
                    user.blocked_cents
                )));
            }
            user.blocked_cents -= amount;
            user.credits_cents -= amount;
            Currency::Credits
        }
        TransactionKind::PointsAward | TransactionKind::PointsRefund => {
            user.points += amount;
            Currency::Points
        }
        TransactionKind::PointsSpend => {
            if user.points < amount {
                return Err(ServiceError::InsufficientFunds(format!(
                    "{} points available, {amount} needed",
                    user.points
                )));
            }
            user.points -= amount;
            Currency::Points
        }
    };
    user.updated_at = now;

    let (balance_after, blocked_after) = match currency {
        Currency::Credits => (user.credits_cents, user.blocked_cents),
        Currency::Points => (user.points, 0),
    };

    draft.record(TransactionEntity {
        id: Uuid::new_v4(),
        user_id: movement.user_id,
        booking_id: movement.booking_id,
        currency,
        kind: movement.kind,
        amount,
        balance_after,
        blocked_after,
        concept: movement.concept,
        created_at: now,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{ClubRecords, Level},
        state::ledger::Ledger,
    };

    fn ledger_with_user(credits_cents: i64, points: i64) -> (Ledger, Uuid) {
        let now = OffsetDateTime::now_utc();
        let user = UserEntity {
            id: Uuid::new_v4(),
            name: "alice".into(),
            email: "alice@club.test".into(),
            level: Level::Intermediate,
            credits_cents,
            blocked_cents: 0,
            points,
            created_at: now,
            updated_at: now,
        };
        let id = user.id;
        (
            Ledger::from_records(ClubRecords {
                users: vec![user],
                ..ClubRecords::default()
            }),
            id,
        )
    }

    fn movement(user_id: Uuid, kind: TransactionKind, amount: i64) -> Movement {
        Movement {
            user_id,
            booking_id: None,
            kind,
            amount,
            concept: "test".into(),
        }
    }

    #[test]
    fn block_then_charge_consumes_the_hold() {
        let (ledger, id) = ledger_with_user(5_000, 0);
        let now = OffsetDateTime::now_utc();
        let mut draft = Draft::new(&ledger);

        apply_movement(&mut draft, movement(id, TransactionKind::Block, 1_250), now).unwrap();
        assert_eq!(draft.user(id).unwrap().available_cents(), 3_750);

        apply_movement(&mut draft, movement(id, TransactionKind::Charge, 1_250), now).unwrap();
        let user = draft.user(id).unwrap();
        assert_eq!(user.credits_cents, 3_750);
        assert_eq!(user.blocked_cents, 0);

        let changes = draft.into_changes();
        let kinds: Vec<_> = changes
            .records
            .transactions
            .iter()
            .map(|t| (t.kind, t.balance_after, t.blocked_after))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionKind::Block, 5_000, 1_250),
                (TransactionKind::Charge, 3_750, 0)
            ]
        );
    }

    #[test]
    fn block_beyond_available_credits_fails() {
        let (ledger, id) = ledger_with_user(1_000, 0);
        let now = OffsetDateTime::now_utc();
        let mut draft = Draft::new(&ledger);

        apply_movement(&mut draft, movement(id, TransactionKind::Block, 800), now).unwrap();
        let err =
            apply_movement(&mut draft, movement(id, TransactionKind::Block, 300), now).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientFunds(_)));
    }

    #[test]
    fn points_cannot_go_negative() {
        let (ledger, id) = ledger_with_user(0, 10);
        let now = OffsetDateTime::now_utc();
        let mut draft = Draft::new(&ledger);

        let err = apply_movement(&mut draft, movement(id, TransactionKind::PointsSpend, 11), now)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientFunds(_)));

        apply_movement(&mut draft, movement(id, TransactionKind::PointsSpend, 10), now).unwrap();
        assert_eq!(draft.user(id).unwrap().points, 0);
    }

    #[test]
    fn releasing_more_than_blocked_is_rejected() {
        let (ledger, id) = ledger_with_user(1_000, 0);
        let now = OffsetDateTime::now_utc();
        let mut draft = Draft::new(&ledger);

        let err =
            apply_movement(&mut draft, movement(id, TransactionKind::Unblock, 1), now).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn zero_amount_records_nothing() {
        let (ledger, id) = ledger_with_user(1_000, 0);
        let mut draft = Draft::new(&ledger);
        let now = OffsetDateTime::now_utc();

        apply_movement(&mut draft, movement(id, TransactionKind::PointsAward, 0), now).unwrap();
        assert!(draft.into_changes().is_empty());

        let mut draft = Draft::new(&ledger);
        assert!(apply_movement(&mut draft, movement(id, TransactionKind::TopUp, -5), now).is_err());
    }
}
