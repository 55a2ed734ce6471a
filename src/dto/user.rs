use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{Currency, Level, TransactionEntity, TransactionKind, UserEntity};

/// Largest single top-up accepted, in cents.
pub const MAX_TOP_UP_CENTS: i64 = 1_000_000;

/// Payload used to register a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub level: Level,
}

/// Payload used to load credits into a wallet.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TopUpRequest {
    /// Amount to add, in cents.
    #[validate(range(min = 1, max = 1_000_000))]
    pub amount_cents: i64,
}

/// Player profile with the state of their wallet.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub level: Level,
    pub credits_cents: i64,
    pub blocked_cents: i64,
    /// Credits that can still be spent or blocked.
    pub available_cents: i64,
    pub points: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserEntity> for UserSummary {
    fn from(user: UserEntity) -> Self {
        Self {
            available_cents: user.available_cents(),
            id: user.id,
            name: user.name,
            email: user.email,
            level: user.level,
            credits_cents: user.credits_cents,
            blocked_cents: user.blocked_cents,
            points: user.points,
            created_at: user.created_at,
        }
    }
}

/// One entry of a wallet history.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub booking_id: Option<Uuid>,
    pub currency: Currency,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_after: i64,
    pub blocked_after: i64,
    pub concept: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<TransactionEntity> for TransactionSummary {
    fn from(transaction: TransactionEntity) -> Self {
        Self {
            id: transaction.id,
            booking_id: transaction.booking_id,
            currency: transaction.currency,
            kind: transaction.kind,
            amount: transaction.amount,
            balance_after: transaction.balance_after,
            blocked_after: transaction.blocked_after,
            concept: transaction.concept,
            created_at: transaction.created_at,
        }
    }
}
