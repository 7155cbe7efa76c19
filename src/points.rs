//! Points ledger
//!
//! Every award is an append-only `point_transactions` row. The running
//! balance on `users.points` is moved in the same transaction with a single
//! `points = points + amount` statement, so concurrent awards never lose
//! an update.

use crate::constants::MAX_REASON_LENGTH;
use crate::orm::{point_transactions, users};
use chrono::Utc;
use derive_more::Display;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr};
use serde::Serialize;

/// Reason recorded for a correct quiz answer.
pub const REASON_QUIZ_CORRECT: &str = "quiz_correct";
/// Reason recorded for a correct daily challenge answer.
pub const REASON_DAILY_CHALLENGE_CORRECT: &str = "daily_challenge_correct";

#[derive(Debug, Display)]
pub enum LedgerError {
    #[display(fmt = "Point awards must be non-zero")]
    ZeroAmount,
    #[display(fmt = "Negative awards are not allowed")]
    NegativeAmount,
    #[display(fmt = "Reason must be between 1 and {} characters", MAX_REASON_LENGTH)]
    InvalidReason,
    #[display(fmt = "User {} does not exist", _0)]
    UnknownUser(i32),
    #[display(fmt = "Database error in points ledger: {}", _0)]
    Database(DbErr),
}

impl std::error::Error for LedgerError {}

impl From<DbErr> for LedgerError {
    fn from(e: DbErr) -> Self {
        LedgerError::Database(e)
    }
}

pub fn validate_reason(reason: &str) -> Result<(), LedgerError> {
    let len = reason.trim().chars().count();
    if len == 0 || len > MAX_REASON_LENGTH {
        return Err(LedgerError::InvalidReason);
    }
    Ok(())
}

/// Amount policy for caller-initiated awards. Internal awards skip the
/// sign check.
pub fn check_amount(amount: i64, allow_negative: bool) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    if amount < 0 && !allow_negative {
        return Err(LedgerError::NegativeAmount);
    }
    Ok(())
}

/// Records a signed award and returns the user's new balance.
pub async fn award_points(
    db: &DatabaseConnection,
    user_id: i32,
    amount: i64,
    reason: &str,
    metadata: serde_json::Value,
) -> Result<i64, LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    validate_reason(reason)?;

    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let res = users::Entity::update_many()
        .col_expr(
            users::Column::Points,
            Expr::col(users::Column::Points).add(amount),
        )
        .filter(users::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    if res.rows_affected == 0 {
        txn.rollback().await?;
        return Err(LedgerError::UnknownUser(user_id));
    }

    point_transactions::ActiveModel {
        user_id: Set(user_id),
        amount: Set(amount),
        reason: Set(reason.trim().to_owned()),
        metadata: Set(metadata),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let balance = users::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .map(|u| u.points)
        .ok_or(LedgerError::UnknownUser(user_id))?;

    txn.commit().await?;

    log::debug!(
        "Awarded {} points to user {} for {}, balance now {}",
        amount,
        user_id,
        reason,
        balance
    );

    Ok(balance)
}

/// Latest ledger rows for a user, newest first.
pub async fn history(
    db: &DatabaseConnection,
    user_id: i32,
    limit: u64,
) -> Result<Vec<point_transactions::Model>, DbErr> {
    point_transactions::Entity::find()
        .filter(point_transactions::Column::UserId.eq(user_id))
        .order_by_desc(point_transactions::Column::CreatedAt)
        .order_by_desc(point_transactions::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

/// Optimistic balance shown to a client while an award is in flight.
///
/// `apply` adds a pending delta on top of the last confirmed balance.
/// `confirm` replaces everything with the stored balance and `rollback`
/// discards the pending delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PointsPreview {
    confirmed: i64,
    pending: i64,
}

impl PointsPreview {
    pub fn new(confirmed: i64) -> Self {
        Self {
            confirmed,
            pending: 0,
        }
    }

    /// Balance to display right now.
    pub fn displayed(&self) -> i64 {
        self.confirmed + self.pending
    }

    pub fn apply(&mut self, delta: i64) -> i64 {
        self.pending += delta;
        self.displayed()
    }

    pub fn confirm(&mut self, balance: i64) -> i64 {
        self.confirmed = balance;
        self.pending = 0;
        self.displayed()
    }

    pub fn rollback(&mut self) -> i64 {
        self.pending = 0;
        self.displayed()
    }

    /// Settles the preview with the outcome of an award.
    pub fn settle<E>(&mut self, outcome: &Result<i64, E>) -> i64 {
        match outcome {
            Ok(balance) => self.confirm(*balance),
            Err(_) => self.rollback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_validation() {
        assert!(validate_reason(REASON_QUIZ_CORRECT).is_ok());
        assert!(validate_reason(REASON_DAILY_CHALLENGE_CORRECT).is_ok());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LENGTH + 1)).is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LENGTH)).is_ok());
    }

    #[test]
    fn test_amount_policy() {
        assert!(matches!(check_amount(0, true), Err(LedgerError::ZeroAmount)));
        assert!(matches!(check_amount(-3, false), Err(LedgerError::NegativeAmount)));
        assert!(check_amount(-3, true).is_ok());
        assert!(check_amount(5, false).is_ok());
    }

    #[test]
    fn test_preview_shows_delta_immediately() {
        let mut preview = PointsPreview::new(10);
        assert_eq!(preview.apply(1), 11);
        assert_eq!(preview.apply(2), 13);
    }

    #[test]
    fn test_preview_confirm_uses_stored_balance() {
        let mut preview = PointsPreview::new(10);
        preview.apply(1);
        // Another award landed concurrently.
        assert_eq!(preview.confirm(12), 12);
        assert_eq!(preview.displayed(), 12);
    }

    #[test]
    fn test_failed_award_rolls_back() {
        let mut preview = PointsPreview::new(10);
        preview.apply(5);
        let outcome: Result<i64, LedgerError> = Err(LedgerError::UnknownUser(1));
        assert_eq!(preview.settle(&outcome), 10);
    }

    #[test]
    fn test_successful_award_confirms() {
        let mut preview = PointsPreview::new(3);
        preview.apply(1);
        let outcome: Result<i64, LedgerError> = Ok(4);
        assert_eq!(preview.settle(&outcome), 4);
    }
}
