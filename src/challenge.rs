//! Daily challenge gating and per-user standing

use crate::orm::users;
use chrono::NaiveDateTime;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, Condition, DatabaseConnection, DbBackend, DbErr,
    FromQueryResult, Statement,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyGate {
    Available,
    CompletedToday,
}

/// True when `last` falls on the same UTC calendar date as `now`.
pub fn has_played_today(last: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    last.map(|last| last.date() == now.date()).unwrap_or(false)
}

pub fn daily_gate(user: &users::Model, now: NaiveDateTime) -> DailyGate {
    if has_played_today(user.last_daily_challenge_at, now) {
        DailyGate::CompletedToday
    } else {
        DailyGate::Available
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Recorded,
    AlreadyCompleted,
}

/// Marks today's challenge as done. The conditional update makes a second
/// completion on the same date a no-op. `None` for unknown users.
pub async fn complete_daily_challenge(
    db: &DatabaseConnection,
    user_id: i32,
    now: NaiveDateTime,
) -> Result<Option<Completion>, DbErr> {
    let start_of_day = now.date().and_hms_opt(0, 0, 0).unwrap_or(now);

    let res = users::Entity::update_many()
        .col_expr(users::Column::LastDailyChallengeAt, Expr::value(Some(now)))
        .filter(users::Column::Id.eq(user_id))
        .filter(
            Condition::any()
                .add(users::Column::LastDailyChallengeAt.is_null())
                .add(users::Column::LastDailyChallengeAt.lt(start_of_day)),
        )
        .exec(db)
        .await?;

    if res.rows_affected > 0 {
        return Ok(Some(Completion::Recorded));
    }

    let exists = users::Entity::find_by_id(user_id).one(db).await?.is_some();
    Ok(exists.then(|| Completion::AlreadyCompleted))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Share of other users with strictly fewer points, 0..=100.
    pub beat_percentage: i64,
    pub total_points: i64,
}

pub fn beat_percentage(users_below: i64, total_users: i64) -> i64 {
    if total_users <= 1 {
        return 0;
    }
    let others = (total_users - 1) as f64;
    (users_below as f64 * 100.0 / others).round() as i64
}

#[derive(Debug, FromQueryResult)]
struct StandingRow {
    total_points: i64,
    users_below: i64,
    total_users: i64,
}

/// Standing of a user among everyone. Errors and unknown users read as zeros.
pub async fn user_global_stats(db: &DatabaseConnection, user_id: i32) -> UserStats {
    let row = StandingRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        SELECT
            u.points AS total_points,
            (SELECT COUNT(*) FROM users o WHERE o.points < u.points) AS users_below,
            (SELECT COUNT(*) FROM users) AS total_users
        FROM users u
        WHERE u.id = $1
        "#,
        vec![user_id.into()],
    ))
    .one(db)
    .await;

    match row {
        Ok(Some(row)) => UserStats {
            beat_percentage: beat_percentage(row.users_below, row.total_users),
            total_points: row.total_points,
        },
        Ok(None) => UserStats::default(),
        Err(e) => {
            log::error!("Failed to compute stats for user {}: {}", user_id, e);
            UserStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_same_day_is_completed() {
        let now = at(2026, 5, 10, 23, 59);
        assert!(has_played_today(Some(at(2026, 5, 10, 0, 1)), now));
    }

    #[test]
    fn test_previous_day_is_available() {
        let now = at(2026, 5, 10, 0, 1);
        assert!(!has_played_today(Some(at(2026, 5, 9, 23, 59)), now));
        assert!(!has_played_today(Some(at(2025, 5, 10, 12, 0)), now));
    }

    #[test]
    fn test_never_played_is_available() {
        assert!(!has_played_today(None, at(2026, 1, 1, 12, 0)));
    }

    #[test]
    fn test_gate_for_user() {
        let now = at(2026, 5, 10, 9, 0);
        let mut user = users::Model {
            id: 1,
            telegram_id: 1,
            username: None,
            first_name: "Ann".to_owned(),
            last_name: None,
            photo_url: None,
            points: 0,
            last_daily_challenge_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(daily_gate(&user, now), DailyGate::Available);
        user.last_daily_challenge_at = Some(at(2026, 5, 10, 8, 0));
        assert_eq!(daily_gate(&user, now), DailyGate::CompletedToday);
    }

    #[test]
    fn test_beat_percentage() {
        assert_eq!(beat_percentage(0, 1), 0);
        assert_eq!(beat_percentage(0, 0), 0);
        assert_eq!(beat_percentage(3, 4), 100);
        assert_eq!(beat_percentage(1, 4), 33);
        assert_eq!(beat_percentage(2, 4), 67);
        assert_eq!(beat_percentage(0, 10), 0);
    }
}
