//! One vote per user per content item
//!
//! The `user_votes_once` unique index is the source of truth; the insert
//! uses `ON CONFLICT DO NOTHING` so two racing requests can never both count.

use crate::constants::USER_ALREADY_VOTED;
use crate::orm::{content, content_options, user_votes};
use chrono::Utc;
use derive_more::Display;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    Statement,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteOutcome {
    Recorded {
        option_id: i32,
        /// Set for quizzes: whether the chosen option is the correct one.
        correct: Option<bool>,
    },
    AlreadyVoted,
}

impl VoteOutcome {
    /// Client-facing code for a rejected duplicate vote.
    pub fn sentinel(&self) -> Option<&'static str> {
        match self {
            VoteOutcome::AlreadyVoted => Some(USER_ALREADY_VOTED),
            VoteOutcome::Recorded { .. } => None,
        }
    }
}

#[derive(Debug, Display)]
pub enum VoteError {
    #[display(fmt = "Content not found")]
    ContentNotFound,
    #[display(fmt = "Option does not belong to this content")]
    InvalidOption,
    #[display(fmt = "Voting on this content has closed")]
    Closed,
    #[display(fmt = "Database error while voting: {}", _0)]
    Database(DbErr),
}

impl std::error::Error for VoteError {}

impl From<DbErr> for VoteError {
    fn from(e: DbErr) -> Self {
        VoteError::Database(e)
    }
}

/// Records a vote and bumps the option's counter in one transaction.
pub async fn cast_vote(
    db: &DatabaseConnection,
    user_id: i32,
    content_id: i32,
    option_id: i32,
) -> Result<VoteOutcome, VoteError> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let item = content::Entity::find_by_id(content_id)
        .one(&txn)
        .await?
        .ok_or(VoteError::ContentNotFound)?;

    if let Some(ends_at) = item.ends_at {
        if ends_at < now {
            return Err(VoteError::Closed);
        }
    }

    let option = content_options::Entity::find_by_id(option_id)
        .filter(content_options::Column::ContentId.eq(content_id))
        .one(&txn)
        .await?;
    if option.is_none() {
        return Err(VoteError::InvalidOption);
    }

    let inserted = txn
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO user_votes (user_id, content_id, option_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, content_id) DO NOTHING
            "#,
            vec![user_id.into(), content_id.into(), option_id.into(), now.into()],
        ))
        .await?;

    if inserted.rows_affected() == 0 {
        txn.rollback().await?;
        log::debug!(
            "User {} already voted on content {}",
            user_id,
            content_id
        );
        return Ok(VoteOutcome::AlreadyVoted);
    }

    content_options::Entity::update_many()
        .col_expr(
            content_options::Column::VoteCount,
            Expr::col(content_options::Column::VoteCount).add(1),
        )
        .filter(content_options::Column::Id.eq(option_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(VoteOutcome::Recorded {
        option_id,
        correct: item.correct_option_id.map(|correct| correct == option_id),
    })
}

/// Map of `content_id -> option_id` for everything the user has voted on.
pub async fn user_vote_map(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<HashMap<i32, i32>, DbErr> {
    Ok(user_votes::Entity::find()
        .filter(user_votes::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.content_id, v.option_id))
        .collect())
}
