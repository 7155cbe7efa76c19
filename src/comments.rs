//! Comments and comment up/down votes

use crate::constants::MAX_COMMENT_LENGTH;
use crate::orm::comment_votes::{self, VoteDirection};
use crate::orm::{comments, content, users};
use chrono::Utc;
use derive_more::Display;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, DatabaseConnection, DbBackend, DbErr, Statement,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSort {
    Newest,
    Oldest,
    #[default]
    Popular,
}

#[derive(Debug, Display)]
pub enum CommentError {
    #[display(fmt = "Comment cannot be empty")]
    Empty,
    #[display(fmt = "Comment is longer than {} characters", MAX_COMMENT_LENGTH)]
    TooLong,
    #[display(fmt = "Content not found")]
    ContentNotFound,
    #[display(fmt = "Comment not found")]
    CommentNotFound,
    #[display(fmt = "Database error in comments: {}", _0)]
    Database(DbErr),
}

impl std::error::Error for CommentError {}

impl From<DbErr> for CommentError {
    fn from(e: DbErr) -> Self {
        CommentError::Database(e)
    }
}

/// Sorts in place. Ties keep their incoming order.
pub fn sort_comments(list: &mut [comments::Model], sort: CommentSort) {
    match sort {
        CommentSort::Newest => list.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        CommentSort::Oldest => list.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        CommentSort::Popular => list.sort_by(|a, b| b.net_score().cmp(&a.net_score())),
    }
}

/// Moves the pinned comment to the front. Unknown ids leave the order as is.
pub fn pinned_order(list: Vec<comments::Model>, pinned_id: Option<i32>) -> Vec<comments::Model> {
    let pinned_id = match pinned_id {
        Some(id) => id,
        None => return list,
    };
    let (pinned, rest): (Vec<_>, Vec<_>) = list.into_iter().partition(|c| c.id == pinned_id);
    pinned.into_iter().chain(rest).collect()
}

pub async fn list_comments(
    db: &DatabaseConnection,
    content_id: i32,
    sort: CommentSort,
) -> Result<Vec<comments::Model>, DbErr> {
    let mut list = comments::Entity::find()
        .filter(comments::Column::ContentId.eq(content_id))
        .order_by_desc(comments::Column::CreatedAt)
        .order_by_desc(comments::Column::Id)
        .all(db)
        .await?;

    sort_comments(&mut list, sort);
    Ok(list)
}

/// Trimmed comment text, or why it is rejected.
pub fn validate_comment_text(text: &str) -> Result<&str, CommentError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentError::Empty);
    }
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CommentError::TooLong);
    }
    Ok(text)
}

pub async fn add_comment(
    db: &DatabaseConnection,
    author: &users::Model,
    content_id: i32,
    text: &str,
) -> Result<comments::Model, CommentError> {
    let text = validate_comment_text(text)?;

    if content::Entity::find_by_id(content_id).one(db).await?.is_none() {
        return Err(CommentError::ContentNotFound);
    }

    let comment = comments::ActiveModel {
        content_id: Set(content_id),
        author_id: Set(author.id),
        author_name: Set(author.display_name()),
        author_avatar_url: Set(author.photo_url.clone()),
        text: Set(text.to_owned()),
        upvotes: Set(0),
        downvotes: Set(0),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(comment)
}

/// Result of tapping up or down on a comment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VoteTransition {
    pub state: Option<VoteDirection>,
    pub upvote_delta: i32,
    pub downvote_delta: i32,
}

/// Tapping the direction already chosen clears the vote; tapping the
/// other direction moves it.
pub fn vote_transition(previous: Option<VoteDirection>, requested: VoteDirection) -> VoteTransition {
    let state = if previous == Some(requested) {
        None
    } else {
        Some(requested)
    };

    let (upvote_delta, downvote_delta) = match (state, previous) {
        (Some(VoteDirection::Up), Some(VoteDirection::Down)) => (1, -1),
        (Some(VoteDirection::Up), _) => (1, 0),
        (Some(VoteDirection::Down), Some(VoteDirection::Up)) => (-1, 1),
        (Some(VoteDirection::Down), _) => (0, 1),
        (None, Some(VoteDirection::Up)) => (-1, 0),
        (None, Some(VoteDirection::Down)) => (0, -1),
        (None, None) => (0, 0),
    };

    VoteTransition {
        state,
        upvote_delta,
        downvote_delta,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentVoteResult {
    pub comment: comments::Model,
    pub state: Option<VoteDirection>,
}

/// Applies a comment vote. The comment row is locked for the transaction so
/// the user's vote row and the counters move together.
pub async fn apply_comment_vote(
    db: &DatabaseConnection,
    user_id: i32,
    comment_id: i32,
    requested: VoteDirection,
) -> Result<CommentVoteResult, CommentError> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    // Serializes voters on this comment until commit.
    comments::Entity::find()
        .from_raw_sql(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT * FROM comments WHERE id = $1 FOR UPDATE",
            vec![comment_id.into()],
        ))
        .one(&txn)
        .await?
        .ok_or(CommentError::CommentNotFound)?;

    let existing = comment_votes::Entity::find_by_id((user_id, comment_id))
        .one(&txn)
        .await?;
    let transition = vote_transition(existing.as_ref().map(|v| v.direction), requested);

    match (transition.state, existing) {
        (None, Some(vote)) => {
            vote.delete(&txn).await?;
        }
        (Some(direction), Some(vote)) => {
            let mut vote: comment_votes::ActiveModel = vote.into();
            vote.direction = Set(direction);
            vote.updated_at = Set(now);
            vote.update(&txn).await?;
        }
        (Some(direction), None) => {
            comment_votes::ActiveModel {
                user_id: Set(user_id),
                comment_id: Set(comment_id),
                direction: Set(direction),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }
        (None, None) => {}
    }

    comments::Entity::update_many()
        .col_expr(
            comments::Column::Upvotes,
            Expr::col(comments::Column::Upvotes).add(transition.upvote_delta),
        )
        .col_expr(
            comments::Column::Downvotes,
            Expr::col(comments::Column::Downvotes).add(transition.downvote_delta),
        )
        .filter(comments::Column::Id.eq(comment_id))
        .exec(&txn)
        .await?;

    let comment = comments::Entity::find_by_id(comment_id)
        .one(&txn)
        .await?
        .ok_or(CommentError::CommentNotFound)?;

    txn.commit().await?;

    Ok(CommentVoteResult {
        comment,
        state: transition.state,
    })
}

/// Map of `comment_id -> direction` for the user's current comment votes.
pub async fn user_comment_votes(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<HashMap<i32, VoteDirection>, DbErr> {
    Ok(comment_votes::Entity::find()
        .filter(comment_votes::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.comment_id, v.direction))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use VoteDirection::{Down, Up};

    fn comment(id: i32, up: i32, down: i32, minutes: i64) -> comments::Model {
        let base = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        comments::Model {
            id,
            content_id: 1,
            author_id: 1,
            author_name: "Ann".to_owned(),
            author_avatar_url: None,
            text: format!("comment {}", id),
            upvotes: up,
            downvotes: down,
            created_at: base + Duration::minutes(minutes),
        }
    }

    fn ids(list: &[comments::Model]) -> Vec<i32> {
        list.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_upvote_from_nothing() {
        let t = vote_transition(None, Up);
        assert_eq!(t.state, Some(Up));
        assert_eq!((t.upvote_delta, t.downvote_delta), (1, 0));
    }

    #[test]
    fn test_downvote_from_nothing() {
        let t = vote_transition(None, Down);
        assert_eq!(t.state, Some(Down));
        assert_eq!((t.upvote_delta, t.downvote_delta), (0, 1));
    }

    #[test]
    fn test_same_direction_toggles_off() {
        let t = vote_transition(Some(Up), Up);
        assert_eq!(t.state, None);
        assert_eq!((t.upvote_delta, t.downvote_delta), (-1, 0));

        let t = vote_transition(Some(Down), Down);
        assert_eq!(t.state, None);
        assert_eq!((t.upvote_delta, t.downvote_delta), (0, -1));
    }

    #[test]
    fn test_switching_direction_moves_vote() {
        let t = vote_transition(Some(Down), Up);
        assert_eq!(t.state, Some(Up));
        assert_eq!((t.upvote_delta, t.downvote_delta), (1, -1));

        let t = vote_transition(Some(Up), Down);
        assert_eq!(t.state, Some(Down));
        assert_eq!((t.upvote_delta, t.downvote_delta), (-1, 1));
    }

    #[test]
    fn test_sort_popular_by_net_score() {
        let mut list = vec![comment(1, 10, 1, 0), comment(2, 2, 0, 1), comment(3, 5, 5, 2)];
        sort_comments(&mut list, CommentSort::Popular);
        assert_eq!(ids(&list), vec![1, 2, 3]);

        let mut list = vec![comment(3, 5, 5, 2), comment(2, 2, 0, 1), comment(1, 10, 1, 0)];
        sort_comments(&mut list, CommentSort::Popular);
        assert_eq!(ids(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_by_time() {
        let mut list = vec![comment(1, 0, 0, 5), comment(2, 0, 0, 1), comment(3, 0, 0, 9)];
        sort_comments(&mut list, CommentSort::Newest);
        assert_eq!(ids(&list), vec![3, 1, 2]);
        sort_comments(&mut list, CommentSort::Oldest);
        assert_eq!(ids(&list), vec![2, 1, 3]);
    }

    #[test]
    fn test_pinned_comment_moves_first() {
        let list = vec![comment(1, 0, 0, 0), comment(2, 0, 0, 0), comment(3, 0, 0, 0)];
        assert_eq!(ids(&pinned_order(list.clone(), Some(3))), vec![3, 1, 2]);
        assert_eq!(ids(&pinned_order(list.clone(), Some(42))), vec![1, 2, 3]);
        assert_eq!(ids(&pinned_order(list, None)), vec![1, 2, 3]);
    }

    #[test]
    fn test_comment_text_limits() {
        assert!(matches!(validate_comment_text("   "), Err(CommentError::Empty)));
        assert!(matches!(
            validate_comment_text(&"a".repeat(MAX_COMMENT_LENGTH + 1)),
            Err(CommentError::TooLong)
        ));
        assert_eq!(validate_comment_text("  hello ").unwrap(), "hello");
    }

    #[test]
    fn test_default_sort_is_popular() {
        assert_eq!(CommentSort::default(), CommentSort::Popular);
    }
}
