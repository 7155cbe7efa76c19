//! Points leaderboard

use crate::cache;
use crate::constants::ANONYMOUS_NAME;
use crate::orm::leaderboard;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardTitle {
    Champion,
    RunnerUp,
    ThirdPlace,
}

impl LeaderboardTitle {
    pub fn for_rank(rank: u32) -> Option<Self> {
        match rank {
            1 => Some(LeaderboardTitle::Champion),
            2 => Some(LeaderboardTitle::RunnerUp),
            3 => Some(LeaderboardTitle::ThirdPlace),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: i32,
    pub name: String,
    pub avatar_url: Option<String>,
    pub total_score: i64,
    pub title: Option<LeaderboardTitle>,
}

/// Rows must already be ordered by score.
pub fn rank_entries(rows: Vec<leaderboard::Model>) -> Vec<LeaderboardEntry> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let rank = index as u32 + 1;
            LeaderboardEntry {
                rank,
                user_id: row.user_id,
                name: row
                    .username
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| ANONYMOUS_NAME.to_owned()),
                avatar_url: row.avatar_url,
                total_score: row.total_score,
                title: LeaderboardTitle::for_rank(rank),
            }
        })
        .collect()
}

pub async fn top_users(
    db: &DatabaseConnection,
    limit: u64,
) -> Result<Arc<Vec<LeaderboardEntry>>, DbErr> {
    if let Some(cached) = cache::get_leaderboard(limit) {
        return Ok(cached);
    }

    let rows = leaderboard::Entity::find()
        .order_by_desc(leaderboard::Column::TotalScore)
        .order_by_asc(leaderboard::Column::UserId)
        .limit(limit)
        .all(db)
        .await?;

    let entries = Arc::new(rank_entries(rows));
    cache::store_leaderboard(limit, entries.clone());
    Ok(entries)
}
