//! In-memory caching for frequently requested, slowly changing data.
//! Uses moka for TTL-based caching with LRU eviction.

use crate::app_config;
use crate::leaderboard::LeaderboardEntry;
use crate::pinning::PinnedComment;
use moka::sync::Cache;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

/// Pinning decisions per content id. TTL from `ai.cache_ttl_seconds`.
static PINNED_COMMENT_CACHE: Lazy<Cache<i32, PinnedComment>> = Lazy::new(|| {
    Cache::builder()
        .time_to_live(Duration::from_secs(app_config::ai().cache_ttl_seconds))
        .max_capacity(10_000)
        .build()
});

/// The computed leaderboard, keyed by row limit, with 30 second TTL.
static LEADERBOARD_CACHE: Lazy<Cache<u64, Arc<Vec<LeaderboardEntry>>>> = Lazy::new(|| {
    Cache::builder()
        .time_to_live(Duration::from_secs(30))
        .max_capacity(16)
        .build()
});

pub fn get_pinned_comment(content_id: i32) -> Option<PinnedComment> {
    PINNED_COMMENT_CACHE.get(&content_id)
}

pub fn store_pinned_comment(content_id: i32, pinned: PinnedComment) {
    PINNED_COMMENT_CACHE.insert(content_id, pinned);
}

/// Call when a new comment lands on the item.
pub fn invalidate_pinned_comment(content_id: i32) {
    PINNED_COMMENT_CACHE.invalidate(&content_id);
}

pub fn get_leaderboard(limit: u64) -> Option<Arc<Vec<LeaderboardEntry>>> {
    LEADERBOARD_CACHE.get(&limit)
}

pub fn store_leaderboard(limit: u64, entries: Arc<Vec<LeaderboardEntry>>) {
    LEADERBOARD_CACHE.insert(limit, entries);
}

pub fn invalidate_leaderboard() {
    LEADERBOARD_CACHE.invalidate_all();
}
