pub mod app_config;
pub mod cache;
pub mod challenge;
pub mod comments;
pub mod config;
pub mod constants;
pub mod content;
pub mod db;
pub mod identity;
pub mod ip;
pub mod leaderboard;
pub mod middleware;
pub mod orm;
pub mod pinning;
pub mod points;
pub mod rate_limit;
pub mod stranger;
pub mod votes;
pub mod web;
