pub mod comment_votes;
pub mod comments;
pub mod content;
pub mod content_options;
pub mod feature_flags;
pub mod leaderboard;
pub mod point_transactions;
pub mod setting_history;
pub mod settings;
pub mod user_votes;
pub mod users;
