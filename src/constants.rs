//! Application-wide constants

/// Display name used when a user has neither a first name nor a username.
pub const FALLBACK_AUTHOR_NAME: &str = "User";

/// Leaderboard name for rows without a username.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// First name stored for identities that arrive without one.
pub const DEFAULT_FIRST_NAME: &str = "Developer";

/// Sentinel returned when a user votes twice on the same content item.
/// Clients compare against this exact string.
pub const USER_ALREADY_VOTED: &str = "USER_ALREADY_VOTED";

/// Maximum comment length in characters
pub const MAX_COMMENT_LENGTH: usize = 2_000;

/// Maximum length of a point transaction reason tag
pub const MAX_REASON_LENGTH: usize = 64;

/// Number of highest-scoring comments forwarded to the pinning prompt.
pub const PIN_CANDIDATE_LIMIT: usize = 5;

/// Rows returned by the leaderboard.
pub const LEADERBOARD_LIMIT: u64 = 100;

/// Challenges considered when building the daily challenge.
pub const DAILY_CHALLENGE_POOL: u64 = 100;

/// Questions in one daily challenge.
pub const DAILY_CHALLENGE_QUESTIONS: usize = 10;
