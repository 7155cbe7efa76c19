//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with ENGAGE_)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the language model API key should be kept in environment
//! variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    /// Address the HTTP server binds to
    pub bind: String,
    /// Mark session cookies as secure (HTTPS only)
    pub secure_cookies: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Engage".to_string(),
            bind: "0.0.0.0:8080".to_string(),
            secure_cookies: false,
        }
    }
}

/// Telegram identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Accept sign-in without identity claims using a fixed mock user.
    /// Never enable in production.
    pub dev_mode: bool,
    /// Telegram ids allowed to use admin endpoints. Only honored for
    /// sessions whose `initData` signature was verified.
    pub admin_ids: Vec<i64>,
    /// Bot token used to verify `initData` (should be in env var
    /// ENGAGE_TELEGRAM__BOT_TOKEN). Empty accepts unsigned identities.
    #[serde(default)]
    pub bot_token: String,
    /// Oldest `auth_date` accepted in signed `initData`
    pub init_data_max_age_seconds: i64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            admin_ids: Vec::new(),
            bot_token: String::new(),
            init_data_max_age_seconds: 86_400,
        }
    }
}

/// Hosted language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Chat-completions endpoint
    pub endpoint: String,
    pub model: String,
    /// API key (should be in env var ENGAGE_AI__API_KEY). Empty disables pinning.
    #[serde(default)]
    pub api_key: String,
    pub timeout_seconds: u64,
    /// How long a pinning decision is reused for the same content item
    pub cache_ttl_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            timeout_seconds: 20,
            cache_ttl_seconds: 300,
        }
    }
}

/// Stranger game configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub min_players: u32,
    pub max_players: u32,
    pub default_players: u32,
    /// JSON file with `[{"image_url": "...", "description": "..."}]`.
    /// Empty uses the built-in topics.
    pub topics_path: String,
    /// Sessions untouched for this long are discarded
    pub session_idle_minutes: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 10,
            default_players: 4,
            topics_path: String::new(),
            session_idle_minutes: 120,
        }
    }
}

/// Quiz configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub max_questions: u32,
    pub correct_answer_points: i64,
    pub question_duration_seconds: u32,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_questions: 10,
            correct_answer_points: 1,
            question_duration_seconds: 15,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sign-in attempts per minute per IP
    pub auth_per_minute: u32,
    /// Votes per minute per user
    pub votes_per_minute: u32,
    /// Comments per minute per user
    pub comments_per_minute: u32,
    /// Comment up/down votes per minute per user
    pub comment_votes_per_minute: u32,
    /// Point awards per minute per user
    pub points_per_minute: u32,
    /// Pinned-comment lookups per minute per IP
    pub pinning_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_per_minute: 10,
            votes_per_minute: 30,
            comments_per_minute: 5,
            comment_votes_per_minute: 60,
            points_per_minute: 60,
            pinning_per_minute: 20,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub telegram: TelegramConfig,
    pub ai: AiConfig,
    pub game: GameConfig,
    pub quiz: QuizConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., ENGAGE_AI__API_KEY, ENGAGE_TELEGRAM__DEV_MODE
            .add_source(
                Environment::with_prefix("ENGAGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// Triggers the lazy load and logs the result.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, telegram.dev_mode = {}",
        config.site.name,
        config.telegram.dev_mode
    );
    if config.telegram.dev_mode {
        log::warn!("Telegram dev mode is enabled; sign-in accepts a mock identity.");
    }
    if config.telegram.bot_token.is_empty() {
        log::warn!("No Telegram bot token; sign-in is unverified and admin endpoints are closed.");
    }
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn site() -> SiteConfig {
    get_config().site
}

pub fn telegram() -> TelegramConfig {
    get_config().telegram
}

pub fn ai() -> AiConfig {
    get_config().ai
}

pub fn game() -> GameConfig {
    get_config().game
}

pub fn quiz() -> QuizConfig {
    get_config().quiz
}

pub fn rate_limit() -> RateLimitConfig {
    get_config().rate_limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.name, "Engage");
        assert_eq!(config.game.min_players, 3);
        assert_eq!(config.game.max_players, 10);
        assert_eq!(config.game.default_players, 4);
        assert_eq!(config.quiz.max_questions, 10);
        assert_eq!(config.quiz.correct_answer_points, 1);
    }

    #[test]
    fn test_dev_mode_disabled_by_default() {
        let config = AppConfig::default();
        assert!(!config.telegram.dev_mode);
        assert!(config.telegram.admin_ids.is_empty());
        assert!(config.telegram.bot_token.is_empty());
        assert_eq!(config.telegram.init_data_max_age_seconds, 86_400);
    }

    #[test]
    fn test_pinning_has_no_key_by_default() {
        let config = AppConfig::default();
        assert!(config.ai.api_key.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Engage"
bind = "127.0.0.1:9000"

[telegram]
dev_mode = true
admin_ids = [42, 77]

[ai]
model = "test-model"
cache_ttl_seconds = 60

[game]
max_players = 8
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Engage");
        assert_eq!(config.site.bind, "127.0.0.1:9000");
        assert!(config.telegram.dev_mode);
        assert_eq!(config.telegram.admin_ids, vec![42, 77]);
        assert_eq!(config.ai.model, "test-model");
        assert_eq!(config.ai.cache_ttl_seconds, 60);
        assert_eq!(config.game.max_players, 8);
        // Defaults should still apply for unspecified values
        assert_eq!(config.game.min_players, 3);
        assert_eq!(config.quiz.max_questions, 10);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Engage");
        assert_eq!(config.rate_limit.votes_per_minute, 30);
    }
}
