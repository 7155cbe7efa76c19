//! Runtime settings stored in the database
//!
//! Settings and feature flags are loaded on startup and cached in memory.
//! Admin endpoints may change them at runtime; the cache is updated in place.

use crate::orm::{feature_flags, setting_history, settings};
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Feature flag gating the AI comment pinning endpoint.
pub const FLAG_COMMENT_PINNING: &str = "comment_pinning";
/// Feature flag gating the daily challenge.
pub const FLAG_DAILY_CHALLENGE: &str = "daily_challenge";

/// Represents a typed setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Bool(bool),
    Json(serde_json::Value),
}

impl SettingValue {
    /// Parse a string value based on the value_type column
    pub fn parse(value: &str, value_type: &str) -> Option<Self> {
        match value_type {
            "string" => Some(SettingValue::String(value.to_string())),
            "int" => value.parse().ok().map(SettingValue::Int),
            "bool" => value.parse().ok().map(SettingValue::Bool),
            "json" => serde_json::from_str(value).ok().map(SettingValue::Json),
            _ => None,
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Json(j) => j.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::String(_) => "string",
            SettingValue::Int(_) => "int",
            SettingValue::Bool(_) => "bool",
            SettingValue::Json(_) => "json",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Settings cache
pub struct Config {
    settings: DashMap<String, SettingValue>,
    feature_flags: DashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            settings: DashMap::new(),
            feature_flags: DashMap::new(),
        }
    }

    /// Load all settings and feature flags from the database
    pub async fn load_from_database(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        for setting in settings::Entity::find().all(db).await? {
            match SettingValue::parse(&setting.value, &setting.value_type) {
                Some(value) => {
                    self.settings.insert(setting.key, value);
                }
                None => log::warn!(
                    "Ignoring setting {} with unparseable {} value",
                    setting.key,
                    setting.value_type
                ),
            }
        }

        for flag in feature_flags::Entity::find().all(db).await? {
            self.feature_flags.insert(flag.key, flag.enabled);
        }

        log::info!(
            "Loaded {} settings and {} feature flags from database",
            self.settings.len(),
            self.feature_flags.len()
        );

        Ok(())
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.settings.get(key).and_then(|v| v.as_int())
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.settings
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Feature flags missing from the database count as enabled.
    pub fn is_feature_enabled(&self, key: &str) -> bool {
        self.feature_flags.get(key).map(|v| *v).unwrap_or(true)
    }

    /// Insert a value into the cache without touching the database.
    pub fn set_cached(&self, key: &str, value: SettingValue) {
        self.settings.insert(key.to_string(), value);
    }

    /// Set a feature flag in the cache without touching the database.
    pub fn set_flag_cached(&self, key: &str, enabled: bool) {
        self.feature_flags.insert(key.to_string(), enabled);
    }

    /// Update a setting value, recording the previous value in history
    pub async fn set_value(
        &self,
        db: &DatabaseConnection,
        key: &str,
        value: SettingValue,
        user_id: Option<i32>,
    ) -> Result<(), DbErr> {
        let old_setting = settings::Entity::find_by_id(key.to_string()).one(db).await?;
        let value_str = value.to_string_value();
        let now = Utc::now().naive_utc();

        match old_setting {
            Some(old) => {
                settings::Entity::update_many()
                    .col_expr(settings::Column::Value, Expr::value(value_str.clone()))
                    .col_expr(settings::Column::UpdatedAt, Expr::value(now))
                    .col_expr(settings::Column::UpdatedBy, Expr::value(user_id))
                    .filter(settings::Column::Key.eq(key))
                    .exec(db)
                    .await?;

                setting_history::ActiveModel {
                    setting_key: Set(key.to_string()),
                    old_value: Set(Some(old.value)),
                    new_value: Set(value_str),
                    changed_by: Set(user_id),
                    changed_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await?;
            }
            None => {
                settings::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value_str),
                    value_type: Set(value.type_name().to_string()),
                    updated_at: Set(now),
                    updated_by: Set(user_id),
                }
                .insert(db)
                .await?;
            }
        }

        self.settings.insert(key.to_string(), value);

        Ok(())
    }

    /// Toggle a feature flag
    pub async fn set_feature_flag(
        &self,
        db: &DatabaseConnection,
        key: &str,
        enabled: bool,
    ) -> Result<(), DbErr> {
        let existing = feature_flags::Entity::find_by_id(key.to_string())
            .one(db)
            .await?;
        let now = Utc::now().naive_utc();

        if existing.is_some() {
            feature_flags::Entity::update_many()
                .col_expr(feature_flags::Column::Enabled, Expr::value(enabled))
                .col_expr(feature_flags::Column::UpdatedAt, Expr::value(now))
                .filter(feature_flags::Column::Key.eq(key))
                .exec(db)
                .await?;
        } else {
            feature_flags::ActiveModel {
                key: Set(key.to_string()),
                enabled: Set(enabled),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
        }

        self.feature_flags.insert(key.to_string(), enabled);
        log::info!("Feature flag {} set to {}", key, enabled);

        Ok(())
    }

    pub async fn get_all_feature_flags(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Vec<feature_flags::Model>, DbErr> {
        feature_flags::Entity::find()
            .order_by_asc(feature_flags::Column::Key)
            .all(db)
            .await
    }

    pub async fn get_setting_history(
        &self,
        db: &DatabaseConnection,
        key: &str,
        limit: u64,
    ) -> Result<Vec<setting_history::Model>, DbErr> {
        setting_history::Entity::find()
            .filter(setting_history::Column::SettingKey.eq(key))
            .order_by_desc(setting_history::Column::ChangedAt)
            .limit(limit)
            .all(db)
            .await
    }

    pub fn comment_pinning_enabled(&self) -> bool {
        self.is_feature_enabled(FLAG_COMMENT_PINNING)
    }

    pub fn daily_challenge_enabled(&self) -> bool {
        self.is_feature_enabled(FLAG_DAILY_CHALLENGE)
    }

    /// Allow users to award themselves negative amounts (penalties)
    pub fn allow_negative_awards(&self) -> bool {
        self.get_bool_or("allow_negative_awards", false)
    }
}

/// Create a new Arc-wrapped Config
pub fn create_config() -> Arc<Config> {
    Arc::new(Config::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_values() {
        assert_eq!(SettingValue::parse("42", "int"), Some(SettingValue::Int(42)));
        assert_eq!(
            SettingValue::parse("true", "bool"),
            Some(SettingValue::Bool(true))
        );
        assert_eq!(SettingValue::parse("nope", "int"), None);
        assert_eq!(SettingValue::parse("x", "unknown"), None);
    }

    #[test]
    fn test_missing_flags_default_to_enabled() {
        let config = Config::new();
        assert!(config.comment_pinning_enabled());
        assert!(config.daily_challenge_enabled());
    }

    #[test]
    fn test_cached_values_override_defaults() {
        let config = Config::new();
        assert!(!config.allow_negative_awards());
        config.set_cached("allow_negative_awards", SettingValue::Bool(true));
        assert!(config.allow_negative_awards());
        assert_eq!(config.get_int_or("missing", 7), 7);
    }
}
