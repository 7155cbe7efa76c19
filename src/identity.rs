//! Telegram sign-in
//!
//! The Mini-App hands us the `initData` string Telegram gave it. With a bot
//! token configured its HMAC signature is checked before the claims are
//! trusted. A user row is created on first sign-in and refreshed on every
//! later one.

use crate::app_config::{self, TelegramConfig};
use crate::constants::DEFAULT_FIRST_NAME;
use crate::orm::users;
use chrono::{DateTime, Utc};
use derive_more::Display;
use hmac::{Hmac, Mac};
use sea_orm::{DatabaseConnection, DbBackend, DbErr, EntityTrait, Statement};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Identity claims supplied by the Telegram client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramIdentity {
    #[serde(default)]
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Display)]
pub enum AuthError {
    #[display(fmt = "No Telegram identity was supplied")]
    MissingIdentity,
    #[display(fmt = "Telegram sign-in could not be verified: {}", _0)]
    Unverified(InitDataError),
    #[display(fmt = "Database error during sign-in: {}", _0)]
    Database(DbErr),
}

impl std::error::Error for AuthError {}

impl From<DbErr> for AuthError {
    fn from(e: DbErr) -> Self {
        AuthError::Database(e)
    }
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum InitDataError {
    #[display(fmt = "no signed initData was supplied")]
    Missing,
    #[display(fmt = "initData has no hash")]
    MissingHash,
    #[display(fmt = "initData signature does not match")]
    BadSignature,
    #[display(fmt = "initData is older than {} seconds", _0)]
    Expired(i64),
    #[display(fmt = "initData has no user")]
    MissingUser,
    #[display(fmt = "initData user is malformed: {}", _0)]
    MalformedUser(String),
}

impl std::error::Error for InitDataError {}

/// Body of `POST /auth/telegram`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SignInRequest {
    /// Raw `Telegram.WebApp.initData` query string.
    pub init_data: Option<String>,
    /// Unsigned `initDataUnsafe.user`. Ignored when a bot token is configured.
    pub user: Option<TelegramIdentity>,
}

/// Identity to sign in, and whether Telegram vouched for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: TelegramIdentity,
    pub verified: bool,
}

/// Fixed identity used when `telegram.dev_mode` is on and the client sends none.
pub fn mock_identity() -> TelegramIdentity {
    TelegramIdentity {
        id: 999_888_777,
        username: Some("dev_admin".to_owned()),
        first_name: Some("App Developer".to_owned()),
        last_name: None,
        photo_url: Some("https://picsum.photos/seed/dev/200/200".to_owned()),
    }
}

/// Telegram sends empty strings for some unset fields.
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Creates or refreshes the user row for a Telegram identity and returns it.
pub async fn authenticate(
    db: &DatabaseConnection,
    identity: &TelegramIdentity,
) -> Result<users::Model, AuthError> {
    if identity.id == 0 {
        return Err(AuthError::MissingIdentity);
    }

    let first_name =
        non_empty(&identity.first_name).unwrap_or_else(|| DEFAULT_FIRST_NAME.to_owned());

    // Points and daily-challenge state are left untouched on conflict.
    let user = users::Entity::find()
        .from_raw_sql(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO users (telegram_id, username, first_name, last_name, photo_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (telegram_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                photo_url = EXCLUDED.photo_url,
                updated_at = NOW()
            RETURNING *
            "#,
            vec![
                identity.id.into(),
                non_empty(&identity.username).into(),
                first_name.into(),
                non_empty(&identity.last_name).into(),
                non_empty(&identity.photo_url).into(),
            ],
        ))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("upserted user".to_owned()))?;

    log::debug!(
        "Authenticated telegram_id={} as user {}",
        identity.id,
        user.id
    );

    Ok(user)
}

/// HMAC-SHA256 of the sorted `key=value` lines, keyed by
/// HMAC-SHA256("WebAppData", bot_token).
fn init_data_mac(bot_token: &str, fields: &[(String, String)]) -> Result<HmacSha256, InitDataError> {
    let mut secret =
        HmacSha256::new_from_slice(b"WebAppData").map_err(|_| InitDataError::BadSignature)?;
    secret.update(bot_token.as_bytes());
    let secret_key = secret.finalize().into_bytes();

    let data_check_string = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n");

    let mut mac =
        HmacSha256::new_from_slice(&secret_key).map_err(|_| InitDataError::BadSignature)?;
    mac.update(data_check_string.as_bytes());
    Ok(mac)
}

/// Splits `initData` into its hash and the remaining fields, sorted by key.
fn split_init_data(init_data: &str) -> (Option<String>, Vec<(String, String)>) {
    let mut hash = None;
    let mut fields = Vec::new();
    for (key, value) in url::form_urlencoded::parse(init_data.as_bytes()) {
        if key == "hash" {
            hash = Some(value.into_owned());
        } else {
            fields.push((key.into_owned(), value.into_owned()));
        }
    }
    fields.sort();
    (hash, fields)
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn parse_user(fields: &[(String, String)]) -> Result<TelegramIdentity, InitDataError> {
    let user = field(fields, "user").ok_or(InitDataError::MissingUser)?;
    serde_json::from_str(user).map_err(|e| InitDataError::MalformedUser(e.to_string()))
}

/// Checks the `initData` signature and freshness and returns its user.
pub fn verify_init_data(
    init_data: &str,
    bot_token: &str,
    max_age_seconds: i64,
    now: DateTime<Utc>,
) -> Result<TelegramIdentity, InitDataError> {
    let (hash, fields) = split_init_data(init_data);
    let hash = hash.ok_or(InitDataError::MissingHash)?;
    let expected = hex::decode(hash).map_err(|_| InitDataError::BadSignature)?;

    init_data_mac(bot_token, &fields)?
        .verify_slice(&expected)
        .map_err(|_| InitDataError::BadSignature)?;

    let auth_date = field(&fields, "auth_date")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    if now.timestamp() - auth_date > max_age_seconds {
        return Err(InitDataError::Expired(max_age_seconds));
    }

    parse_user(&fields)
}

/// Resolves the identity for a sign-in request.
///
/// With a bot token only signed `initData` is accepted. Without one the
/// claims are taken as given and the session is unverified. In dev mode an
/// absent identity becomes the mock developer.
pub fn resolve_identity(
    request: SignInRequest,
    telegram: &TelegramConfig,
    now: DateTime<Utc>,
) -> Result<ResolvedIdentity, AuthError> {
    let init_data = request.init_data.filter(|s| !s.trim().is_empty());

    let supplied = if telegram.bot_token.is_empty() {
        request.user.or_else(|| {
            init_data
                .as_deref()
                .and_then(|data| parse_user(&split_init_data(data).1).ok())
        })
    } else {
        match init_data {
            Some(data) => {
                let identity = verify_init_data(
                    &data,
                    &telegram.bot_token,
                    telegram.init_data_max_age_seconds,
                    now,
                )
                .map_err(AuthError::Unverified)?;
                return Ok(ResolvedIdentity {
                    identity,
                    verified: true,
                });
            }
            None if telegram.dev_mode => None,
            None => return Err(AuthError::Unverified(InitDataError::Missing)),
        }
    };

    match supplied {
        Some(identity) if identity.id != 0 => Ok(ResolvedIdentity {
            identity,
            verified: false,
        }),
        _ if telegram.dev_mode => Ok(ResolvedIdentity {
            identity: mock_identity(),
            verified: true,
        }),
        _ => Err(AuthError::MissingIdentity),
    }
}

/// Whether a user is listed as an admin. Callers also require a verified session.
pub fn is_admin(user: &users::Model) -> bool {
    app_config::telegram()
        .admin_ids
        .contains(&user.telegram_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_identity_is_stable() {
        let identity = mock_identity();
        assert_eq!(identity.id, 999_888_777);
        assert_eq!(identity.username.as_deref(), Some("dev_admin"));
        assert_eq!(identity, mock_identity());
    }

    #[test]
    fn test_non_empty_trims_blank_fields() {
        assert_eq!(non_empty(&Some("  ".to_owned())), None);
        assert_eq!(non_empty(&None), None);
        assert_eq!(non_empty(&Some(" bob ".to_owned())), Some("bob".to_owned()));
    }

    const BOT_TOKEN: &str = "123456:TEST-TOKEN";
    const USER_JSON: &str = r#"{"id":4242,"first_name":"Noor","username":"noor"}"#;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_100, 0).unwrap()
    }

    /// Builds `initData` the way Telegram signs it.
    fn signed_init_data(bot_token: &str, user: &str, auth_date: i64) -> String {
        let mut fields = vec![
            ("auth_date".to_owned(), auth_date.to_string()),
            ("query_id".to_owned(), "AAHdF6IQ".to_owned()),
            ("user".to_owned(), user.to_owned()),
        ];
        fields.sort();
        let hash = hex::encode(
            init_data_mac(bot_token, &fields)
                .unwrap()
                .finalize()
                .into_bytes(),
        );
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .append_pair("hash", &hash)
            .finish()
    }

    fn signed_config() -> TelegramConfig {
        TelegramConfig {
            bot_token: BOT_TOKEN.to_owned(),
            admin_ids: vec![4242],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_init_data_is_verified() {
        let request = SignInRequest {
            init_data: Some(signed_init_data(BOT_TOKEN, USER_JSON, 1_700_000_000)),
            user: None,
        };
        let resolved = resolve_identity(request, &signed_config(), now()).unwrap();
        assert!(resolved.verified);
        assert_eq!(resolved.identity.id, 4242);
        assert_eq!(resolved.identity.first_name.as_deref(), Some("Noor"));
    }

    #[test]
    fn test_forged_init_data_is_rejected() {
        let genuine = signed_init_data(BOT_TOKEN, USER_JSON, 1_700_000_000);
        let forged_user = r#"{"id":1,"first_name":"Mallory"}"#;
        let forged = genuine.replace(
            &url::form_urlencoded::byte_serialize(USER_JSON.as_bytes()).collect::<String>(),
            &url::form_urlencoded::byte_serialize(forged_user.as_bytes()).collect::<String>(),
        );
        assert_ne!(forged, genuine);
        assert_eq!(
            verify_init_data(&forged, BOT_TOKEN, 86_400, now()),
            Err(InitDataError::BadSignature)
        );

        let other_bot = signed_init_data("999:OTHER", USER_JSON, 1_700_000_000);
        assert_eq!(
            verify_init_data(&other_bot, BOT_TOKEN, 86_400, now()),
            Err(InitDataError::BadSignature)
        );

        let unsigned = "user=%7B%22id%22%3A4242%7D&auth_date=1700000000";
        assert_eq!(
            verify_init_data(unsigned, BOT_TOKEN, 86_400, now()),
            Err(InitDataError::MissingHash)
        );
    }

    #[test]
    fn test_stale_init_data_is_rejected() {
        let stale = signed_init_data(BOT_TOKEN, USER_JSON, 1_600_000_000);
        assert_eq!(
            verify_init_data(&stale, BOT_TOKEN, 86_400, now()),
            Err(InitDataError::Expired(86_400))
        );
    }

    #[test]
    fn test_bot_token_ignores_unsigned_user() {
        let request = SignInRequest {
            init_data: None,
            user: Some(TelegramIdentity {
                id: 4242,
                ..Default::default()
            }),
        };
        let result = resolve_identity(request, &signed_config(), now());
        assert!(matches!(
            result,
            Err(AuthError::Unverified(InitDataError::Missing))
        ));
    }

    #[test]
    fn test_without_bot_token_claims_are_unverified() {
        let supplied = TelegramIdentity {
            id: 5,
            first_name: Some("Ann".to_owned()),
            ..Default::default()
        };
        let request = SignInRequest {
            init_data: None,
            user: Some(supplied.clone()),
        };
        let resolved = resolve_identity(request, &TelegramConfig::default(), now()).unwrap();
        assert_eq!(resolved.identity, supplied);
        assert!(!resolved.verified);

        let request = SignInRequest {
            init_data: Some("user=%7B%22id%22%3A6%7D".to_owned()),
            user: None,
        };
        let resolved = resolve_identity(request, &TelegramConfig::default(), now()).unwrap();
        assert_eq!(resolved.identity.id, 6);
        assert!(!resolved.verified);
    }

    #[test]
    fn test_missing_identity_outside_dev_mode() {
        let config = TelegramConfig::default();
        assert!(matches!(
            resolve_identity(SignInRequest::default(), &config, now()),
            Err(AuthError::MissingIdentity)
        ));

        let dev = TelegramConfig {
            dev_mode: true,
            ..Default::default()
        };
        let resolved = resolve_identity(SignInRequest::default(), &dev, now()).unwrap();
        assert_eq!(resolved.identity, mock_identity());
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(
            AuthError::MissingIdentity.to_string(),
            "No Telegram identity was supplied"
        );
    }
}
