//! Test fixtures for creating test data
#![allow(dead_code)]

use engage::content::{ContentWithOptions, NewContentForm, NewOption};
use engage::identity::{self, TelegramIdentity};
use engage::orm::content::{Category, ContentType, Difficulty};
use engage::orm::users;
use sea_orm::{DatabaseConnection, DbErr};

/// Sign in a Telegram user, creating the row.
pub async fn create_test_user(
    db: &DatabaseConnection,
    telegram_id: i64,
    first_name: &str,
) -> Result<users::Model, DbErr> {
    let identity = TelegramIdentity {
        id: telegram_id,
        username: Some(format!("{}_tg", first_name.to_lowercase())),
        first_name: Some(first_name.to_string()),
        ..Default::default()
    };

    identity::authenticate(db, &identity)
        .await
        .map_err(|e| DbErr::Custom(format!("Sign-in failed: {}", e)))
}

fn options(texts: &[&str]) -> Vec<NewOption> {
    texts
        .iter()
        .map(|text| NewOption {
            text: text.to_string(),
            image_url: None,
        })
        .collect()
}

/// A poll with the given options.
pub async fn create_test_poll(
    db: &DatabaseConnection,
    question: &str,
    option_texts: &[&str],
) -> Result<ContentWithOptions, DbErr> {
    let form = NewContentForm {
        content_type: ContentType::Poll,
        category: Category::General,
        question: question.to_string(),
        options: options(option_texts),
        correct_option_index: None,
        difficulty: None,
        timeframe: None,
        ends_at: None,
    };
    engage::content::create_content(db, &form).await
}

/// A quiz challenge whose correct answer is `option_texts[correct]`.
pub async fn create_test_challenge(
    db: &DatabaseConnection,
    category: Category,
    question: &str,
    option_texts: &[&str],
    correct: usize,
) -> Result<ContentWithOptions, DbErr> {
    let form = NewContentForm {
        content_type: ContentType::Challenge,
        category,
        question: question.to_string(),
        options: options(option_texts),
        correct_option_index: Some(correct),
        difficulty: Some(Difficulty::Easy),
        timeframe: None,
        ends_at: None,
    };
    engage::content::create_content(db, &form).await
}
