//! Polls, challenges and predictions
//!
//! Challenges are quiz questions: they carry a correct option and a
//! difficulty. Predictions may carry a timeframe and a closing date.

use crate::app_config;
use crate::constants::{DAILY_CHALLENGE_POOL, DAILY_CHALLENGE_QUESTIONS};
use crate::orm::content::{Category, ContentType, Difficulty, Timeframe};
use crate::orm::{content, content_options};
use chrono::Utc;
use rand::seq::SliceRandom;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};

/// Optional filters for content listings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContentFilter {
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContentWithOptions {
    #[serde(flatten)]
    pub content: content::Model,
    pub options: Vec<content_options::Model>,
}

impl ContentWithOptions {
    fn new(content: content::Model, mut options: Vec<content_options::Model>) -> Self {
        options.sort_by_key(|o| (o.display_order, o.id));
        Self { content, options }
    }

    pub fn is_quiz(&self) -> bool {
        self.content.correct_option_id.is_some()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OptionResult {
    #[serde(flatten)]
    pub option: content_options::Model,
    /// Share of all votes, 0..=100. Zero when nobody has voted.
    pub percentage: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContentDetail {
    #[serde(flatten)]
    pub content: content::Model,
    pub options: Vec<OptionResult>,
    pub total_votes: i64,
    pub is_quiz: bool,
}

impl From<ContentWithOptions> for ContentDetail {
    fn from(item: ContentWithOptions) -> Self {
        let is_quiz = item.is_quiz();
        let total_votes: i64 = item.options.iter().map(|o| o.vote_count as i64).sum();
        let options = item
            .options
            .into_iter()
            .map(|option| OptionResult {
                percentage: percentage(option.vote_count as i64, total_votes),
                option,
            })
            .collect();

        Self {
            content: item.content,
            options,
            total_votes,
            is_quiz,
        }
    }
}

pub fn percentage(votes: i64, total: i64) -> f64 {
    if total > 0 {
        votes as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

fn apply_filter(mut sel: Select<content::Entity>, filter: &ContentFilter) -> Select<content::Entity> {
    if let Some(content_type) = filter.content_type {
        sel = sel.filter(content::Column::ContentType.eq(content_type));
    }
    if let Some(category) = filter.category {
        sel = sel.filter(content::Column::Category.eq(category));
    }
    if let Some(difficulty) = filter.difficulty {
        sel = sel.filter(content::Column::Difficulty.eq(difficulty));
    }
    sel
}

/// Content matching the filter, newest first, with options in display order.
pub async fn list_content(
    db: &DatabaseConnection,
    filter: &ContentFilter,
) -> Result<Vec<ContentWithOptions>, DbErr> {
    let rows = apply_filter(content::Entity::find(), filter)
        .order_by_desc(content::Column::CreatedAt)
        .order_by_desc(content::Column::Id)
        .find_with_related(content_options::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(item, options)| ContentWithOptions::new(item, options))
        .collect())
}

pub async fn get_content(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<ContentDetail>, DbErr> {
    let item = match content::Entity::find_by_id(id).one(db).await? {
        Some(item) => item,
        None => return Ok(None),
    };
    let options = item.find_related(content_options::Entity).all(db).await?;

    Ok(Some(ContentWithOptions::new(item, options).into()))
}

/// Orders quiz categories with `islamic` first and the rest alphabetically.
pub fn order_categories(found: impl IntoIterator<Item = Category>) -> Vec<Category> {
    let unique: BTreeSet<&'static str> = found.into_iter().map(|c| c.as_str()).collect();
    let mut ordered: Vec<Category> = Vec::with_capacity(unique.len());

    if unique.contains(Category::Islamic.as_str()) {
        ordered.push(Category::Islamic);
    }
    for name in unique {
        if name == Category::Islamic.as_str() {
            continue;
        }
        if let Some(category) = Category::from_name(name) {
            ordered.push(category);
        }
    }
    ordered
}

/// Distinct categories that have at least one challenge.
pub async fn challenge_categories(db: &DatabaseConnection) -> Result<Vec<Category>, DbErr> {
    let challenges = content::Entity::find()
        .filter(content::Column::ContentType.eq(ContentType::Challenge))
        .all(db)
        .await?;

    Ok(order_categories(challenges.into_iter().map(|c| c.category)))
}

/// Shuffles candidates and keeps at most `max`.
pub fn shuffle_take<T>(mut items: Vec<T>, max: usize) -> Vec<T> {
    items.shuffle(&mut rand::thread_rng());
    items.truncate(max);
    items
}

/// A shuffled quiz round for one category and difficulty.
pub async fn quiz_questions(
    db: &DatabaseConnection,
    category: Category,
    difficulty: Difficulty,
) -> Result<Vec<ContentWithOptions>, DbErr> {
    let filter = ContentFilter {
        content_type: Some(ContentType::Challenge),
        category: Some(category),
        difficulty: Some(difficulty),
    };
    let all = list_content(db, &filter).await?;

    Ok(shuffle_take(all, app_config::quiz().max_questions as usize))
}

/// Questions for the daily challenge: a shuffled sample of the newest
/// non-islamic challenges.
pub async fn random_challenges(db: &DatabaseConnection) -> Result<Vec<ContentWithOptions>, DbErr> {
    let items = content::Entity::find()
        .filter(content::Column::ContentType.eq(ContentType::Challenge))
        .filter(content::Column::Category.ne(Category::Islamic))
        .order_by_desc(content::Column::CreatedAt)
        .limit(DAILY_CHALLENGE_POOL)
        .all(db)
        .await?;

    let picked = shuffle_take(items, DAILY_CHALLENGE_QUESTIONS);
    let ids: Vec<i32> = picked.iter().map(|c| c.id).collect();

    let options = content_options::Entity::find()
        .filter(content_options::Column::ContentId.is_in(ids))
        .all(db)
        .await?;

    Ok(picked
        .into_iter()
        .map(|item| {
            let own = options
                .iter()
                .filter(|o| o.content_id == item.id)
                .cloned()
                .collect();
            ContentWithOptions::new(item, own)
        })
        .collect())
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewOption {
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Admin submission for a new content item.
#[derive(Clone, Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_new_content", skip_on_field_errors = false))]
pub struct NewContentForm {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub category: Category,
    #[validate(length(min = 10, message = "Question must be at least 10 characters."))]
    pub question: String,
    pub options: Vec<NewOption>,
    /// Index into `options` of the correct answer (challenges).
    pub correct_option_index: Option<usize>,
    pub difficulty: Option<Difficulty>,
    pub timeframe: Option<Timeframe>,
    pub ends_at: Option<chrono::NaiveDateTime>,
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_new_content(form: &NewContentForm) -> Result<(), ValidationError> {
    if form.options.len() < 2 {
        return Err(invalid("options", "At least two options are required."));
    }
    if form.options.iter().any(|o| o.text.trim().is_empty()) {
        return Err(invalid("options", "Option text is required."));
    }
    for option in &form.options {
        if let Some(url) = option.image_url.as_deref().filter(|u| !u.is_empty()) {
            if !validator::validate_url(url) {
                return Err(invalid("image_url", "Image URL must be a valid URL."));
            }
        }
    }
    if form.content_type == ContentType::Challenge {
        let has_correct = form
            .correct_option_index
            .map(|i| i < form.options.len())
            .unwrap_or(false);
        if !has_correct || form.difficulty.is_none() {
            return Err(invalid(
                "correct_option_index",
                "Challenges need a correct answer and a difficulty.",
            ));
        }
    }
    Ok(())
}

/// Inserts a validated item with its options and returns it.
pub async fn create_content(
    db: &DatabaseConnection,
    form: &NewContentForm,
) -> Result<ContentWithOptions, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let item = content::ActiveModel {
        content_type: Set(form.content_type),
        category: Set(form.category),
        question: Set(form.question.trim().to_owned()),
        correct_option_id: Set(None),
        difficulty: Set(form.difficulty),
        timeframe: Set(form.timeframe),
        ends_at: Set(form.ends_at),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut options = Vec::with_capacity(form.options.len());
    for (order, option) in form.options.iter().enumerate() {
        let inserted = content_options::ActiveModel {
            content_id: Set(item.id),
            option_text: Set(option.text.trim().to_owned()),
            image_url: Set(option.image_url.clone().filter(|u| !u.is_empty())),
            display_order: Set(order as i32),
            vote_count: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        options.push(inserted);
    }

    let item = match form
        .correct_option_index
        .and_then(|i| options.get(i))
        .filter(|_| form.content_type == ContentType::Challenge)
    {
        Some(correct) => {
            let mut active: content::ActiveModel = item.into();
            active.correct_option_id = Set(Some(correct.id));
            active.update(&txn).await?
        }
        None => item,
    };

    txn.commit().await?;
    log::info!(
        "Created {:?} content {} with {} options",
        item.content_type,
        item.id,
        options.len()
    );

    Ok(ContentWithOptions::new(item, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: i32, order: i32, votes: i32) -> content_options::Model {
        content_options::Model {
            id,
            content_id: 1,
            option_text: format!("option {}", id),
            image_url: None,
            display_order: order,
            vote_count: votes,
        }
    }

    fn item(correct: Option<i32>) -> content::Model {
        content::Model {
            id: 1,
            content_type: ContentType::Poll,
            category: Category::Tech,
            question: "Which editor do you use?".to_owned(),
            correct_option_id: correct,
            difficulty: None,
            timeframe: None,
            ends_at: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn form(content_type: ContentType) -> NewContentForm {
        NewContentForm {
            content_type,
            category: Category::General,
            question: "What is the capital of Australia?".to_owned(),
            options: vec![
                NewOption {
                    text: "Sydney".to_owned(),
                    image_url: None,
                },
                NewOption {
                    text: "Canberra".to_owned(),
                    image_url: Some(String::new()),
                },
            ],
            correct_option_index: None,
            difficulty: None,
            timeframe: None,
            ends_at: None,
        }
    }

    #[test]
    fn test_percentages_with_zero_votes() {
        let detail: ContentDetail =
            ContentWithOptions::new(item(None), vec![option(1, 0, 0), option(2, 1, 0)]).into();
        assert_eq!(detail.total_votes, 0);
        assert!(detail.options.iter().all(|o| o.percentage == 0.0));
        assert!(!detail.is_quiz);
    }

    #[test]
    fn test_percentages_and_option_order() {
        let detail: ContentDetail =
            ContentWithOptions::new(item(Some(2)), vec![option(2, 1, 3), option(1, 0, 1)]).into();
        assert_eq!(detail.total_votes, 4);
        assert_eq!(detail.options[0].option.id, 1);
        assert_eq!(detail.options[0].percentage, 25.0);
        assert_eq!(detail.options[1].percentage, 75.0);
        assert!(detail.is_quiz);
    }

    #[test]
    fn test_islamic_category_first_then_alphabetical() {
        let ordered = order_categories(vec![
            Category::Tech,
            Category::Islamic,
            Category::Math,
            Category::Tech,
            Category::General,
        ]);
        assert_eq!(
            ordered,
            vec![
                Category::Islamic,
                Category::General,
                Category::Math,
                Category::Tech
            ]
        );
    }

    #[test]
    fn test_category_order_without_islamic() {
        let ordered = order_categories(vec![Category::Sports, Category::Games]);
        assert_eq!(ordered, vec![Category::Games, Category::Sports]);
    }

    #[test]
    fn test_shuffle_take_caps_length() {
        let picked = shuffle_take((0..25).collect(), 10);
        assert_eq!(picked.len(), 10);
        let picked = shuffle_take(vec![1, 2], 10);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_poll_form_is_valid() {
        assert!(form(ContentType::Poll).validate().is_ok());
    }

    #[test]
    fn test_short_question_rejected() {
        let mut f = form(ContentType::Poll);
        f.question = "Too short".to_owned();
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_single_option_rejected() {
        let mut f = form(ContentType::Poll);
        f.options.truncate(1);
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_bad_image_url_rejected() {
        let mut f = form(ContentType::Poll);
        f.options[0].image_url = Some("not a url".to_owned());
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_challenge_needs_answer_and_difficulty() {
        let mut f = form(ContentType::Challenge);
        assert!(f.validate().is_err());

        f.correct_option_index = Some(1);
        assert!(f.validate().is_err());

        f.difficulty = Some(Difficulty::Easy);
        assert!(f.validate().is_ok());

        f.correct_option_index = Some(5);
        assert!(f.validate().is_err());
    }
}
