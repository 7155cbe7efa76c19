//! Picks the most insightful comment on a content item with a hosted
//! language model.
//!
//! Only the five best-scored comments are sent. Any failure along the way
//! (no key, network, malformed reply, unknown id) means "nothing pinned".

use crate::app_config::AiConfig;
use crate::cache;
use crate::constants::PIN_CANDIDATE_LIMIT;
use crate::orm::content::ContentType;
use crate::orm::{comments, content};
use async_trait::async_trait;
use derive_more::Display;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Display)]
pub enum PinError {
    #[display(fmt = "Language model request failed: {}", _0)]
    Http(String),
    #[display(fmt = "Language model returned an unusable reply: {}", _0)]
    Malformed(String),
}

impl std::error::Error for PinError {}

/// Content kinds the prompt knows about. Challenges are presented as polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinContentType {
    Poll,
    Prediction,
}

impl From<ContentType> for PinContentType {
    fn from(t: ContentType) -> Self {
        match t {
            ContentType::Prediction => PinContentType::Prediction,
            ContentType::Poll | ContentType::Challenge => PinContentType::Poll,
        }
    }
}

impl PinContentType {
    fn as_str(&self) -> &'static str {
        match self {
            PinContentType::Poll => "poll",
            PinContentType::Prediction => "prediction",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PinCandidate {
    pub comment_id: i32,
    pub text: String,
    pub upvotes: i32,
    pub downvotes: i32,
}

impl PinCandidate {
    pub fn net_score(&self) -> i32 {
        self.upvotes - self.downvotes
    }
}

impl From<&comments::Model> for PinCandidate {
    fn from(c: &comments::Model) -> Self {
        Self {
            comment_id: c.id,
            text: c.text.clone(),
            upvotes: c.upvotes,
            downvotes: c.downvotes,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PinTopCommentInput {
    pub comments: Vec<PinCandidate>,
    pub content_type: PinContentType,
    pub content_id: i32,
}

/// Outcome of a pinning request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PinnedComment {
    pub pinned_comment_id: Option<i32>,
    pub reason: Option<String>,
}

impl PinnedComment {
    fn none(reason: Option<&str>) -> Self {
        Self {
            pinned_comment_id: None,
            reason: reason.map(str::to_owned),
        }
    }
}

/// A model that answers a prompt with one JSON object.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_json(&self, prompt: &str) -> Result<serde_json::Value, PinError>;
}

/// Application-wide model handle. `None` when pinning has no backend.
pub type SharedLanguageModel = Option<Arc<dyn LanguageModel>>;

/// Highest net score first, ties in original order, at most five.
pub fn select_candidates(mut comments: Vec<PinCandidate>) -> Vec<PinCandidate> {
    comments.sort_by(|a, b| b.net_score().cmp(&a.net_score()));
    comments.truncate(PIN_CANDIDATE_LIMIT);
    comments
}

pub fn render_prompt(input: &PinTopCommentInput) -> String {
    let mut prompt = format!(
        "Given a list of comments for a {} with ID {}, determine which comment is the most \
         insightful or helpful and should be pinned. Return the comment ID and the reason for \
         selecting it.\n\nComments:\n",
        input.content_type.as_str(),
        input.content_id
    );

    for c in &input.comments {
        prompt.push_str(&format!(
            "  - ID: {}\n    Text: {}\n    Upvotes: {}\n    Downvotes: {}\n",
            c.comment_id, c.text, c.upvotes, c.downvotes
        ));
    }

    prompt.push_str(
        "\nConsider factors such as the comment's relevance to the topic, the quality of its \
         reasoning, and its overall contribution to the discussion. If no comment is suitable \
         for pinning, return an empty pinnedCommentId.\n\n\
         Output in JSON format as {\"pinnedCommentId\": ..., \"reason\": ...}. The \
         pinnedCommentId should be null if no comment is suitable for pinning, and the reason \
         should explain your choice. If a pinnedCommentId is specified, the reason should not \
         be empty.\n",
    );
    prompt
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(rename = "pinnedCommentId", default)]
    pinned_comment_id: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
}

/// Models answer with the id as a number or a string.
fn reply_id(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Asks the model to pick among the top candidates. Errors mean the model
/// could not answer; a decision not to pin is `Ok`.
async fn try_pin_top_comment(
    model: &dyn LanguageModel,
    input: PinTopCommentInput,
) -> Result<PinnedComment, PinError> {
    if input.comments.is_empty() {
        return Ok(PinnedComment::none(Some("No comments to evaluate.")));
    }

    let input = PinTopCommentInput {
        comments: select_candidates(input.comments),
        ..input
    };
    let prompt = render_prompt(&input);

    let value = model.complete_json(&prompt).await?;
    let reply: ModelReply =
        serde_json::from_value(value).map_err(|e| PinError::Malformed(e.to_string()))?;

    let pinned = reply
        .pinned_comment_id
        .as_ref()
        .and_then(reply_id)
        .filter(|id| input.comments.iter().any(|c| c.comment_id == *id));

    Ok(match pinned {
        Some(id) => PinnedComment {
            pinned_comment_id: Some(id),
            reason: reply.reason.filter(|r| !r.trim().is_empty()),
        },
        None => {
            if reply.pinned_comment_id.is_some() {
                log::debug!(
                    "Discarding pinned id outside the candidates for content {}",
                    input.content_id
                );
            }
            PinnedComment::none(reply.reason.as_deref())
        }
    })
}

/// Any model failure is logged and reported as no pin.
pub async fn pin_top_comment(
    model: &dyn LanguageModel,
    input: PinTopCommentInput,
) -> PinnedComment {
    let content_id = input.content_id;
    try_pin_top_comment(model, input).await.unwrap_or_else(|e| {
        log::warn!("Pinning failed for content {}: {}", content_id, e);
        PinnedComment::none(None)
    })
}

/// Pinned comment for a content item, cached per item.
pub async fn pinned_for_content(
    db: &DatabaseConnection,
    model: Option<&dyn LanguageModel>,
    content_id: i32,
) -> Result<Option<PinnedComment>, DbErr> {
    if let Some(cached) = cache::get_pinned_comment(content_id) {
        return Ok(Some(cached));
    }

    let item = match content::Entity::find_by_id(content_id).one(db).await? {
        Some(item) => item,
        None => return Ok(None),
    };

    let model = match model {
        Some(model) => model,
        None => return Ok(Some(PinnedComment::none(None))),
    };

    let candidates: Vec<PinCandidate> = comments::Entity::find()
        .filter(comments::Column::ContentId.eq(content_id))
        .order_by_desc(comments::Column::CreatedAt)
        .all(db)
        .await?
        .iter()
        .map(PinCandidate::from)
        .collect();

    let input = PinTopCommentInput {
        comments: candidates,
        content_type: item.content_type.into(),
        content_id,
    };

    // Failures are not cached so the next request asks again.
    match try_pin_top_comment(model, input).await {
        Ok(pinned) => {
            cache::store_pinned_comment(content_id, pinned.clone());
            Ok(Some(pinned))
        }
        Err(e) => {
            log::warn!("Pinning failed for content {}: {}", content_id, e);
            Ok(Some(PinnedComment::none(None)))
        }
    }
}

/// OpenAI-compatible chat-completions client.
pub struct HttpLanguageModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpLanguageModel {
    /// `None` when no API key is configured.
    pub fn from_config(config: &AiConfig) -> Option<Self> {
        if config.api_key.trim().is_empty() {
            log::info!("No language model API key configured; comment pinning disabled");
            return None;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| log::error!("Failed to build language model client: {}", e))
            .ok()?;

        Some(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: serde_json::Value,
}

/// The first `{...}` span of a reply, for models that wrap JSON in prose.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete_json(&self, prompt: &str) -> Result<serde_json::Value, PinError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You moderate a comment section. Reply with one JSON object only.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PinError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PinError::Http(format!("status {}", response.status())));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PinError::Malformed(e.to_string()))?;

        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| PinError::Malformed("missing message content".to_owned()))?;

        let json = extract_json_object(content)
            .ok_or_else(|| PinError::Malformed(format!("no JSON object in {:?}", content)))?;

        serde_json::from_str(json).map_err(|e| PinError::Malformed(e.to_string()))
    }
}
