use crate::cache;
use crate::comments::{self, CommentError, CommentSort};
use crate::config::Config;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::comment_votes::VoteDirection;
use crate::pinning::{self, PinnedComment, SharedLanguageModel};
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_pinned_comment)
        .service(view_comments)
        .service(create_comment)
        .service(vote_on_comment)
        .service(view_my_comment_votes);
}

fn comment_error(e: CommentError) -> Error {
    match e {
        CommentError::Empty | CommentError::TooLong => error::ErrorBadRequest(e.to_string()),
        CommentError::ContentNotFound | CommentError::CommentNotFound => {
            error::ErrorNotFound(e.to_string())
        }
        CommentError::Database(_) => {
            log::error!("Comment operation failed: {}", e);
            error::ErrorInternalServerError(e.to_string())
        }
    }
}

#[derive(Deserialize)]
pub struct CommentQuery {
    #[serde(default)]
    pub sort: CommentSort,
}

/// Comments in the requested order. A known pinned comment is listed first.
#[get("/content/{id}/comments")]
pub async fn view_comments(
    path: web::Path<i32>,
    query: web::Query<CommentQuery>,
) -> Result<impl Responder, Error> {
    let content_id = path.into_inner();
    let list = comments::list_comments(get_db_pool(), content_id, query.sort)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let pinned_id = cache::get_pinned_comment(content_id).and_then(|p| p.pinned_comment_id);

    Ok(HttpResponse::Ok().json(comments::pinned_order(list, pinned_id)))
}

#[derive(Deserialize)]
pub struct NewCommentForm {
    pub text: String,
}

#[post("/content/{id}/comments")]
pub async fn create_comment(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Json<NewCommentForm>,
) -> Result<impl Responder, Error> {
    let user = client.require_user()?;
    let content_id = path.into_inner();

    if let Err(e) = crate::rate_limit::check_comment_rate_limit(user.id) {
        log::warn!("Rate limit exceeded for comments: user_id={}", user.id);
        return Err(error::ErrorTooManyRequests(format!(
            "You're commenting too quickly. Please wait {} seconds.",
            e.retry_after_seconds
        )));
    }

    let comment = comments::add_comment(get_db_pool(), user, content_id, &form.text)
        .await
        .map_err(comment_error)?;

    // A new comment may deserve the pin.
    cache::invalidate_pinned_comment(content_id);

    Ok(HttpResponse::Created().json(comment))
}

#[derive(Deserialize)]
pub struct CommentVoteForm {
    pub direction: VoteDirection,
}

#[post("/comments/{id}/vote")]
pub async fn vote_on_comment(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Json<CommentVoteForm>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let comment_id = path.into_inner();

    if let Err(e) = crate::rate_limit::check_comment_vote_rate_limit(user_id) {
        log::warn!("Rate limit exceeded for comment votes: user_id={}", user_id);
        return Err(error::ErrorTooManyRequests(format!(
            "You're voting too quickly. Please wait {} seconds.",
            e.retry_after_seconds
        )));
    }

    let result = comments::apply_comment_vote(get_db_pool(), user_id, comment_id, form.direction)
        .await
        .map_err(comment_error)?;

    Ok(HttpResponse::Ok().json(result))
}

/// `comment_id -> direction` for the signed-in user.
#[get("/comments/votes/mine")]
pub async fn view_my_comment_votes(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let map = comments::user_comment_votes(get_db_pool(), user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(map))
}

#[get("/content/{id}/comments/pinned")]
pub async fn view_pinned_comment(
    req: HttpRequest,
    path: web::Path<i32>,
    config: web::Data<Arc<Config>>,
    model: web::Data<SharedLanguageModel>,
) -> Result<impl Responder, Error> {
    let content_id = path.into_inner();

    if !config.comment_pinning_enabled() {
        return Ok(HttpResponse::Ok().json(PinnedComment::default()));
    }

    let ip = crate::ip::client_ip_or_unknown(&req);
    if let Err(e) = crate::rate_limit::check_pinning_rate_limit(&ip) {
        log::warn!("Rate limit exceeded for pinned comments: ip={}", ip);
        return Err(error::ErrorTooManyRequests(format!(
            "Too many requests. Please wait {} seconds.",
            e.retry_after_seconds
        )));
    }

    let pinned = pinning::pinned_for_content(get_db_pool(), model.as_deref(), content_id)
        .await
        .map_err(|e| {
            log::error!("Failed to load comments for pinning: {}", e);
            error::ErrorInternalServerError("Database error")
        })?
        .ok_or_else(|| error::ErrorNotFound("Content not found."))?;

    Ok(HttpResponse::Ok().json(pinned))
}
