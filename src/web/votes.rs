use crate::constants::USER_ALREADY_VOTED;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::votes::{self, VoteError, VoteOutcome};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(cast_vote).service(view_my_votes);
}

#[derive(Deserialize)]
pub struct VoteForm {
    pub option_id: i32,
}

#[post("/content/{id}/vote")]
pub async fn cast_vote(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Json<VoteForm>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let content_id = path.into_inner();

    if let Err(e) = crate::rate_limit::check_vote_rate_limit(user_id) {
        log::warn!("Rate limit exceeded for votes: user_id={}", user_id);
        return Err(error::ErrorTooManyRequests(format!(
            "You're voting too quickly. Please wait {} seconds.",
            e.retry_after_seconds
        )));
    }

    let outcome = votes::cast_vote(get_db_pool(), user_id, content_id, form.option_id)
        .await
        .map_err(|e| match e {
            VoteError::ContentNotFound => error::ErrorNotFound(e.to_string()),
            VoteError::InvalidOption => error::ErrorBadRequest(e.to_string()),
            VoteError::Closed => error::ErrorForbidden(e.to_string()),
            VoteError::Database(_) => {
                log::error!("Vote failed on content {}: {}", content_id, e);
                error::ErrorInternalServerError(e.to_string())
            }
        })?;

    Ok(match outcome {
        VoteOutcome::AlreadyVoted => HttpResponse::Conflict().json(serde_json::json!({
            "status": "already_voted",
            "error": outcome.sentinel().unwrap_or(USER_ALREADY_VOTED),
        })),
        VoteOutcome::Recorded { .. } => HttpResponse::Ok().json(outcome),
    })
}

/// `content_id -> option_id` for the signed-in user.
#[get("/votes/mine")]
pub async fn view_my_votes(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let map = votes::user_vote_map(get_db_pool(), user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(map))
}
