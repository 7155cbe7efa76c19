//! Daily challenge and personal standing.

use crate::challenge::{self, DailyGate};
use crate::config::Config;
use crate::content;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use chrono::Utc;
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_daily)
        .service(complete_daily)
        .service(view_my_stats);
}

/// The gate plus, when still open today, a fresh set of questions.
#[get("/challenges/daily")]
pub async fn view_daily(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
) -> Result<impl Responder, Error> {
    let user = client.require_user()?;
    if !config.daily_challenge_enabled() {
        return Err(error::ErrorNotFound("The daily challenge is not available."));
    }

    let gate = challenge::daily_gate(user, Utc::now().naive_utc());
    let questions = match gate {
        DailyGate::Available => content::random_challenges(get_db_pool())
            .await
            .map_err(error::ErrorInternalServerError)?,
        DailyGate::CompletedToday => Vec::new(),
    };
    let quiz = crate::app_config::quiz();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "gate": gate,
        "questions": questions,
        "question_duration_seconds": quiz.question_duration_seconds,
        "correct_answer_points": quiz.correct_answer_points,
    })))
}

#[post("/challenges/daily/complete")]
pub async fn complete_daily(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
) -> Result<impl Responder, Error> {
    if !config.daily_challenge_enabled() {
        return Err(error::ErrorNotFound("The daily challenge is not available."));
    }
    let user_id = client.require_login()?;

    let completion =
        challenge::complete_daily_challenge(get_db_pool(), user_id, Utc::now().naive_utc())
            .await
            .map_err(|e| {
                log::error!("Failed to record daily challenge for user {}: {}", user_id, e);
                error::ErrorInternalServerError("Database error")
            })?
            .ok_or_else(|| error::ErrorNotFound("User not found."))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": completion })))
}

#[get("/users/me/stats")]
pub async fn view_my_stats(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let stats = challenge::user_global_stats(get_db_pool(), user_id).await;

    Ok(HttpResponse::Ok().json(stats))
}
