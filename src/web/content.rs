//! Content listings and quiz rounds.

use crate::content::{self, ContentFilter};
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::content::{Category, ContentType, Difficulty};
use crate::votes;
use actix_web::{error, get, web, Error, HttpResponse, Responder};
use serde::Deserialize;
use std::collections::HashMap;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_content_list)
        .service(view_content)
        .service(view_quiz_categories)
        .service(view_quiz)
        .service(view_predictions);
}

#[get("/content")]
pub async fn view_content_list(query: web::Query<ContentFilter>) -> Result<impl Responder, Error> {
    let items = content::list_content(get_db_pool(), &query)
        .await
        .map_err(|e| {
            log::error!("Failed to list content: {}", e);
            error::ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(items))
}

#[get("/content/{id}")]
pub async fn view_content(path: web::Path<i32>) -> Result<impl Responder, Error> {
    let id = path.into_inner();
    let item = content::get_content(get_db_pool(), id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Content not found."))?;

    Ok(HttpResponse::Ok().json(item))
}

#[get("/quizzes/categories")]
pub async fn view_quiz_categories() -> Result<impl Responder, Error> {
    let categories = content::challenge_categories(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(categories))
}

#[derive(Deserialize)]
pub struct QuizQuery {
    pub category: Category,
    pub difficulty: Difficulty,
}

#[get("/quizzes")]
pub async fn view_quiz(query: web::Query<QuizQuery>) -> Result<impl Responder, Error> {
    let questions = content::quiz_questions(get_db_pool(), query.category, query.difficulty)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let quiz = crate::app_config::quiz();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "questions": questions,
        "question_duration_seconds": quiz.question_duration_seconds,
        "correct_answer_points": quiz.correct_answer_points,
    })))
}

/// Predictions plus the caller's earlier picks, keyed by content id.
#[get("/predictions")]
pub async fn view_predictions(client: ClientCtx) -> Result<impl Responder, Error> {
    let db = get_db_pool();
    let filter = ContentFilter {
        content_type: Some(ContentType::Prediction),
        ..Default::default()
    };

    let items = content::list_content(db, &filter)
        .await
        .map_err(error::ErrorInternalServerError)?;

    let user_votes = match client.get_id() {
        Some(user_id) => votes::user_vote_map(db, user_id)
            .await
            .map_err(error::ErrorInternalServerError)?,
        None => HashMap::new(),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "items": items,
        "user_votes": user_votes,
    })))
}
