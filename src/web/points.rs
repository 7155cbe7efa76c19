use crate::config::Config;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::points::{self, LedgerError, PointsPreview};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const HISTORY_LIMIT: u64 = 50;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(award).service(view_history);
}

#[derive(Deserialize)]
pub struct AwardForm {
    pub amount: i64,
    pub reason: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct AwardResponse {
    pub success: bool,
    /// Stored balance on success, otherwise the rolled-back preview.
    pub points: i64,
}

#[post("/points")]
pub async fn award(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
    form: web::Json<AwardForm>,
) -> Result<impl Responder, Error> {
    let user = client.require_user()?;

    if let Err(e) = crate::rate_limit::check_points_rate_limit(user.id) {
        log::warn!("Rate limit exceeded for point awards: user_id={}", user.id);
        return Err(error::ErrorTooManyRequests(format!(
            "Too many point awards. Please wait {} seconds.",
            e.retry_after_seconds
        )));
    }

    points::check_amount(form.amount, config.allow_negative_awards())
        .and_then(|_| points::validate_reason(&form.reason))
        .map_err(|e| error::ErrorBadRequest(e.to_string()))?;

    let mut preview = PointsPreview::new(user.points);
    preview.apply(form.amount);

    let metadata = form
        .metadata
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));
    let outcome = points::award_points(get_db_pool(), user.id, form.amount, &form.reason, metadata).await;
    let shown = preview.settle(&outcome);

    match outcome {
        Ok(_) => Ok(HttpResponse::Ok().json(AwardResponse {
            success: true,
            points: shown,
        })),
        Err(e) => {
            log::error!("Point award failed for user {}: {}", user.id, e);
            let mut res = match e {
                LedgerError::UnknownUser(_) => HttpResponse::NotFound(),
                _ => HttpResponse::InternalServerError(),
            };
            Ok(res.json(AwardResponse {
                success: false,
                points: shown,
            }))
        }
    }
}

#[get("/points/history")]
pub async fn view_history(client: ClientCtx) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let rows = points::history(get_db_pool(), user_id, HISTORY_LIMIT)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(rows))
}
