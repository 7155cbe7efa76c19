use crate::constants::LEADERBOARD_LIMIT;
use crate::db::get_db_pool;
use crate::leaderboard;
use actix_web::{error, get, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_leaderboard);
}

#[get("/leaderboard")]
pub async fn view_leaderboard() -> Result<impl Responder, Error> {
    let entries = leaderboard::top_users(get_db_pool(), LEADERBOARD_LIMIT)
        .await
        .map_err(|e| {
            log::error!("Failed to load leaderboard: {}", e);
            error::ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(entries.as_ref()))
}
