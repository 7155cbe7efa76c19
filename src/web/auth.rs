//! Telegram sign-in backed by the cookie session.

use crate::app_config;
use crate::db::get_db_pool;
use crate::identity::{self, AuthError, SignInRequest};
use crate::middleware::{ClientCtx, SESSION_USER_KEY, SESSION_VERIFIED_KEY};
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse, Responder};
use chrono::Utc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(sign_in).service(view_me).service(sign_out);
}

fn auth_error(e: AuthError) -> Error {
    match e {
        AuthError::MissingIdentity => error::ErrorBadRequest(e.to_string()),
        AuthError::Unverified(_) => error::ErrorUnauthorized(e.to_string()),
        AuthError::Database(_) => error::ErrorInternalServerError(e.to_string()),
    }
}

/// Body carries the WebApp `initData`. May be empty in dev mode.
#[post("/auth/telegram")]
pub async fn sign_in(
    req: HttpRequest,
    session: Session,
    body: Option<web::Json<SignInRequest>>,
) -> Result<impl Responder, Error> {
    let ip = crate::ip::client_ip_or_unknown(&req);
    if let Err(e) = crate::rate_limit::check_auth_rate_limit(&ip) {
        log::warn!("Rate limit exceeded for sign-in: ip={}", ip);
        return Err(error::ErrorTooManyRequests(format!(
            "Too many sign-in attempts. Please wait {} seconds.",
            e.retry_after_seconds
        )));
    }

    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let resolved = identity::resolve_identity(request, &app_config::telegram(), Utc::now())
        .map_err(|e| {
            log::warn!("Rejected sign-in from ip={}: {}", ip, e);
            auth_error(e)
        })?;

    let user = identity::authenticate(get_db_pool(), &resolved.identity)
        .await
        .map_err(|e| {
            log::error!(
                "Sign-in failed for telegram_id={}: {}",
                resolved.identity.id,
                e
            );
            auth_error(e)
        })?;

    session.renew();
    session
        .insert(SESSION_USER_KEY, user.id)
        .map_err(error::ErrorInternalServerError)?;
    session
        .insert(SESSION_VERIFIED_KEY, resolved.verified)
        .map_err(error::ErrorInternalServerError)?;

    log::info!("User {} signed in (verified={})", user.id, resolved.verified);

    Ok(HttpResponse::Ok().json(user))
}

/// The signed-in user, or `null`.
#[get("/auth/me")]
pub async fn view_me(client: ClientCtx) -> impl Responder {
    HttpResponse::Ok().json(client.get_user())
}

#[post("/auth/logout")]
pub async fn sign_out(client: ClientCtx, session: Session) -> impl Responder {
    if let Some(id) = client.get_id() {
        log::info!("User {} signed out", id);
    }
    session.purge();
    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
}
