//! Admin endpoints: content creation, runtime settings and feature flags.

use crate::config::{Config, SettingValue};
use crate::content::{self, NewContentForm};
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::settings;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use sea_orm::EntityTrait;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

const HISTORY_LIMIT: u64 = 50;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_content)
        .service(view_feature_flags)
        .service(toggle_feature_flag)
        .service(update_setting)
        .service(view_setting_history);
}

#[post("/admin/content")]
pub async fn create_content(
    client: ClientCtx,
    form: web::Json<NewContentForm>,
) -> Result<impl Responder, Error> {
    let admin = client.require_admin()?;

    if let Err(errors) = form.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let item = content::create_content(get_db_pool(), &form)
        .await
        .map_err(|e| {
            log::error!("Failed to create content: {}", e);
            error::ErrorInternalServerError("Database error")
        })?;

    log::info!(
        "Content {} ({:?}) created by user {}",
        item.content.id,
        item.content.content_type,
        admin.id
    );

    Ok(HttpResponse::Created().json(item))
}

#[get("/admin/feature-flags")]
pub async fn view_feature_flags(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;

    let flags = config
        .get_all_feature_flags(get_db_pool())
        .await
        .map_err(|e| {
            log::error!("Failed to fetch feature flags: {}", e);
            error::ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(flags))
}

#[derive(Deserialize)]
pub struct ToggleFlagForm {
    pub key: String,
    pub enabled: bool,
}

#[post("/admin/feature-flags")]
pub async fn toggle_feature_flag(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
    form: web::Json<ToggleFlagForm>,
) -> Result<impl Responder, Error> {
    let admin = client.require_admin()?;

    config
        .set_feature_flag(get_db_pool(), &form.key, form.enabled)
        .await
        .map_err(|e| {
            log::error!("Failed to toggle feature flag: {}", e);
            error::ErrorInternalServerError("Failed to toggle feature flag")
        })?;

    log::info!(
        "Feature flag '{}' set to {} by user {}",
        form.key,
        form.enabled,
        admin.id
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "key": form.key,
        "enabled": form.enabled,
    })))
}

#[derive(Deserialize)]
pub struct UpdateSettingForm {
    pub key: String,
    pub value: String,
    /// Needed only when the setting does not exist yet.
    pub value_type: Option<String>,
}

#[post("/admin/settings")]
pub async fn update_setting(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
    form: web::Json<UpdateSettingForm>,
) -> Result<impl Responder, Error> {
    let admin_id = client.require_admin()?.id;
    let db = get_db_pool();

    let existing = settings::Entity::find_by_id(form.key.clone())
        .one(db)
        .await
        .map_err(|e| {
            log::error!("Failed to find setting: {}", e);
            error::ErrorInternalServerError("Database error")
        })?;

    let value_type = existing
        .map(|s| s.value_type)
        .or_else(|| form.value_type.clone())
        .ok_or_else(|| error::ErrorBadRequest("Unknown setting; value_type is required."))?;

    let value = SettingValue::parse(&form.value, &value_type)
        .ok_or_else(|| error::ErrorBadRequest("Invalid value for setting type"))?;

    config
        .set_value(db, &form.key, value, Some(admin_id))
        .await
        .map_err(|e| {
            log::error!("Failed to update setting: {}", e);
            error::ErrorInternalServerError("Failed to update setting")
        })?;

    if form.key.starts_with("rate_limit.") {
        crate::rate_limit::reload_rate_limits(&config);
    }

    log::info!("Setting '{}' updated by user {}", form.key, admin_id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "key": form.key,
        "value": form.value,
    })))
}

#[get("/admin/settings/{key}/history")]
pub async fn view_setting_history(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
    path: web::Path<String>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;

    let history = config
        .get_setting_history(get_db_pool(), &path, HISTORY_LIMIT)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(history))
}
