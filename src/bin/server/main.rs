use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use engage::config::create_config;
use engage::db::{get_db_pool, init_db};
use engage::middleware::ClientCtx;
use engage::pinning::{HttpLanguageModel, LanguageModel, SharedLanguageModel};
use engage::stranger::GameRegistry;
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    engage::app_config::init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set.")?;
    init_db(database_url).await;

    // Load configuration from database
    let config = create_config();
    config
        .load_from_database(get_db_pool())
        .await
        .context("Failed to load configuration from database")?;

    // Initialize rate limits from database settings
    engage::rate_limit::init_rate_limits(&config);

    let site = engage::app_config::site();
    let game_config = engage::app_config::game();
    let idle = Duration::from_secs(game_config.session_idle_minutes * 60);
    let registry = Data::new(GameRegistry::from_config(game_config));

    let model: SharedLanguageModel = HttpLanguageModel::from_config(&engage::app_config::ai())
        .map(|m| Arc::new(m) as Arc<dyn LanguageModel>);
    let model = Data::new(model);

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) if key.len() >= 64 => Key::from(key.as_bytes()),
        other => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid ({}). Session cookies will be invalidated every time the application restarts. A secret key must be at least 64 bytes to be accepted.",
                match other {
                    Ok(_) => "too short".to_owned(),
                    Err(err) => err.to_string(),
                });
            Key::from(random_string.as_bytes())
        }
    };

    // Spawn maintenance task
    let maintenance_registry = registry.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(300)); // Every 5 minutes
        loop {
            interval.tick().await;
            engage::rate_limit::cleanup_old_entries_public();
            let pruned = maintenance_registry.prune_idle(idle);
            log::debug!(
                "Maintenance completed: pruned {} idle games, {} remain",
                pruned,
                maintenance_registry.len()
            );
        }
    });

    let bind = site.bind.clone();
    let secure_cookies = site.secure_cookies;
    log::info!("{} listening on {}", site.name, bind);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(Data::new(config.clone()))
            .app_data(registry.clone())
            .app_data(model.clone())
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::BAD_REQUEST, engage::web::error::render_400)
                    .handler(StatusCode::UNAUTHORIZED, engage::web::error::render_error)
                    .handler(StatusCode::FORBIDDEN, engage::web::error::render_error)
                    .handler(StatusCode::NOT_FOUND, engage::web::error::render_404)
                    .handler(StatusCode::CONFLICT, engage::web::error::render_error)
                    .handler(StatusCode::TOO_MANY_REQUESTS, engage::web::error::render_error)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        engage::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    // The Mini-App runs inside Telegram's webview on another origin.
                    .cookie_same_site(if secure_cookies {
                        SameSite::None
                    } else {
                        SameSite::Lax
                    })
                    .cookie_secure(secure_cookies)
                    .session_lifecycle(PersistentSession::default())
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %Dms"))
            .configure(engage::web::configure)
    })
    .bind(&bind)
    .with_context(|| format!("Failed to bind {}", bind))?
    .run()
    .await
    .context("HTTP server failed")
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
