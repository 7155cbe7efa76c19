use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Returns the global connection pool.
///
/// Panics if `init_db` has not completed.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL
        .get()
        .expect("Database pool accessed before init_db() was called.")
}

/// Returns true once the global pool exists.
pub fn is_initialized() -> bool {
    DB_POOL.get().is_some()
}

/// Connects to the database and stores the pool globally.
/// Subsequent calls are ignored.
pub async fn init_db(database_url: String) {
    if DB_POOL.get().is_some() {
        return;
    }

    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let pool = Database::connect(opt)
        .await
        .expect("Failed to connect to database.");

    if DB_POOL.set(pool).is_err() {
        log::debug!("init_db: pool was initialized concurrently");
    }
}
