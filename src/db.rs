use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

#[inline(always)]
pub fn get_db_pool() -> &'static DatabaseConnection {
    unsafe { DB_POOL.get_unchecked() }
}

/// Opens the connection pool and fills the DB_POOL static; everything
/// downstream borrows the pool through get_db_pool().
pub async fn init_db(database_url: String) {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(2))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let pool = Database::connect(options)
        .await
        .expect("Database connection was not established.");
    if DB_POOL.set(pool).is_err() {
        panic!("init_db() called twice");
    }
}

/// Fills the static with a connection built elsewhere, so service tests
/// can point the web handlers at sea-orm's mock backend.
pub fn init_db_with(pool: DatabaseConnection) {
    if DB_POOL.set(pool).is_err() {
        log::warn!("init_db_with() after the pool was set; keeping the first connection");
    }
}
