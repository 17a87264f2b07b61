mod from_row;
mod schema;
pub mod queries;

pub use schema::{configure_connection, init_db};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::slots::SlotManager;
use crate::status::StatusEvaluator;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state: the store plus the components built on it
#[derive(Clone)]
pub struct AppState {
    /// Registrations and cached purchase records
    pub db: DbPool,
    pub slots: SlotManager,
    pub status: StatusEvaluator,
    /// Read the client address from X-Forwarded-For / X-Real-IP
    pub trust_proxy_headers: bool,
    pub maintenance_mode: bool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager =
        SqliteConnectionManager::file(database_path).with_init(|c| configure_connection(c));
    Pool::builder().max_size(10).build(manager)
}
