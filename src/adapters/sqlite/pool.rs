use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::error::EngineError;

// This defines a type alias — a shorthand so we don't have to write
// the full Pool<SqliteConnectionManager> everywhere.
pub type DbPool = Pool<SqliteConnectionManager>;

pub fn create_pool(db_path: &Path) -> Result<DbPool, EngineError> {
    let manager = SqliteConnectionManager::file(db_path).with_init(apply_pragmas);

    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

/// An in-memory pool for tests and ephemeral use. Capped at one connection:
/// each sqlite `:memory:` connection is its own database.
pub fn in_memory_pool() -> Result<DbPool, EngineError> {
    let manager = SqliteConnectionManager::memory().with_init(apply_pragmas);

    let pool = Pool::builder().max_size(1).build(manager)?;

    Ok(pool)
}

// SQLite performance tuning, applied to every pooled connection.
// foreign_keys must be per-connection or the CASCADE deletes are no-ops.
fn apply_pragmas(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;",
    )
}
