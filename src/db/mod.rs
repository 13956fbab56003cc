pub mod from_row;
pub mod queries;
mod sqlite_store;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;

pub use sqlite_store::SqliteStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the schema. Safe to call on every start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL COLLATE NOCASE,
            license_key TEXT NOT NULL UNIQUE,
            bound_hardware_id TEXT,
            device_limit INTEGER NOT NULL DEFAULT 1,
            tier TEXT NOT NULL,
            duration TEXT NOT NULL,
            valid_until TEXT,
            is_banned INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at INTEGER NOT NULL,
            activated_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_licenses_email ON licenses(email);
        CREATE INDEX IF NOT EXISTS idx_licenses_banned ON licenses(is_banned);
        ",
    )?;
    Ok(())
}

/// Open a pool over an on-disk database and make sure the schema exists.
pub fn create_pool(path: &str, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    init_db(&*pool.get()?)?;
    Ok(pool)
}

/// Single-connection in-memory pool. Every pooled connection to `:memory:`
/// is its own database, so the pool is capped at one.
pub fn create_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager)?;
    init_db(&*pool.get()?)?;
    Ok(pool)
}
