use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::base::{
    GtfsFeedRepository, GtfsRtFeedRepository, IterationRepository, MessageLogRepository, MonitorRepository,
    SessionRepository,
};
use crate::data::migration::MigrationManager;
use crate::data::repositories::{
    SqliteGtfsFeedRepository, SqliteGtfsRtFeedRepository, SqliteIterationRepository, SqliteMessageLogRepository,
    SqliteMonitorRepository, SqliteSessionRepository,
};

pub type DbPool = Arc<Pool<SqliteConnectionManager>>;

fn enable_foreign_keys(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub fn init_database(db_path: &Path) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        .with_init(enable_foreign_keys);

    let pool = Pool::new(manager)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    prepare_schema(&pool)?;
    Ok(Arc::new(pool))
}

/// A single shared in-memory connection, used by tests
pub fn init_memory_database() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(enable_foreign_keys);
    let pool = Pool::builder().max_size(1).build(manager)?;
    prepare_schema(&pool)?;
    Ok(Arc::new(pool))
}

fn prepare_schema(pool: &Pool<SqliteConnectionManager>) -> Result<()> {
    let conn = pool.get()?;
    conn.execute_batch(include_str!("../../data/schema.sql"))
        .context("Failed to create database schema")?;
    MigrationManager::new(&conn).run_migrations()?;
    Ok(())
}

/// Owns the connection pool and hands out repositories backed by it
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening database at {}", db_path.display());
        Ok(Self { pool: init_database(db_path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { pool: init_memory_database()? })
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    pub fn gtfs_feed_repository(&self) -> Arc<dyn GtfsFeedRepository> {
        Arc::new(SqliteGtfsFeedRepository::new(self.pool.clone()))
    }

    pub fn gtfs_rt_feed_repository(&self) -> Arc<dyn GtfsRtFeedRepository> {
        Arc::new(SqliteGtfsRtFeedRepository::new(self.pool.clone()))
    }

    pub fn iteration_repository(&self) -> Arc<dyn IterationRepository> {
        Arc::new(SqliteIterationRepository::new(self.pool.clone()))
    }

    pub fn message_log_repository(&self) -> Arc<dyn MessageLogRepository> {
        Arc::new(SqliteMessageLogRepository::new(self.pool.clone()))
    }

    pub fn session_repository(&self) -> Arc<dyn SessionRepository> {
        Arc::new(SqliteSessionRepository::new(self.pool.clone()))
    }

    pub fn monitor_repository(&self) -> Arc<dyn MonitorRepository> {
        Arc::new(SqliteMonitorRepository::new(self.pool.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_database_is_created() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("validator.db");
        let database = Database::new(&path)?;
        assert!(path.exists());

        let conn = database.pool().get()?;
        let rules: i64 = conn.query_row("SELECT COUNT(*) FROM validation_rules", [], |row| row.get(0))?;
        assert_eq!(rules as usize, crate::validation::rules::all_rules().len());
        Ok(())
    }

    #[test]
    fn test_foreign_keys_are_enforced() -> Result<()> {
        let database = Database::in_memory()?;
        let conn = database.pool().get()?;
        let result = conn.execute(
            "INSERT INTO gtfs_rt_feeds (gtfs_rt_url, gtfs_feed_id) VALUES ('http://rt.example', 42)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }
}
