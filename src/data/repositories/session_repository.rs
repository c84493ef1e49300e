use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::base::SessionRepository;
use crate::data::database::DbPool;
use crate::models::{GtfsRtFeedId, Session, SessionId};

const SELECT_SESSION: &str = "SELECT session_id, rt_feed_id, client_id, session_start_time, session_end_time,
            error_count, warning_count
     FROM sessions";

/// SQLite implementation of the SessionRepository trait
pub struct SqliteSessionRepository {
    pool: DbPool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row) -> rusqlite::Result<Session> {
        Ok(Session {
            session_id: SessionId(row.get(0)?),
            rt_feed_id: GtfsRtFeedId(row.get(1)?),
            client_id: row.get(2)?,
            session_start_time: row.get(3)?,
            session_end_time: row.get(4)?,
            error_count: row.get(5)?,
            warning_count: row.get(6)?,
        })
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create_session(&self, session: &Session) -> Result<Session> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO sessions (rt_feed_id, client_id, session_start_time, session_end_time, error_count, warning_count)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                session.rt_feed_id.0,
                session.client_id,
                session.session_start_time,
                session.session_end_time,
                session.error_count,
                session.warning_count,
            ],
        )?;

        let mut created = session.clone();
        created.session_id = SessionId(conn.last_insert_rowid());
        Ok(created)
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE sessions SET session_end_time = ?, error_count = ?, warning_count = ? WHERE session_id = ?",
            params![session.session_end_time, session.error_count, session.warning_count, session.session_id.0],
        )?;
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        let conn = self.pool.get()?;
        let session = conn
            .query_row(&format!("{} WHERE session_id = ?", SELECT_SESSION), params![id.0], Self::map_row)
            .optional()?;
        Ok(session)
    }

    async fn get_sessions_by_client(&self, client_id: &str) -> Result<Vec<Session>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("{} WHERE client_id = ? ORDER BY session_id", SELECT_SESSION))?;
        let sessions = stmt.query_map(params![client_id], Self::map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    async fn get_latest_session_start(&self, rt_feed_id: GtfsRtFeedId) -> Result<Option<i64>> {
        let conn = self.pool.get()?;
        let start = conn.query_row(
            "SELECT MAX(session_start_time) FROM sessions WHERE rt_feed_id = ?",
            params![rt_feed_id.0],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::tests::create_rt_feed;
    use crate::data::Database;

    #[tokio::test]
    async fn test_session_lifecycle() -> Result<()> {
        let database = Database::in_memory()?;
        let rt_feed = create_rt_feed(&database).await?;
        let repository = database.session_repository();

        assert_eq!(repository.get_latest_session_start(rt_feed.gtfs_rt_id).await?, None);

        let mut session = repository.create_session(&Session::new(rt_feed.gtfs_rt_id, "client-a".into(), 1_000)).await?;
        repository.create_session(&Session::new(rt_feed.gtfs_rt_id, "client-b".into(), 5_000)).await?;

        session.session_end_time = 9_000;
        session.error_count = 3;
        session.warning_count = 1;
        repository.update_session(&session).await?;

        assert_eq!(repository.get_session(session.session_id).await?, Some(session.clone()));
        assert_eq!(repository.get_sessions_by_client("client-a").await?, vec![session]);
        assert!(repository.get_sessions_by_client("nobody").await?.is_empty());
        assert_eq!(repository.get_latest_session_start(rt_feed.gtfs_rt_id).await?, Some(5_000));
        Ok(())
    }
}
