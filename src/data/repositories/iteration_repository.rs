use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::base::IterationRepository;
use crate::data::database::DbPool;
use crate::models::{GtfsRtFeedId, GtfsRtFeedIteration, IterationId};

const SELECT_ITERATION: &str = "SELECT iteration_id, rt_feed_id, iteration_timestamp, feed_timestamp, feed_protobuf, feed_hash
     FROM gtfs_rt_feed_iterations";

pub struct SqliteIterationRepository {
    pool: DbPool,
}

impl SqliteIterationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row) -> rusqlite::Result<GtfsRtFeedIteration> {
        Ok(GtfsRtFeedIteration {
            iteration_id: IterationId(row.get(0)?),
            rt_feed_id: GtfsRtFeedId(row.get(1)?),
            iteration_timestamp: row.get(2)?,
            feed_timestamp: row.get(3)?,
            feed_protobuf: row.get(4)?,
            feed_hash: row.get(5)?,
            date_format: None,
        })
    }

    fn query_one(&self, clause: &str, params: impl rusqlite::Params) -> Result<Option<GtfsRtFeedIteration>> {
        let conn = self.pool.get()?;
        let iteration = conn
            .query_row(&format!("{} {}", SELECT_ITERATION, clause), params, Self::map_row)
            .optional()?;
        Ok(iteration)
    }
}

#[async_trait]
impl IterationRepository for SqliteIterationRepository {
    async fn create_iteration(&self, iteration: &GtfsRtFeedIteration) -> Result<GtfsRtFeedIteration> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO gtfs_rt_feed_iterations (rt_feed_id, iteration_timestamp, feed_timestamp, feed_protobuf, feed_hash)
             VALUES (?, ?, ?, ?, ?)",
            params![
                iteration.rt_feed_id.0,
                iteration.iteration_timestamp,
                iteration.feed_timestamp,
                iteration.feed_protobuf,
                iteration.feed_hash,
            ],
        )?;

        let mut created = iteration.clone();
        created.iteration_id = IterationId(conn.last_insert_rowid());
        Ok(created)
    }

    async fn get_iteration(&self, id: IterationId) -> Result<Option<GtfsRtFeedIteration>> {
        self.query_one("WHERE iteration_id = ?", params![id.0])
    }

    async fn get_latest_iteration(&self, rt_feed_id: GtfsRtFeedId) -> Result<Option<GtfsRtFeedIteration>> {
        self.query_one("WHERE rt_feed_id = ? ORDER BY iteration_id DESC LIMIT 1", params![rt_feed_id.0])
    }

    async fn get_latest_stored_iteration(&self, rt_feed_id: GtfsRtFeedId) -> Result<Option<GtfsRtFeedIteration>> {
        self.query_one(
            "WHERE rt_feed_id = ? AND feed_protobuf IS NOT NULL ORDER BY iteration_id DESC LIMIT 1",
            params![rt_feed_id.0],
        )
    }

    async fn get_previous_protobuf(&self, rt_feed_id: GtfsRtFeedId, before: IterationId) -> Result<Option<Vec<u8>>> {
        let conn = self.pool.get()?;
        let protobuf = conn
            .query_row(
                "SELECT feed_protobuf FROM gtfs_rt_feed_iterations
                 WHERE rt_feed_id = ? AND iteration_id < ? AND feed_protobuf IS NOT NULL
                 ORDER BY iteration_id DESC LIMIT 1",
                params![rt_feed_id.0, before.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(protobuf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::tests::create_rt_feed;
    use crate::data::Database;

    #[tokio::test]
    async fn test_latest_and_previous_iterations() -> Result<()> {
        let database = Database::in_memory()?;
        let rt_feed = create_rt_feed(&database).await?;
        let repository = database.iteration_repository();

        assert!(repository.get_latest_iteration(rt_feed.gtfs_rt_id).await?.is_none());

        let first = repository
            .create_iteration(&GtfsRtFeedIteration::new(rt_feed.gtfs_rt_id, 1_000, 900, Some(vec![1]), vec![10]))
            .await?;
        let duplicate = repository
            .create_iteration(&GtfsRtFeedIteration::new(rt_feed.gtfs_rt_id, 2_000, 900, None, vec![10]))
            .await?;
        let second = repository
            .create_iteration(&GtfsRtFeedIteration::new(rt_feed.gtfs_rt_id, 3_000, 2_900, Some(vec![2]), vec![20]))
            .await?;

        assert_eq!(repository.get_latest_iteration(rt_feed.gtfs_rt_id).await?, Some(second.clone()));
        assert!(!duplicate.is_unique());
        assert_eq!(
            repository.get_latest_stored_iteration(rt_feed.gtfs_rt_id).await?.map(|i| i.iteration_id),
            Some(second.iteration_id)
        );
        assert_eq!(repository.get_previous_protobuf(rt_feed.gtfs_rt_id, second.iteration_id).await?, Some(vec![1]));
        assert_eq!(repository.get_previous_protobuf(rt_feed.gtfs_rt_id, first.iteration_id).await?, None);
        assert_eq!(repository.get_iteration(duplicate.iteration_id).await?.map(|i| i.feed_hash), Some(vec![10]));
        Ok(())
    }
}
