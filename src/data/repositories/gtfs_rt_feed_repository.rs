use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::base::GtfsRtFeedRepository;
use crate::data::database::DbPool;
use crate::models::{GtfsFeedId, GtfsRtFeed, GtfsRtFeedId};

const SELECT_RT_FEED: &str = "SELECT gtfs_rt_id, gtfs_rt_url, gtfs_feed_id, enable_shapes FROM gtfs_rt_feeds";

pub struct SqliteGtfsRtFeedRepository {
    pool: DbPool,
}

impl SqliteGtfsRtFeedRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row) -> rusqlite::Result<GtfsRtFeed> {
        Ok(GtfsRtFeed {
            gtfs_rt_id: GtfsRtFeedId(row.get(0)?),
            gtfs_rt_url: row.get(1)?,
            gtfs_feed_id: GtfsFeedId(row.get(2)?),
            enable_shapes: row.get(3)?,
        })
    }

    fn query(&self, clause: &str, params: impl rusqlite::Params) -> Result<Vec<GtfsRtFeed>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("{} {}", SELECT_RT_FEED, clause))?;
        let feeds = stmt.query_map(params, Self::map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(feeds)
    }
}

#[async_trait]
impl GtfsRtFeedRepository for SqliteGtfsRtFeedRepository {
    async fn create_rt_feed(&self, url: &str, gtfs_feed_id: GtfsFeedId, enable_shapes: bool) -> Result<GtfsRtFeed> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO gtfs_rt_feeds (gtfs_rt_url, gtfs_feed_id, enable_shapes) VALUES (?, ?, ?)",
            params![url, gtfs_feed_id.0, enable_shapes],
        )?;
        Ok(GtfsRtFeed {
            gtfs_rt_id: GtfsRtFeedId(conn.last_insert_rowid()),
            gtfs_rt_url: url.to_string(),
            gtfs_feed_id,
            enable_shapes,
        })
    }

    async fn get_rt_feed(&self, id: GtfsRtFeedId) -> Result<Option<GtfsRtFeed>> {
        let conn = self.pool.get()?;
        let feed = conn
            .query_row(&format!("{} WHERE gtfs_rt_id = ?", SELECT_RT_FEED), params![id.0], Self::map_row)
            .optional()?;
        Ok(feed)
    }

    async fn find_rt_feed(&self, url: &str, gtfs_feed_id: GtfsFeedId) -> Result<Option<GtfsRtFeed>> {
        let feeds = self.query("WHERE gtfs_rt_url = ? AND gtfs_feed_id = ? LIMIT 1", params![url, gtfs_feed_id.0])?;
        Ok(feeds.into_iter().next())
    }

    async fn get_all_rt_feeds(&self) -> Result<Vec<GtfsRtFeed>> {
        self.query("ORDER BY gtfs_rt_id", [])
    }

    async fn get_rt_feeds_by_gtfs_feed(&self, gtfs_feed_id: GtfsFeedId) -> Result<Vec<GtfsRtFeed>> {
        self.query("WHERE gtfs_feed_id = ? ORDER BY gtfs_rt_id", params![gtfs_feed_id.0])
    }

    async fn set_enable_shapes(&self, id: GtfsRtFeedId, enable_shapes: bool) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute("UPDATE gtfs_rt_feeds SET enable_shapes = ? WHERE gtfs_rt_id = ?", params![enable_shapes, id.0])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repositories::tests::create_gtfs_feed;
    use crate::data::Database;

    #[tokio::test]
    async fn test_rt_feeds_by_gtfs_feed() -> Result<()> {
        let database = Database::in_memory()?;
        let gtfs = create_gtfs_feed(&database, "http://gtfs.example/a.zip").await?;
        let other = create_gtfs_feed(&database, "http://gtfs.example/b.zip").await?;
        let repository = database.gtfs_rt_feed_repository();

        let trip_updates = repository.create_rt_feed("http://rt.example/tu", gtfs.feed_id, true).await?;
        repository.create_rt_feed("http://rt.example/vp", gtfs.feed_id, true).await?;
        repository.create_rt_feed("http://rt.example/tu", other.feed_id, false).await?;

        assert_eq!(repository.get_all_rt_feeds().await?.len(), 3);
        assert_eq!(repository.get_rt_feeds_by_gtfs_feed(gtfs.feed_id).await?.len(), 2);
        assert_eq!(
            repository.find_rt_feed("http://rt.example/tu", gtfs.feed_id).await?,
            Some(trip_updates.clone())
        );

        repository.set_enable_shapes(trip_updates.gtfs_rt_id, false).await?;
        let loaded = repository.get_rt_feed(trip_updates.gtfs_rt_id).await?;
        assert_eq!(loaded.map(|f| f.enable_shapes), Some(false));
        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_gtfs_feed_cascades() -> Result<()> {
        let database = Database::in_memory()?;
        let gtfs = create_gtfs_feed(&database, "http://gtfs.example/a.zip").await?;
        let repository = database.gtfs_rt_feed_repository();
        repository.create_rt_feed("http://rt.example/tu", gtfs.feed_id, true).await?;

        database.gtfs_feed_repository().delete_feed(gtfs.feed_id).await?;
        assert!(repository.get_all_rt_feeds().await?.is_empty());
        Ok(())
    }
}
