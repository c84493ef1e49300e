use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::base::GtfsFeedRepository;
use crate::data::database::DbPool;
use crate::models::{GtfsFeed, GtfsFeedId};

const SELECT_FEED: &str =
    "SELECT feed_id, gtfs_url, feed_location, start_time, agency, checksum, error_count FROM gtfs_feeds";

pub struct SqliteGtfsFeedRepository {
    pool: DbPool,
}

impl SqliteGtfsFeedRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row) -> rusqlite::Result<GtfsFeed> {
        Ok(GtfsFeed {
            feed_id: GtfsFeedId(row.get(0)?),
            gtfs_url: row.get(1)?,
            feed_location: row.get(2)?,
            start_time: row.get(3)?,
            agency: row.get(4)?,
            checksum: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
            error_count: row.get(6)?,
        })
    }
}

#[async_trait]
impl GtfsFeedRepository for SqliteGtfsFeedRepository {
    async fn create_feed(&self, feed: &GtfsFeed) -> Result<GtfsFeed> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO gtfs_feeds (gtfs_url, feed_location, start_time, agency, checksum, error_count)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![feed.gtfs_url, feed.feed_location, feed.start_time, feed.agency, feed.checksum, feed.error_count],
        )?;

        let mut created = feed.clone();
        created.feed_id = GtfsFeedId(conn.last_insert_rowid());
        Ok(created)
    }

    async fn update_feed(&self, feed: &GtfsFeed) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE gtfs_feeds SET gtfs_url = ?, feed_location = ?, start_time = ?, agency = ?, checksum = ?, error_count = ?
             WHERE feed_id = ?",
            params![
                feed.gtfs_url,
                feed.feed_location,
                feed.start_time,
                feed.agency,
                feed.checksum,
                feed.error_count,
                feed.feed_id.0,
            ],
        )?;
        Ok(())
    }

    async fn get_feed(&self, id: GtfsFeedId) -> Result<Option<GtfsFeed>> {
        let conn = self.pool.get()?;
        let feed = conn
            .query_row(&format!("{} WHERE feed_id = ?", SELECT_FEED), params![id.0], Self::map_row)
            .optional()?;
        Ok(feed)
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<GtfsFeed>> {
        let conn = self.pool.get()?;
        let feed = conn
            .query_row(&format!("{} WHERE gtfs_url = ?", SELECT_FEED), params![url], Self::map_row)
            .optional()?;
        Ok(feed)
    }

    async fn get_all_feeds(&self) -> Result<Vec<GtfsFeed>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY feed_id", SELECT_FEED))?;
        let feeds = stmt.query_map([], Self::map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(feeds)
    }

    async fn delete_feed(&self, id: GtfsFeedId) -> Result<bool> {
        let conn = self.pool.get()?;
        let deleted = conn.execute("DELETE FROM gtfs_feeds WHERE feed_id = ?", params![id.0])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;

    #[tokio::test]
    async fn test_create_update_and_delete() -> Result<()> {
        let database = Database::in_memory()?;
        let repository = database.gtfs_feed_repository();

        let feed = GtfsFeed::new("http://gtfs.example/a.zip".into(), "/tmp/a.zip".into(), vec![1, 2, 3], 1_000);
        let mut created = repository.create_feed(&feed).await?;
        assert!(created.feed_id.0 > 0);

        created.agency = Some("America/New_York".into());
        created.error_count = 2;
        repository.update_feed(&created).await?;

        let loaded = repository.get_feed_by_url("http://gtfs.example/a.zip").await?;
        assert_eq!(loaded.as_ref(), Some(&created));
        assert_eq!(repository.get_all_feeds().await?.len(), 1);

        assert!(repository.delete_feed(created.feed_id).await?);
        assert!(!repository.delete_feed(created.feed_id).await?);
        assert!(repository.get_feed(created.feed_id).await?.is_none());
        Ok(())
    }
}
