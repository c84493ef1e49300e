use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::RwLock;

use crate::gtfs::{self, GtfsData, GtfsMetadata};
use crate::models::{GtfsFeed, GtfsFeedId};

/// Parsed GTFS feeds and their validation indexes, kept in memory across requests.
///
/// Metadata is keyed by feed and by whether shapes are used, since monitoring sessions
/// may disable shape checks for the same feed.
#[derive(Default)]
pub struct GtfsCache {
    data: RwLock<HashMap<GtfsFeedId, Arc<GtfsData>>>,
    metadata: RwLock<HashMap<(GtfsFeedId, bool), Arc<GtfsMetadata>>>,
}

impl GtfsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, feed_id: GtfsFeedId) -> bool {
        self.data.read().await.contains_key(&feed_id)
    }

    /// Replaces the data of a feed and drops any index built from the old data
    pub async fn insert(&self, feed_id: GtfsFeedId, data: GtfsData) -> Arc<GtfsData> {
        let data = Arc::new(data);
        self.data.write().await.insert(feed_id, data.clone());
        self.metadata.write().await.retain(|(id, _), _| *id != feed_id);
        data
    }

    pub async fn remove(&self, feed_id: GtfsFeedId) {
        self.data.write().await.remove(&feed_id);
        self.metadata.write().await.retain(|(id, _), _| *id != feed_id);
    }

    /// Reads the feed's zip from disk into the cache
    pub async fn load(&self, feed: &GtfsFeed) -> Result<Arc<GtfsData>> {
        let location = feed.feed_location.clone();
        let data = tokio::task::spawn_blocking(move || gtfs::load_zip(&location))
            .await
            .context("GTFS loading task panicked")??;
        Ok(self.insert(feed.feed_id, data).await)
    }

    /// Cached data of the feed, loading it from disk on a miss
    pub async fn data(&self, feed: &GtfsFeed) -> Result<Arc<GtfsData>> {
        if let Some(data) = self.data.read().await.get(&feed.feed_id) {
            return Ok(data.clone());
        }
        self.load(feed).await
    }

    pub async fn metadata(&self, feed: &GtfsFeed, enable_shapes: bool) -> Result<Arc<GtfsMetadata>> {
        let key = (feed.feed_id, enable_shapes);
        if let Some(metadata) = self.metadata.read().await.get(&key) {
            return Ok(metadata.clone());
        }

        let data = self.data(feed).await?;
        let url = feed.gtfs_url.clone();
        let time_zone = feed.agency.clone();
        info!("Indexing GTFS feed {} (shapes {})", feed.feed_id, if enable_shapes { "on" } else { "off" });
        let metadata = tokio::task::spawn_blocking(move || {
            GtfsMetadata::new(&url, time_zone.as_deref(), &data, !enable_shapes)
        })
        .await
        .context("GTFS indexing task panicked")?;

        let metadata = Arc::new(metadata);
        self.metadata.write().await.insert(key, metadata.clone());
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::sample_gtfs;
    use crate::gtfs::tests::{sample_files, zip_bytes};

    #[tokio::test]
    async fn test_metadata_is_cached_and_invalidated() -> Result<()> {
        let cache = GtfsCache::new();
        let feed_id = GtfsFeedId(1);
        let mut feed = GtfsFeed::new("http://gtfs.example/a.zip".into(), String::new(), vec![], 0);
        feed.feed_id = feed_id;

        cache.insert(feed_id, sample_gtfs()).await;
        let first = cache.metadata(&feed, true).await?;
        let again = cache.metadata(&feed, true).await?;
        assert!(Arc::ptr_eq(&first, &again));

        let without_shapes = cache.metadata(&feed, false).await?;
        assert!(!Arc::ptr_eq(&first, &without_shapes));

        cache.insert(feed_id, sample_gtfs()).await;
        let rebuilt = cache.metadata(&feed, true).await?;
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        Ok(())
    }

    #[tokio::test]
    async fn test_data_loads_from_feed_location() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gtfs.zip");
        std::fs::write(&path, zip_bytes(&sample_files())?)?;

        let mut feed = GtfsFeed::new("http://gtfs.example/a.zip".into(), path.display().to_string(), vec![], 0);
        feed.feed_id = GtfsFeedId(3);

        let cache = GtfsCache::new();
        assert!(!cache.contains(feed.feed_id).await);
        let data = cache.data(&feed).await?;
        assert!(!data.trips.is_empty());
        assert!(cache.contains(feed.feed_id).await);

        cache.remove(feed.feed_id).await;
        assert!(!cache.contains(feed.feed_id).await);
        Ok(())
    }
}
