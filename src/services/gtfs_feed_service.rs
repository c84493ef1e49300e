use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use sha2::{Digest, Sha256};
use url::Url;

use crate::base::{GtfsFeedRepository, GtfsRtFeedRepository};
use crate::error::{AppError, AppResult};
use crate::models::{GtfsFeed, GtfsFeedId};
use crate::services::fetcher::{FetchError, Fetcher};
use crate::services::gtfs_cache::GtfsCache;
use crate::services::scheduler::MonitorScheduler;
use crate::utils::{current_time_millis, ensure_directory_exists, gtfs_file_name};
use crate::validation::StopLocationTypeValidator;

/// Registers static GTFS feeds and keeps their parsed data in the shared cache
pub struct GtfsFeedService {
    repository: Arc<dyn GtfsFeedRepository>,
    rt_feeds: Arc<dyn GtfsRtFeedRepository>,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<GtfsCache>,
    scheduler: Arc<MonitorScheduler>,
    gtfs_dir: PathBuf,
}

impl GtfsFeedService {
    pub fn new(
        repository: Arc<dyn GtfsFeedRepository>,
        rt_feeds: Arc<dyn GtfsRtFeedRepository>,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<GtfsCache>,
        scheduler: Arc<MonitorScheduler>,
        gtfs_dir: PathBuf,
    ) -> Self {
        Self { repository, rt_feeds, fetcher, cache, scheduler, gtfs_dir }
    }

    /// Downloads the zip behind `gtfs_url`, stores or refreshes its row and loads it into memory.
    /// `enable_validation` is the form checkbox value; `checked` runs the static checks.
    pub async fn register(&self, gtfs_url: &str, enable_validation: Option<&str>) -> AppResult<GtfsFeed> {
        if Url::parse(gtfs_url).is_err() {
            error!("Invalid GTFS URL: {}", gtfs_url);
            return Err(AppError::bad_request("Malformed URL", "Malformed URL for the GTFS feed."));
        }

        info!("Downloading GTFS data from {}...", gtfs_url);
        let bytes = self.fetcher.fetch(gtfs_url).await.map_err(|e| {
            error!("Downloading GTFS feed {} failed: {}", gtfs_url, e);
            match e {
                FetchError::Tls(_) => AppError::forbidden("SSL Handshake Failed", "SSL handshake failed."),
                _ => AppError::bad_request(
                    "Download Failed",
                    "Downloading static GTFS feed from provided Url failed.",
                ),
            }
        })?;

        let location = self.gtfs_dir.join(gtfs_file_name(gtfs_url));
        ensure_directory_exists(&location)?;
        tokio::fs::write(&location, &bytes)
            .await
            .with_context(|| format!("Failed to save GTFS zip to {}", location.display()))?;
        info!("GTFS zip file downloaded successfully");

        let checksum = Sha256::digest(&bytes).to_vec();
        let (mut feed, changed_or_new) = match self.repository.get_feed_by_url(gtfs_url).await? {
            None => {
                info!("GTFS URL is new - saving metadata to database...");
                let feed = GtfsFeed::new(
                    gtfs_url.to_string(),
                    location.display().to_string(),
                    checksum,
                    current_time_millis(),
                );
                (self.repository.create_feed(&feed).await?, true)
            }
            Some(mut feed) if feed.checksum != checksum => {
                info!("GTFS data has changed, updating metadata in database...");
                feed.checksum = checksum;
                feed.feed_location = location.display().to_string();
                self.repository.update_feed(&feed).await?;
                (feed, true)
            }
            Some(feed) => {
                info!("GTFS data hasn't changed since last execution");
                (feed, false)
            }
        };

        let data = if changed_or_new || !self.cache.contains(feed.feed_id).await {
            info!("Loading GTFS from downloaded zip file on disk to memory...");
            self.cache.load(&feed).await.map_err(|e| {
                error!("Can't read GTFS zip for {}: {:#}", gtfs_url, e);
                AppError::not_found("Can't read content", "Can't read GTFS zip file from disk")
            })?
        } else {
            self.cache.data(&feed).await?
        };

        let mut dirty = false;
        if changed_or_new {
            feed.agency = data.agency_timezone().map(str::to_string);
            dirty = true;
        }

        let validation_requested = enable_validation.is_some_and(|v| v.eq_ignore_ascii_case("checked"));
        if validation_requested {
            info!("Validating GTFS data...");
            let validator = StopLocationTypeValidator;
            feed.error_count = validator.error_count(&data) as i64;
            info!("{} found {} error(s) in {}", validator.name(), feed.error_count, gtfs_url);
            dirty = true;
        }

        if dirty {
            self.repository.update_feed(&feed).await?;
        }
        Ok(feed)
    }

    pub async fn list(&self) -> AppResult<Vec<GtfsFeed>> {
        Ok(self.repository.get_all_feeds().await?)
    }

    pub async fn get(&self, id: GtfsFeedId) -> AppResult<GtfsFeed> {
        self.repository
            .get_feed(id)
            .await?
            .ok_or_else(|| AppError::not_found("GTFS feed not found", format!("No GTFS feed with id {}", id)))
    }

    /// Deleting an unknown id is not an error
    /// Deleting a feed cascades to its realtime feeds, so their monitors stop first
    pub async fn delete(&self, id: GtfsFeedId) -> AppResult<()> {
        for rt_feed in self.rt_feeds.get_rt_feeds_by_gtfs_feed(id).await? {
            self.scheduler.stop(&rt_feed).await;
        }
        if self.repository.delete_feed(id).await? {
            info!("Deleted GTFS feed {}", id);
        }
        self.cache.remove(id).await;
        Ok(())
    }
}
