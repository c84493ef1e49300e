use std::sync::Arc;

use log::{info, warn};
use url::Url;

use crate::base::{GtfsFeedRepository, GtfsRtFeedRepository};
use crate::error::{AppError, AppResult};
use crate::models::{GtfsFeedId, GtfsRtFeed};
use crate::realtime::decode_feed;
use crate::services::fetcher::{FetchError, Fetcher};

fn rejected(message: impl Into<String>) -> AppError {
    let message = message.into();
    AppError::bad_request(message.clone(), message)
}

/// Registers GTFS-realtime URLs against an existing static GTFS feed
pub struct GtfsRtFeedService {
    repository: Arc<dyn GtfsRtFeedRepository>,
    gtfs_feeds: Arc<dyn GtfsFeedRepository>,
    fetcher: Arc<dyn Fetcher>,
}

impl GtfsRtFeedService {
    pub fn new(
        repository: Arc<dyn GtfsRtFeedRepository>,
        gtfs_feeds: Arc<dyn GtfsFeedRepository>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self { repository, gtfs_feeds, fetcher }
    }

    /// Checks that the URL serves a decodable feed, then returns the stored feed for the
    /// (url, GTFS feed) pair, creating it when missing.
    pub async fn register(&self, gtfs_rt_url: Option<&str>, gtfs_feed_id: GtfsFeedId) -> AppResult<GtfsRtFeed> {
        let gtfs_rt_url = match gtfs_rt_url {
            Some(url) if !url.trim().is_empty() => url.trim(),
            _ => return Err(rejected("GTFS-RT URL is required")),
        };
        if gtfs_feed_id.0 == 0 {
            return Err(rejected("GTFS Feed id is required"));
        }
        if Url::parse(gtfs_rt_url).is_err() {
            return Err(rejected("Invalid URL"));
        }

        let body = self.fetcher.fetch(gtfs_rt_url).await.map_err(|e| {
            warn!("Checking GTFS-RT URL {} failed: {}", gtfs_rt_url, e);
            match e {
                FetchError::Status(code) => rejected(format!("URL returns code: {}", code)),
                _ => rejected("Invalid URL"),
            }
        })?;

        if let Err(e) = decode_feed(&body) {
            warn!("{} is not a GTFS-realtime feed: {:#}", gtfs_rt_url, e);
            return Err(rejected("The GTFS-RT URL given is not a valid feed"));
        }
        info!("{} is a valid GTFS-realtime feed", gtfs_rt_url);

        if self.gtfs_feeds.get_feed(gtfs_feed_id).await?.is_none() {
            return Err(AppError::not_found(
                "GTFS feed not found",
                format!("No GTFS feed with id {}", gtfs_feed_id),
            ));
        }

        if let Some(existing) = self.repository.find_rt_feed(gtfs_rt_url, gtfs_feed_id).await? {
            return Ok(existing);
        }
        Ok(self.repository.create_rt_feed(gtfs_rt_url, gtfs_feed_id, true).await?)
    }

    pub async fn list(&self) -> AppResult<Vec<GtfsRtFeed>> {
        Ok(self.repository.get_all_rt_feeds().await?)
    }
}
