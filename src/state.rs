use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::data::Database;
use crate::services::{
    Fetcher, GtfsCache, GtfsFeedService, GtfsRtFeedService, HttpFetcher, MonitorContext, MonitorScheduler,
    MonitorService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gtfs_feeds: Arc<GtfsFeedService>,
    pub gtfs_rt_feeds: Arc<GtfsRtFeedService>,
    pub monitor: Arc<MonitorService>,
    pub scheduler: Arc<MonitorScheduler>,
}

impl AppState {
    pub fn new(database: &Database, config: Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.user_agent)?);
        Ok(Self::with_fetcher(database, config, fetcher))
    }

    /// Wires every service around one database and one downloader
    pub fn with_fetcher(database: &Database, config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let gtfs_cache = Arc::new(GtfsCache::new());
        let context = Arc::new(MonitorContext::new(database, Arc::clone(&fetcher), Arc::clone(&gtfs_cache)));
        let scheduler = Arc::new(MonitorScheduler::new(context));

        let gtfs_feeds = Arc::new(GtfsFeedService::new(
            database.gtfs_feed_repository(),
            database.gtfs_rt_feed_repository(),
            Arc::clone(&fetcher),
            gtfs_cache,
            Arc::clone(&scheduler),
            config.gtfs_dir(),
        ));
        let gtfs_rt_feeds = Arc::new(GtfsRtFeedService::new(
            database.gtfs_rt_feed_repository(),
            database.gtfs_feed_repository(),
            fetcher,
        ));
        let monitor = Arc::new(MonitorService::new(database, Arc::clone(&scheduler)));

        Self { config: Arc::new(config), gtfs_feeds, gtfs_rt_feeds, monitor, scheduler }
    }
}
