pub mod batch_processor;
pub mod fetcher;
pub mod gtfs_cache;
pub mod gtfs_feed_service;
pub mod gtfs_rt_feed_service;
pub mod monitor_service;
pub mod monitor_task;
pub mod scheduler;

pub use batch_processor::{BatchProcessor, SortBy, RESULTS_FILE_EXTENSION};
pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use gtfs_cache::GtfsCache;
pub use gtfs_feed_service::GtfsFeedService;
pub use gtfs_rt_feed_service::GtfsRtFeedService;
pub use monitor_service::{MonitorDataQuery, MonitorService, PastSessions};
pub use monitor_task::{IterationOutcome, MonitorContext, MonitorTask};
pub use scheduler::{MonitorScheduler, MonitorStatus};
