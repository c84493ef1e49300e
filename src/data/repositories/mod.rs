mod gtfs_feed_repository;
mod gtfs_rt_feed_repository;
mod iteration_repository;
mod message_log_repository;
mod monitor_repository;
mod session_repository;

pub use gtfs_feed_repository::SqliteGtfsFeedRepository;
pub use gtfs_rt_feed_repository::SqliteGtfsRtFeedRepository;
pub use iteration_repository::SqliteIterationRepository;
pub use message_log_repository::SqliteMessageLogRepository;
pub use monitor_repository::SqliteMonitorRepository;
pub use session_repository::SqliteSessionRepository;
