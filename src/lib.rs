pub mod api;
pub mod base;
pub mod config;
pub mod data;
pub mod error;
pub mod gtfs;
pub mod models;
pub mod realtime;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

// Re-export repository traits
pub use base::{
    GtfsFeedRepository, GtfsRtFeedRepository, IterationRepository, MessageLogRepository, MonitorRepository,
    SessionRepository,
};

pub use config::Config;
pub use data::Database;
pub use error::{AppError, AppResult};
pub use state::AppState;

// Re-export services selectively
pub use services::{BatchProcessor, GtfsFeedService, GtfsRtFeedService, MonitorScheduler, MonitorService, SortBy};
