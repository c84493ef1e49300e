use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ErrorListHelperModel, GtfsFeed, GtfsFeedId, GtfsRtFeed, GtfsRtFeedId, GtfsRtFeedIteration, IterationErrorList,
    IterationId, MessageId, MessageLog, Occurrence, Session, SessionId, ViewErrorLog, ViewErrorSummary,
    ViewGtfsRtFeedErrorCount,
};

/// Inclusive window of fetch times, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

/// Zero-based slice of a result set; `limit: None` returns everything after `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub offset: i64,
    pub limit: Option<i64>,
}

impl Page {
    /// From a one-based page number and a page size; non-positive sizes disable paging
    pub fn new(current_page: i64, rows_per_page: i64) -> Self {
        if rows_per_page <= 0 {
            return Self::default();
        }
        Self { offset: (current_page.max(1) - 1).saturating_mul(rows_per_page), limit: Some(rows_per_page) }
    }
}

// ==================== GtfsFeedRepository ====================
#[async_trait]
pub trait GtfsFeedRepository: Send + Sync {
    /// Inserts the feed and returns it with its new id
    async fn create_feed(&self, feed: &GtfsFeed) -> Result<GtfsFeed>;

    async fn update_feed(&self, feed: &GtfsFeed) -> Result<()>;

    async fn get_feed(&self, id: GtfsFeedId) -> Result<Option<GtfsFeed>>;

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<GtfsFeed>>;

    async fn get_all_feeds(&self) -> Result<Vec<GtfsFeed>>;

    /// Returns false when no feed had this id
    async fn delete_feed(&self, id: GtfsFeedId) -> Result<bool>;
}

// ==================== GtfsRtFeedRepository ====================
#[async_trait]
pub trait GtfsRtFeedRepository: Send + Sync {
    async fn create_rt_feed(&self, url: &str, gtfs_feed_id: GtfsFeedId, enable_shapes: bool) -> Result<GtfsRtFeed>;

    async fn get_rt_feed(&self, id: GtfsRtFeedId) -> Result<Option<GtfsRtFeed>>;

    async fn find_rt_feed(&self, url: &str, gtfs_feed_id: GtfsFeedId) -> Result<Option<GtfsRtFeed>>;

    async fn get_all_rt_feeds(&self) -> Result<Vec<GtfsRtFeed>>;

    /// All realtime feeds validated against the same static GTFS feed
    async fn get_rt_feeds_by_gtfs_feed(&self, gtfs_feed_id: GtfsFeedId) -> Result<Vec<GtfsRtFeed>>;

    async fn set_enable_shapes(&self, id: GtfsRtFeedId, enable_shapes: bool) -> Result<()>;
}

// ==================== IterationRepository ====================
#[async_trait]
pub trait IterationRepository: Send + Sync {
    /// Inserts the iteration and returns it with its new id
    async fn create_iteration(&self, iteration: &GtfsRtFeedIteration) -> Result<GtfsRtFeedIteration>;

    async fn get_iteration(&self, id: IterationId) -> Result<Option<GtfsRtFeedIteration>>;

    /// Most recent iteration, duplicate or not
    async fn get_latest_iteration(&self, rt_feed_id: GtfsRtFeedId) -> Result<Option<GtfsRtFeedIteration>>;

    /// Most recent iteration that stored its protobuf
    async fn get_latest_stored_iteration(&self, rt_feed_id: GtfsRtFeedId) -> Result<Option<GtfsRtFeedIteration>>;

    /// Last stored protobuf of the feed older than the given iteration
    async fn get_previous_protobuf(&self, rt_feed_id: GtfsRtFeedId, before: IterationId) -> Result<Option<Vec<u8>>>;
}

// ==================== MessageLogRepository ====================
#[async_trait]
pub trait MessageLogRepository: Send + Sync {
    /// Stores a rule hit and all of its occurrences in one transaction
    async fn save_error_list(&self, iteration_id: IterationId, errors: &ErrorListHelperModel) -> Result<MessageId>;

    async fn get_message_logs(&self, iteration_id: IterationId) -> Result<Vec<MessageLog>>;

    async fn get_occurrences(&self, message_id: MessageId) -> Result<Vec<Occurrence>>;

    /// Occurrences of one iteration grouped by rule, ordered by rule id
    async fn get_iteration_errors(&self, iteration_id: IterationId) -> Result<Vec<IterationErrorList>>;
}

// ==================== SessionRepository ====================
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<Session>;

    async fn update_session(&self, session: &Session) -> Result<()>;

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>>;

    async fn get_sessions_by_client(&self, client_id: &str) -> Result<Vec<Session>>;

    /// Start time of the most recent session on the feed
    async fn get_latest_session_start(&self, rt_feed_id: GtfsRtFeedId) -> Result<Option<i64>>;
}

// ==================== MonitorRepository ====================
#[async_trait]
pub trait MonitorRepository: Send + Sync {
    async fn count_iterations(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<i64>;

    /// Iterations that stored a protobuf, i.e. were not duplicates
    async fn count_unique_iterations(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<i64>;

    async fn get_error_counts(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<Vec<ViewGtfsRtFeedErrorCount>>;

    async fn get_error_summary(
        &self,
        rt_feed_id: GtfsRtFeedId,
        window: TimeWindow,
        page: Page,
    ) -> Result<Vec<ViewErrorSummary>>;

    async fn get_error_log(
        &self,
        rt_feed_id: GtfsRtFeedId,
        window: TimeWindow,
        hidden_error_ids: &[String],
        page: Page,
    ) -> Result<Vec<ViewErrorLog>>;

    /// Distinct rule ids hit in the window
    async fn get_session_error_ids(&self, rt_feed_id: GtfsRtFeedId, window: TimeWindow) -> Result<Vec<String>>;
}
