mod gtfs_feed;
mod gtfs_rt_feed;
mod monitor;

use serde::Deserialize;

/// Form posted by the GTFS upload page
#[derive(Debug, Deserialize)]
pub struct GtfsFeedForm {
    pub gtfsurl: String,
    pub enablevalidation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GtfsFeedRef {
    pub feed_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GtfsRtFeedRequest {
    pub gtfs_rt_url: Option<String>,
    pub gtfs_feed_model: Option<GtfsFeedRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorQuery {
    pub client_id: Option<String>,
    pub update_interval: Option<u64>,
    /// `"false"` turns off shape based checks
    pub enable_shapes: Option<String>,
}

/// Query for iteration lookups; `-1` (the default) means the latest stored one
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IterationQuery {
    pub iteration_id: i64,
    pub gtfs_rt_id: i64,
}

impl Default for IterationQuery {
    fn default() -> Self {
        Self { iteration_id: -1, gtfs_rt_id: 0 }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientQuery {
    pub client_id: Option<String>,
}

pub use gtfs_feed::{delete_gtfs_feed, gtfs_feed_error_count, list_gtfs_feeds, register_gtfs_feed};
pub use gtfs_rt_feed::{list_gtfs_rt_feeds, register_gtfs_rt_feed};
pub use monitor::{
    close_session, feed_message, iteration_errors, iteration_summary, message_details, monitor_data, past_sessions,
    start_monitor,
};

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use anyhow::Result;

    use crate::config::Config;
    use crate::data::Database;
    use crate::services::fetcher::tests::StubFetcher;
    use crate::state::AppState;

    pub(crate) struct TestApp {
        pub state: AppState,
        pub database: Database,
        pub fetcher: Arc<StubFetcher>,
        pub _dir: tempfile::TempDir,
    }

    pub(crate) fn test_app() -> Result<TestApp> {
        let dir = tempfile::tempdir()?;
        let database = Database::in_memory()?;
        let config = Config::new(0, dir.path().to_path_buf(), dir.path().join("validator.db"));
        let fetcher = Arc::new(StubFetcher::default());
        let state = AppState::with_fetcher(&database, config, fetcher.clone());
        Ok(TestApp { state, database, fetcher, _dir: dir })
    }
}
