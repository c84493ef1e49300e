use serde::{Deserialize, Serialize};
use std::fmt;

use super::gtfs_rt_feed::GtfsRtFeedId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One client watching one realtime feed, from start to close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub rt_feed_id: GtfsRtFeedId,
    pub client_id: String,
    pub session_start_time: i64,
    pub session_end_time: i64,
    pub error_count: i64,
    pub warning_count: i64,
}

impl Session {
    pub fn new(rt_feed_id: GtfsRtFeedId, client_id: String, session_start_time: i64) -> Self {
        Self {
            session_id: SessionId(0),
            rt_feed_id,
            client_id,
            session_start_time,
            session_end_time: 0,
            error_count: 0,
            warning_count: 0,
        }
    }
}

/// A past session as listed for its client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub row_id: usize,
    pub start_time_format: String,
    pub end_time_format: String,
    pub total_time: String,
}
