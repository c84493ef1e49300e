use serde::{Deserialize, Serialize};
use std::fmt;

use super::gtfs_feed::GtfsFeedId;

/// Unique identifier for GTFS-realtime feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GtfsRtFeedId(pub i64);

impl fmt::Display for GtfsRtFeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GTFS-realtime URL monitored against one static GTFS feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GtfsRtFeed {
    pub gtfs_rt_id: GtfsRtFeedId,
    pub gtfs_rt_url: String,
    pub gtfs_feed_id: GtfsFeedId,
    pub enable_shapes: bool,
}

/// Unique identifier for monitoring iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IterationId(pub i64);

impl fmt::Display for IterationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fetch of a realtime feed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GtfsRtFeedIteration {
    pub iteration_id: IterationId,
    pub rt_feed_id: GtfsRtFeedId,
    /// When the feed was fetched, in milliseconds
    #[serde(rename = "timeStamp")]
    pub iteration_timestamp: i64,
    /// Header timestamp in milliseconds; seconds once formatted for display
    pub feed_timestamp: i64,
    /// Raw protobuf, absent when identical to the previous iteration
    #[serde(skip)]
    pub feed_protobuf: Option<Vec<u8>>,
    #[serde(skip)]
    pub feed_hash: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

impl GtfsRtFeedIteration {
    pub fn new(
        rt_feed_id: GtfsRtFeedId,
        iteration_timestamp: i64,
        feed_timestamp: i64,
        feed_protobuf: Option<Vec<u8>>,
        feed_hash: Vec<u8>,
    ) -> Self {
        Self {
            iteration_id: IterationId(0),
            rt_feed_id,
            iteration_timestamp,
            feed_timestamp,
            feed_protobuf,
            feed_hash,
            date_format: None,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.feed_protobuf.is_some()
    }
}
