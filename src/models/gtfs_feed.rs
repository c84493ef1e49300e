use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for static GTFS feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GtfsFeedId(pub i64);

impl fmt::Display for GtfsFeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A static GTFS zip that has been downloaded to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GtfsFeed {
    pub feed_id: GtfsFeedId,
    pub gtfs_url: String,
    /// Path of the downloaded zip file
    pub feed_location: String,
    /// When the feed was first registered, in milliseconds
    pub start_time: i64,
    /// Timezone id of the first agency in agency.txt
    pub agency: Option<String>,
    #[serde(skip)]
    pub checksum: Vec<u8>,
    pub error_count: i64,
}

impl GtfsFeed {
    /// Creates an unsaved feed; the id is assigned when the row is inserted
    pub fn new(gtfs_url: String, feed_location: String, checksum: Vec<u8>, start_time: i64) -> Self {
        Self {
            feed_id: GtfsFeedId(0),
            gtfs_url,
            feed_location,
            start_time,
            agency: None,
            checksum,
            error_count: 0,
        }
    }
}
