use serde::Serialize;
use std::fmt;

use super::gtfs_rt_feed::IterationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted rule hit: one row per (iteration, rule)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLog {
    pub message_id: MessageId,
    pub iteration_id: IterationId,
    pub error_id: String,
    pub error_details: Option<String>,
}

/// A persisted occurrence of a rule hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub occurrence_id: i64,
    pub message_id: MessageId,
    pub prefix: String,
}
