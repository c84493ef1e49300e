//! Read models computed by the monitoring queries and returned by the REST API.

use serde::Serialize;

use super::gtfs_rt_feed::{GtfsRtFeedId, IterationId};
use super::message_log::{MessageLog, Occurrence};

/// One row per rule seen in the monitoring window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewErrorSummary {
    pub rt_feed_id: GtfsRtFeedId,
    pub id: String,
    pub severity: String,
    pub title: String,
    pub count: i64,
    /// Latest fetch time, in milliseconds
    pub last_time: i64,
    /// Latest feed header time; milliseconds in the database, seconds once formatted
    pub last_feed_time: i64,
    pub last_iteration_id: IterationId,
    pub last_row_id: i64,
    pub formatted_timestamp: String,
    pub time_zone: Option<String>,
}

/// One row per (iteration, rule) seen in the monitoring window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewErrorLog {
    pub row_id: i64,
    pub rt_feed_id: GtfsRtFeedId,
    pub id: String,
    pub severity: String,
    pub title: String,
    pub iteration_id: IterationId,
    /// Feed header time; milliseconds in the database, seconds once formatted
    pub occurrence: i64,
    pub logging_time: i64,
    pub formatted_timestamp: String,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewGtfsRtFeedErrorCount {
    pub id: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeMonitorData {
    pub iteration_count: i64,
    pub unique_feed_count: i64,
    pub view_error_summary_model_list: Vec<ViewErrorSummary>,
    pub view_error_log_model_list: Vec<ViewErrorLog>,
    pub view_gtfs_rt_feed_error_count_model_list: Vec<ViewGtfsRtFeedErrorCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewIterationError {
    pub row_id: i64,
    pub iteration_id: IterationId,
    pub error_id: String,
    pub title: String,
    pub occurrence_prefix: String,
}

/// All occurrences of one rule in one iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationErrorList {
    pub error_id: String,
    pub title: String,
    pub error_occurrences: usize,
    pub view_iteration_errors_model_list: Vec<ViewIterationError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationMessage {
    pub iteration_id: IterationId,
    pub rt_feed_id: GtfsRtFeedId,
    pub time_stamp: i64,
    /// Decoded feed, absent for duplicate iterations
    pub feed_message: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedMessageOccurrence {
    pub message_log_model: MessageLog,
    pub occurrence_models: Vec<Occurrence>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedIterationMessage {
    pub gtfs_feed_iteration_model: IterationMessage,
    pub message_occurrence_list: Vec<CombinedMessageOccurrence>,
}
