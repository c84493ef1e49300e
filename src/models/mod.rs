pub mod error_list;
pub mod gtfs_feed;
pub mod gtfs_rt_feed;
pub mod message_log;
pub mod monitor;
pub mod session;
pub mod validation_rule;

pub use error_list::{ErrorListHelperModel, MessageLogModel, OccurrenceModel};
pub use gtfs_feed::{GtfsFeed, GtfsFeedId};
pub use gtfs_rt_feed::{GtfsRtFeed, GtfsRtFeedId, GtfsRtFeedIteration, IterationId};
pub use message_log::{MessageId, MessageLog, Occurrence};
pub use monitor::{
    CombinedIterationMessage, CombinedMessageOccurrence, IterationErrorList, IterationMessage, MergeMonitorData,
    ViewErrorLog, ViewErrorSummary, ViewGtfsRtFeedErrorCount, ViewIterationError,
};
pub use session::{Session, SessionId, SessionView};
pub use validation_rule::{Severity, ValidationRule};
