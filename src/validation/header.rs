use log::warn;

use super::feed_utils::{is_full_dataset, is_v2_or_higher, is_valid_version};
use super::rules::{E038, E039, E049};
use super::{FeedEntityValidator, Findings};
use crate::gtfs::GtfsMetadata;
use crate::models::ErrorListHelperModel;
use crate::realtime::FeedMessage;

/// Rules for the feed header: E038, E039, E049
pub struct HeaderValidator;

impl FeedEntityValidator for HeaderValidator {
    fn name(&self) -> &'static str {
        "HeaderValidator"
    }

    fn validate(
        &self,
        _current_time_millis: i64,
        _gtfs_metadata: &GtfsMetadata,
        feed_message: &FeedMessage,
        _previous_feed_message: Option<&FeedMessage>,
        _combined_feed_message: Option<&FeedMessage>,
    ) -> Vec<ErrorListHelperModel> {
        let mut findings = Findings::new();
        let header = &feed_message.header;

        if !is_valid_version(header) {
            findings.add(E038, format!("header.gtfs_realtime_version of {}", header.gtfs_realtime_version));
        }

        match is_v2_or_higher(header) {
            Some(true) if header.incrementality.is_none() => findings.add(E049, ""),
            Some(_) => {}
            None => warn!(
                "Couldn't read header version '{}' when checking E049",
                header.gtfs_realtime_version
            ),
        }

        if is_full_dataset(header) {
            for entity in &feed_message.entity {
                if let Some(is_deleted) = entity.is_deleted {
                    findings.add(E039, format!("entity ID {} has is_deleted={}", entity.id, is_deleted));
                }
            }
        }

        findings.into_results()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::metadata::tests::sample_metadata;
    use crate::realtime::FeedEntity;
    use crate::validation::tests::{count, message, prefixes, NOW_MILLIS};

    fn run(feed_message: &FeedMessage) -> Vec<ErrorListHelperModel> {
        HeaderValidator.validate(NOW_MILLIS, &sample_metadata(), feed_message, None, None)
    }

    #[test]
    fn test_valid_header() {
        assert!(run(&message(vec![])).is_empty());
    }

    #[test]
    fn test_invalid_version() {
        let mut feed = message(vec![]);
        feed.header.gtfs_realtime_version = "3.0".to_string();
        let results = run(&feed);
        assert_eq!(prefixes(&results, &E038), vec!["header.gtfs_realtime_version of 3.0"]);
    }

    #[test]
    fn test_missing_incrementality() {
        let mut feed = message(vec![]);
        feed.header.incrementality = None;
        assert_eq!(count(&run(&feed), &E049), 1);

        // v1 feeds may omit it
        feed.header.gtfs_realtime_version = "1.0".to_string();
        assert_eq!(count(&run(&feed), &E049), 0);
    }

    #[test]
    fn test_is_deleted_in_full_dataset() {
        let entity = FeedEntity { id: "1".to_string(), is_deleted: Some(false), ..Default::default() };
        let mut feed = message(vec![entity]);
        assert_eq!(prefixes(&run(&feed), &E039), vec!["entity ID 1 has is_deleted=false"]);

        // DIFFERENTIAL feeds may use is_deleted
        feed.header.incrementality = Some(1);
        assert_eq!(count(&run(&feed), &E039), 0);
    }
}
