pub mod cross_feed;
pub mod feed_utils;
pub mod frequency_type_one;
pub mod frequency_type_zero;
pub mod header;
pub mod rules;
pub mod statistics;
pub mod stop;
pub mod stop_location_type;
pub mod stop_time_update;
pub mod time;
pub mod timestamp;
pub mod trip_descriptor;
pub mod vehicle;

use log::debug;

use crate::gtfs::GtfsMetadata;
use crate::models::{ErrorListHelperModel, MessageLogModel, OccurrenceModel, ValidationRule};
use crate::realtime::FeedMessage;

pub use cross_feed::CrossFeedDescriptorValidator;
pub use frequency_type_one::FrequencyTypeOneValidator;
pub use frequency_type_zero::FrequencyTypeZeroValidator;
pub use header::HeaderValidator;
pub use statistics::{IterationStatistics, RuleStatistics};
pub use stop::StopValidator;
pub use stop_location_type::StopLocationTypeValidator;
pub use stop_time_update::StopTimeUpdateValidator;
pub use timestamp::TimestampValidator;
pub use trip_descriptor::TripDescriptorValidator;
pub use vehicle::VehicleValidator;

/// A set of rules checked against one GTFS-realtime message.
///
/// `previous_feed_message` is the last distinct message seen for the same feed, and
/// `combined_feed_message` holds every entity type published for the GTFS feed when
/// trip updates and vehicle positions can be cross-checked.
pub trait FeedEntityValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(
        &self,
        current_time_millis: i64,
        gtfs_metadata: &GtfsMetadata,
        feed_message: &FeedMessage,
        previous_feed_message: Option<&FeedMessage>,
        combined_feed_message: Option<&FeedMessage>,
    ) -> Vec<ErrorListHelperModel>;
}

/// Every realtime validator, in the order they run for each iteration
pub fn default_validators() -> Vec<Box<dyn FeedEntityValidator>> {
    vec![
        Box::new(CrossFeedDescriptorValidator),
        Box::new(VehicleValidator),
        Box::new(TimestampValidator),
        Box::new(StopTimeUpdateValidator),
        Box::new(TripDescriptorValidator),
        Box::new(StopValidator),
        Box::new(FrequencyTypeZeroValidator),
        Box::new(FrequencyTypeOneValidator),
        Box::new(HeaderValidator),
    ]
}

/// Collects occurrences per rule while a validator walks a message
#[derive(Debug, Default)]
pub struct Findings {
    lists: Vec<(ValidationRule, Vec<OccurrenceModel>)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: ValidationRule, prefix: impl Into<String>) {
        let occurrence = OccurrenceModel::new(prefix);
        debug!("{} - {} {}", rule.error_id, occurrence.prefix, rule.occurrence_suffix);

        match self.lists.iter_mut().find(|(r, _)| r.error_id == rule.error_id) {
            Some((_, occurrences)) => occurrences.push(occurrence),
            None => self.lists.push((rule, vec![occurrence])),
        }
    }

    pub fn count(&self, rule: &ValidationRule) -> usize {
        self.lists
            .iter()
            .find(|(r, _)| r.error_id == rule.error_id)
            .map_or(0, |(_, occurrences)| occurrences.len())
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// One entry per rule that was hit, in the order the rules were first hit
    pub fn into_results(self) -> Vec<ErrorListHelperModel> {
        self.lists
            .into_iter()
            .map(|(validation_rule, occurrence_list)| ErrorListHelperModel {
                error_message: MessageLogModel { validation_rule },
                occurrence_list,
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::realtime::{FeedEntity, FeedHeader};

    pub(crate) const NOW_MILLIS: i64 = 1_500_000_000_000;
    pub(crate) const NOW_SECS: u64 = 1_500_000_000;

    pub(crate) fn message(entities: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: Some(0),
                timestamp: Some(NOW_SECS),
            },
            entity: entities,
        }
    }

    /// Prefixes reported for a rule, empty when the rule was not hit
    pub(crate) fn prefixes(results: &[ErrorListHelperModel], rule: &ValidationRule) -> Vec<String> {
        results
            .iter()
            .filter(|r| r.error_id() == rule.error_id)
            .flat_map(|r| r.occurrence_list.iter().map(|o| o.prefix.clone()))
            .collect()
    }

    pub(crate) fn count(results: &[ErrorListHelperModel], rule: &ValidationRule) -> usize {
        prefixes(results, rule).len()
    }

    #[test]
    fn test_findings_group_by_rule() {
        let mut findings = Findings::new();
        assert!(findings.is_empty());
        findings.add(rules::E001, "header.timestamp");
        findings.add(rules::W001, "header");
        findings.add(rules::E001, "trip_id 1 timestamp 5");
        assert_eq!(findings.count(&rules::E001), 2);

        let results = findings.into_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].error_id(), "E001");
        assert_eq!(results[0].occurrence_list[1].prefix, "trip_id 1 timestamp 5");
    }

    #[test]
    fn test_results_serialize_like_batch_output() -> anyhow::Result<()> {
        let mut findings = Findings::new();
        findings.add(rules::E038, "header.gtfs_realtime_version of 3.0");
        let json = serde_json::to_value(findings.into_results())?;

        assert_eq!(json[0]["errorMessage"]["validationRule"]["errorId"], "E038");
        assert_eq!(json[0]["errorMessage"]["validationRule"]["severity"], "ERROR");
        assert_eq!(json[0]["occurrenceList"][0]["prefix"], "header.gtfs_realtime_version of 3.0");
        Ok(())
    }

    #[test]
    fn test_default_validator_order() {
        let names: Vec<&str> = default_validators().iter().map(|v| v.name()).collect();
        assert_eq!(names.first(), Some(&"CrossFeedDescriptorValidator"));
        assert_eq!(names.last(), Some(&"HeaderValidator"));
        assert_eq!(names.len(), 9);
    }
}
