use serde::Serialize;

use super::validation_rule::ValidationRule;

/// One violation of a rule. Read together with the rule's occurrence suffix,
/// e.g. prefix `trip_id 6234` + suffix `does not appear in the GTFS trips.txt file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceModel {
    pub prefix: String,
}

impl OccurrenceModel {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

/// The rule a list of occurrences belongs to, before it has been persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLogModel {
    pub validation_rule: ValidationRule,
}

/// Everything a validator found for a single rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorListHelperModel {
    pub error_message: MessageLogModel,
    pub occurrence_list: Vec<OccurrenceModel>,
}

impl ErrorListHelperModel {
    pub fn rule(&self) -> &ValidationRule {
        &self.error_message.validation_rule
    }

    pub fn error_id(&self) -> &'static str {
        self.error_message.validation_rule.error_id
    }
}
