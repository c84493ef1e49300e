use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a rule reports a hard error or a best-practice warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn from_str(s: &str) -> Self {
        match s {
            "WARNING" => Self::Warning,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A validation rule from the catalog. Ids starting with `W` are warnings, `E` are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub error_id: &'static str,
    pub severity: Severity,
    pub title: &'static str,
    pub error_description: &'static str,
    /// Appended to an occurrence prefix to form a readable message
    pub occurrence_suffix: &'static str,
}

impl ValidationRule {
    pub const fn new(
        error_id: &'static str,
        severity: Severity,
        title: &'static str,
        error_description: &'static str,
        occurrence_suffix: &'static str,
    ) -> Self {
        Self { error_id, severity, title, error_description, occurrence_suffix }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.error_id, self.title)
    }
}
