pub mod validator;
pub mod value_set;

use serde::{Deserialize, Serialize};

use crate::error::{CdaTemplateError, Result};
use crate::types::ConstraintSeverity;

pub use validator::ConstraintValidator;
pub use value_set::{InMemoryValueSets, ValueSetProvider};

/// Result of validation containing all issues found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether validation passed (no errors)
    pub is_valid: bool,

    /// All validation issues found, in constraint order
    pub issues: Vec<ValidationIssue>,

    /// Summary statistics
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl ValidationResult {
    /// Create a new validation result from a list of issues
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let error_count = issues
            .iter()
            .filter(|i| matches!(i.severity, ValidationSeverity::Error))
            .count();
        let warning_count = issues
            .iter()
            .filter(|i| matches!(i.severity, ValidationSeverity::Warning))
            .count();
        let info_count = issues
            .iter()
            .filter(|i| matches!(i.severity, ValidationSeverity::Information))
            .count();

        Self {
            is_valid: error_count == 0,
            issues,
            error_count,
            warning_count,
            info_count,
        }
    }

    /// Create a successful validation result with no issues
    pub fn success() -> Self {
        Self::from_issues(Vec::new())
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;
        self.is_valid = self.is_valid && other.is_valid;
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| matches!(i.severity, ValidationSeverity::Error))
    }

    /// `Ok` with the result when valid, otherwise `ValidationFailed` carrying every issue.
    pub fn into_error(self) -> Result<ValidationResult> {
        if self.is_valid {
            Ok(self)
        } else {
            Err(CdaTemplateError::validation_failed(self.issues))
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::success()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Information,
}

impl From<ConstraintSeverity> for ValidationSeverity {
    fn from(severity: ConstraintSeverity) -> Self {
        match severity {
            ConstraintSeverity::Error => ValidationSeverity::Error,
            ConstraintSeverity::Warning => ValidationSeverity::Warning,
            ConstraintSeverity::Information => ValidationSeverity::Information,
        }
    }
}

impl ValidationIssue {
    pub fn new(
        severity: ValidationSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Warning, code, message)
    }

    pub fn information(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Information, code, message)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Issue codes raised by [`ConstraintValidator`].
pub mod codes {
    pub const CARDINALITY_MIN: &str = "cardinality-min-violation";
    pub const CARDINALITY_MAX: &str = "cardinality-max-violation";
    pub const VALUE_MISMATCH: &str = "value-mismatch";
    pub const INVALID_PATH: &str = "invalid-path";
    pub const REQUIRED_ELEMENT_MISSING: &str = "required-element-missing";
    pub const VALUE_SET_BINDING: &str = "value-set-binding";
    pub const PROJECTION_FAILED: &str = "projection-failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_follow_severity() {
        let result = ValidationResult::from_issues(vec![
            ValidationIssue::error(codes::CARDINALITY_MIN, "missing"),
            ValidationIssue::warning(codes::VALUE_SET_BINDING, "not in set"),
            ValidationIssue::information(codes::VALUE_SET_BINDING, "unknown set"),
        ]);

        assert!(!result.is_valid);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.info_count, 1);
    }

    #[test]
    fn test_warnings_alone_stay_valid() {
        let result =
            ValidationResult::from_issues(vec![ValidationIssue::warning("x", "advisory")]);
        assert!(result.is_valid);
        assert!(result.into_error().is_ok());
    }

    #[test]
    fn test_merge_and_into_error() {
        let mut result = ValidationResult::success();
        result.merge(ValidationResult::from_issues(vec![
            ValidationIssue::error(codes::VALUE_MISMATCH, "wrong code").with_path("code/@code"),
        ]));

        assert!(!result.is_valid);
        assert_eq!(result.errors().count(), 1);

        match result.into_error() {
            Err(CdaTemplateError::ValidationFailed { issues }) => {
                assert_eq!(issues[0].path.as_deref(), Some("code/@code"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
