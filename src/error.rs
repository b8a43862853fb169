use thiserror::Error;

use crate::validation::ValidationIssue;

#[derive(Error, Debug)]
pub enum CdaTemplateError {
    #[error("Template not found: {template_id}")]
    TemplateNotFound { template_id: String },

    #[error("Circular template dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Invalid constraint at '{path}': {message}")]
    InvalidConstraint { path: String, message: String },

    #[error("Validation failed with {} issue(s){}", .issues.len(), first_issue_suffix(.issues))]
    ValidationFailed { issues: Vec<ValidationIssue> },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn first_issue_suffix(issues: &[ValidationIssue]) -> String {
    match issues.first() {
        Some(issue) => format!(
            ", first at '{}': {}",
            issue.path.as_deref().unwrap_or("<document>"),
            issue.message
        ),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CdaTemplateError>;

impl CdaTemplateError {
    pub fn template_not_found<S: Into<String>>(template_id: S) -> Self {
        Self::TemplateNotFound {
            template_id: template_id.into(),
        }
    }

    pub fn circular_dependency(chain: Vec<String>) -> Self {
        Self::CircularDependency { chain }
    }

    pub fn invalid_constraint<S: Into<String>>(path: S, message: S) -> Self {
        Self::InvalidConstraint {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation_failed(issues: Vec<ValidationIssue>) -> Self {
        Self::ValidationFailed { issues }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if retrying the failed operation could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TemplateNotFound { .. } => false,
            Self::CircularDependency { .. } => false,
            Self::InvalidConstraint { .. } => false,
            Self::ValidationFailed { .. } => false,
            Self::Configuration { .. } => false,
            Self::Serialization { .. } => false,
            Self::Io { .. } => true,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "not_found",
            Self::CircularDependency { .. } => "catalog",
            Self::InvalidConstraint { .. } => "catalog",
            Self::ValidationFailed { .. } => "validation",
            Self::Configuration { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
            Self::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_names_chain() {
        let err = CdaTemplateError::circular_dependency(vec![
            "2.16.840.1.113883.10.20.22.1.1".to_string(),
            "2.16.840.1.113883.10.20.22.1.2".to_string(),
            "2.16.840.1.113883.10.20.22.1.1".to_string(),
        ]);

        assert_eq!(
            err.to_string(),
            "Circular template dependency detected: 2.16.840.1.113883.10.20.22.1.1 -> \
             2.16.840.1.113883.10.20.22.1.2 -> 2.16.840.1.113883.10.20.22.1.1"
        );
        assert_eq!(err.category(), "catalog");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_not_found_names_template() {
        let err = CdaTemplateError::template_not_found("1.2.3");
        assert!(err.to_string().contains("1.2.3"));
    }

    #[test]
    fn test_validation_failed_names_first_path() {
        let err = CdaTemplateError::validation_failed(vec![ValidationIssue::error(
            "cardinality-min-violation",
            "expected at least 2",
        )
        .with_path("author")]);

        let message = err.to_string();
        assert!(message.contains("1 issue(s)"));
        assert!(message.contains("'author'"));
    }
}
