use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CdaTemplateError, Result};
use crate::types::ElementPath;

/// Allowed occurrence count of an element. `max == None` means unbounded (`*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Cardinality {
    pub min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl Cardinality {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// `1..*`
    pub fn required() -> Self {
        Self { min: 1, max: None }
    }

    /// `0..*`
    pub fn optional() -> Self {
        Self { min: 0, max: None }
    }

    pub fn exactly(count: u32) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub fn at_least(min: u32) -> Self {
        Self { min, max: None }
    }

    pub fn range(min: u32, max: u32) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn allows(&self, count: usize) -> bool {
        count >= self.min as usize && self.max.is_none_or(|max| count <= max as usize)
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::required()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

/// Conformance strength of a constraint (SHALL / SHOULD / MAY).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    #[default]
    Error,
    Warning,
    Information,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConstraint {
    pub element_path: String,

    #[serde(default)]
    pub cardinality: Cardinality,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_constraint: Option<String>,

    #[serde(default)]
    pub severity: ConstraintSeverity,
}

impl TemplateConstraint {
    pub fn new(element_path: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            element_path: element_path.into(),
            cardinality,
            value_constraint: None,
            severity: ConstraintSeverity::Error,
        }
    }

    pub fn required(element_path: impl Into<String>) -> Self {
        Self::new(element_path, Cardinality::required())
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value_constraint = Some(value.into());
        self
    }

    pub fn with_severity(mut self, severity: ConstraintSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Reject structurally nonsensical constraints before they reach a document.
    pub fn check(&self) -> Result<()> {
        ElementPath::parse(&self.element_path)?;

        if let Some(max) = self.cardinality.max {
            if max < self.cardinality.min {
                return Err(CdaTemplateError::invalid_constraint(
                    self.element_path.clone(),
                    format!("cardinality {} has max below min", self.cardinality),
                ));
            }
        }

        if self.cardinality.max == Some(0) && self.value_constraint.is_some() {
            return Err(CdaTemplateError::invalid_constraint(
                self.element_path.clone(),
                "a prohibited element cannot carry a fixed value".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_allows() {
        assert!(Cardinality::required().allows(1));
        assert!(Cardinality::required().allows(42));
        assert!(!Cardinality::required().allows(0));
        assert!(Cardinality::range(0, 1).allows(0));
        assert!(!Cardinality::range(0, 1).allows(2));
        assert!(Cardinality::exactly(2).allows(2));
        assert!(!Cardinality::exactly(2).allows(3));
    }

    #[test]
    fn test_cardinality_display() {
        assert_eq!(Cardinality::required().to_string(), "1..*");
        assert_eq!(Cardinality::range(0, 1).to_string(), "0..1");
    }

    #[test]
    fn test_check_rejects_inverted_cardinality() {
        let constraint = TemplateConstraint::new("author", Cardinality::range(3, 1));
        let err = constraint.check().unwrap_err();
        assert!(matches!(err, CdaTemplateError::InvalidConstraint { ref path, .. } if path == "author"));
    }

    #[test]
    fn test_check_rejects_malformed_path() {
        let constraint = TemplateConstraint::required("code/@code/extra");
        assert!(constraint.check().is_err());

        let constraint = TemplateConstraint::required("code//code");
        assert!(constraint.check().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let constraint: TemplateConstraint =
            serde_json::from_str(r#"{"elementPath": "code/@code", "valueConstraint": "34133-9"}"#)
                .unwrap();

        assert_eq!(constraint.cardinality, Cardinality::required());
        assert_eq!(constraint.severity, ConstraintSeverity::Error);
        assert_eq!(constraint.value_constraint.as_deref(), Some("34133-9"));
        assert!(constraint.check().is_ok());
    }
}
