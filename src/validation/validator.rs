//! Structural validation of a document tree against composed template constraints.
//!
//! The document is projected to JSON once per call and every constraint path is resolved
//! against that projection. Validation never fails as an operation; malformed paths are reported
//! as `invalid-path` issues alongside the structural findings.

use serde_json::Value;
use std::sync::Arc;

use crate::types::{
    ClinicalDocument, CodedValue, ElementPath, TemplateConstraint, TemplateDefinition,
    scalar_text,
};
use crate::validation::{
    ValidationIssue, ValidationResult, ValidationSeverity, ValueSetProvider, codes,
};

#[derive(Clone, Default)]
pub struct ConstraintValidator {
    value_sets: Option<Arc<dyn ValueSetProvider>>,
}

impl ConstraintValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that also checks `value_set_bindings` in [`validate_template`](Self::validate_template).
    pub fn with_value_sets(value_sets: Arc<dyn ValueSetProvider>) -> Self {
        Self {
            value_sets: Some(value_sets),
        }
    }

    /// Check every constraint against `document`, in order.
    pub fn validate(
        &self,
        constraints: &[TemplateConstraint],
        document: &ClinicalDocument,
    ) -> ValidationResult {
        let projection = match project(document) {
            Ok(projection) => projection,
            Err(issue) => return ValidationResult::from_issues(vec![issue]),
        };

        let mut issues = Vec::new();
        for constraint in constraints {
            check_constraint(constraint, &projection, &mut issues);
        }

        ValidationResult::from_issues(issues)
    }

    /// Validate against a composed template: its constraints, its required elements and,
    /// when a value-set provider is configured, its value-set bindings.
    pub fn validate_template(
        &self,
        template: &TemplateDefinition,
        document: &ClinicalDocument,
    ) -> ValidationResult {
        let projection = match project(document) {
            Ok(projection) => projection,
            Err(issue) => return ValidationResult::from_issues(vec![issue]),
        };

        let mut issues = Vec::new();
        for constraint in &template.constraints {
            check_constraint(constraint, &projection, &mut issues);
        }

        for raw in &template.required_elements {
            let Some(path) = parse_or_report(raw, &mut issues) else {
                continue;
            };
            if path.resolve(&projection).is_empty() {
                issues.push(
                    ValidationIssue::error(
                        codes::REQUIRED_ELEMENT_MISSING,
                        format!(
                            "Template {} requires element '{}'",
                            template.template_id, raw
                        ),
                    )
                    .with_path(raw.as_str()),
                );
            }
        }

        if let Some(value_sets) = &self.value_sets {
            for (raw, value_set) in &template.value_set_bindings {
                let Some(path) = parse_or_report(raw, &mut issues) else {
                    continue;
                };
                check_binding(
                    value_sets.as_ref(),
                    &path,
                    value_set,
                    &projection,
                    &mut issues,
                );
            }
        }

        let result = ValidationResult::from_issues(issues);
        tracing::debug!(
            "Validated document against {}: {} errors, {} warnings",
            template.template_id,
            result.error_count,
            result.warning_count
        );
        result
    }
}

impl std::fmt::Debug for ConstraintValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintValidator")
            .field("value_sets", &self.value_sets.is_some())
            .finish()
    }
}

fn project(document: &ClinicalDocument) -> Result<Value, ValidationIssue> {
    serde_json::to_value(document).map_err(|e| {
        ValidationIssue::error(
            codes::PROJECTION_FAILED,
            format!("Document {} could not be projected: {}", document.id(), e),
        )
    })
}

fn parse_or_report(raw: &str, issues: &mut Vec<ValidationIssue>) -> Option<ElementPath> {
    match ElementPath::parse(raw) {
        Ok(path) => Some(path),
        Err(e) => {
            issues.push(ValidationIssue::error(codes::INVALID_PATH, e.to_string()).with_path(raw));
            None
        }
    }
}

fn check_constraint(
    constraint: &TemplateConstraint,
    projection: &Value,
    issues: &mut Vec<ValidationIssue>,
) {
    let raw = constraint.element_path.as_str();
    let Some(path) = parse_or_report(raw, issues) else {
        return;
    };

    let severity = ValidationSeverity::from(constraint.severity);
    let matches = path.resolve(projection);
    let count = matches.len();
    let cardinality = constraint.cardinality;

    if count < cardinality.min as usize {
        issues.push(
            ValidationIssue::new(
                severity,
                codes::CARDINALITY_MIN,
                format!(
                    "Expected at least {} occurrence(s) of '{}' ({}), found {} ({} missing)",
                    cardinality.min,
                    raw,
                    cardinality,
                    count,
                    cardinality.min as usize - count
                ),
            )
            .with_path(raw),
        );
    }

    if let Some(max) = cardinality.max {
        if count > max as usize {
            issues.push(
                ValidationIssue::new(
                    severity,
                    codes::CARDINALITY_MAX,
                    format!(
                        "Expected at most {} occurrence(s) of '{}' ({}), found {}",
                        max, raw, cardinality, count
                    ),
                )
                .with_path(raw),
            );
        }
    }

    if let Some(expected) = &constraint.value_constraint {
        let mismatched: Vec<String> = matches
            .iter()
            .filter_map(|node| match scalar_text(node) {
                Some(text) if text == *expected => None,
                Some(text) => Some(text),
                None => Some("<structured>".to_string()),
            })
            .collect();

        if let Some(first) = mismatched.first() {
            issues.push(
                ValidationIssue::new(
                    severity,
                    codes::VALUE_MISMATCH,
                    format!(
                        "Expected '{}' at '{}', found '{}'{}",
                        expected,
                        raw,
                        first,
                        if mismatched.len() > 1 {
                            format!(" and {} more", mismatched.len() - 1)
                        } else {
                            String::new()
                        }
                    ),
                )
                .with_path(raw),
            );
        }
    }
}

fn check_binding(
    value_sets: &dyn ValueSetProvider,
    path: &ElementPath,
    value_set: &str,
    projection: &Value,
    issues: &mut Vec<ValidationIssue>,
) {
    for node in path.resolve(projection) {
        let Some(coded) = coded_value(node) else {
            continue;
        };

        match value_sets.contains(value_set, &coded) {
            Some(true) => {}
            Some(false) => issues.push(
                ValidationIssue::warning(
                    codes::VALUE_SET_BINDING,
                    format!("Code {} is not in value set {}", coded, value_set),
                )
                .with_path(path.as_str()),
            ),
            None => {
                issues.push(
                    ValidationIssue::information(
                        codes::VALUE_SET_BINDING,
                        format!("Value set {} is not known; binding not checked", value_set),
                    )
                    .with_path(path.as_str()),
                );
                return;
            }
        }
    }
}

fn coded_value(node: &Value) -> Option<CodedValue> {
    match node {
        Value::Object(_) => serde_json::from_value(node.clone()).ok(),
        other => scalar_text(other).map(|code| CodedValue {
            code,
            code_system: None,
            code_system_name: None,
            display_name: None,
        }),
    }
}
