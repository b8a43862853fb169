use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::TemplateConstraint;
use crate::error::Result;

/// A named, versioned schema fragment identified by an OID-style template id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    pub template_id: String,
    pub name: String,

    #[serde(default)]
    pub required_elements: BTreeSet<String>,

    #[serde(default)]
    pub optional_elements: BTreeSet<String>,

    /// Order is significant: composed templates list ancestor constraints first.
    #[serde(default)]
    pub constraints: Vec<TemplateConstraint>,

    #[serde(default)]
    pub value_set_bindings: BTreeMap<String, String>,
}

impl TemplateDefinition {
    pub fn new(template_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            name: name.into(),
            required_elements: BTreeSet::new(),
            optional_elements: BTreeSet::new(),
            constraints: Vec::new(),
            value_set_bindings: BTreeMap::new(),
        }
    }

    pub fn with_required(mut self, path: impl Into<String>) -> Self {
        self.required_elements.insert(path.into());
        self
    }

    pub fn with_optional(mut self, path: impl Into<String>) -> Self {
        self.optional_elements.insert(path.into());
        self
    }

    pub fn with_constraint(mut self, constraint: TemplateConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_binding(mut self, path: impl Into<String>, value_set: impl Into<String>) -> Self {
        self.value_set_bindings.insert(path.into(), value_set.into());
        self
    }

    /// Fold a more-derived definition into this one.
    ///
    /// Element sets are unioned, constraints concatenated with `derived` last, and value-set
    /// bindings merged with `derived` winning on key collisions. Identity stays with `self`.
    pub fn absorb(&mut self, derived: &TemplateDefinition) {
        self.required_elements
            .extend(derived.required_elements.iter().cloned());
        self.optional_elements
            .extend(derived.optional_elements.iter().cloned());
        self.constraints.extend(derived.constraints.iter().cloned());
        for (path, value_set) in &derived.value_set_bindings {
            self.value_set_bindings
                .insert(path.clone(), value_set.clone());
        }
    }

    pub fn check_constraints(&self) -> Result<()> {
        for constraint in &self.constraints {
            constraint.check()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    #[default]
    Draft,
    Active,
    Deprecated,
    Retired,
}

impl TemplateStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, TemplateStatus::Draft | TemplateStatus::Active)
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateStatus::Draft => write!(f, "draft"),
            TemplateStatus::Active => write!(f, "active"),
            TemplateStatus::Deprecated => write!(f, "deprecated"),
            TemplateStatus::Retired => write!(f, "retired"),
        }
    }
}

/// A template definition plus inheritance links and publication metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTemplateDefinition {
    #[serde(flatten)]
    pub definition: TemplateDefinition,

    /// Declaration order defines the multiple-inheritance merge order.
    #[serde(default)]
    pub parent_template_ids: Vec<String>,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub status: TemplateStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Document-type tags, e.g. `CCD` or `discharge-summary`.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl EnhancedTemplateDefinition {
    pub fn new(definition: TemplateDefinition) -> Self {
        Self {
            definition,
            parent_template_ids: Vec::new(),
            version: default_version(),
            status: TemplateStatus::Draft,
            publication_date: None,
            author: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn template_id(&self) -> &str {
        &self.definition.template_id
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_template_ids.push(parent_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_status(mut self, status: TemplateStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_publication_date(mut self, date: NaiveDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

impl From<TemplateDefinition> for EnhancedTemplateDefinition {
    fn from(definition: TemplateDefinition) -> Self {
        Self::new(definition)
    }
}
