use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{CdaTemplateError, Result};

static SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@?[A-Za-z][A-Za-z0-9_-]*$").expect("segment pattern is a valid regex")
});

/// One step of an element path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Child element (or collection of elements) by name.
    Element(String),
    /// `@name` attribute of the current element; must resolve to a scalar.
    Attribute(String),
}

impl PathSegment {
    pub fn name(&self) -> &str {
        match self {
            PathSegment::Element(name) | PathSegment::Attribute(name) => name,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Element(name) => write!(f, "{name}"),
            PathSegment::Attribute(name) => write!(f, "@{name}"),
        }
    }
}

/// A parsed element path such as `code/@code` or `component/structuredBody/section`.
///
/// Segments are separated by `/` or `.`; an attribute segment may only appear last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl ElementPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CdaTemplateError::invalid_constraint(
                raw.to_string(),
                "element path is empty".to_string(),
            ));
        }

        let parts: Vec<&str> = trimmed.split(['/', '.']).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            if !SEGMENT_PATTERN.is_match(part) {
                return Err(CdaTemplateError::invalid_constraint(
                    raw.to_string(),
                    format!("segment {} ('{}') is not a valid element name", index + 1, part),
                ));
            }

            match part.strip_prefix('@') {
                Some(attribute) => {
                    if index != parts.len() - 1 {
                        return Err(CdaTemplateError::invalid_constraint(
                            raw.to_string(),
                            format!("attribute '@{attribute}' must be the last segment"),
                        ));
                    }
                    segments.push(PathSegment::Attribute(attribute.to_string()));
                }
                None => segments.push(PathSegment::Element(part.to_string())),
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn targets_attribute(&self) -> bool {
        matches!(self.segments.last(), Some(PathSegment::Attribute(_)))
    }

    /// Locate every node this path names inside `root`.
    ///
    /// Arrays are flattened at each step, and `null` contributes no match, so the result length
    /// is the occurrence count used for cardinality checks.
    pub fn resolve<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current: Vec<&'a Value> = vec![root];

        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                let Some(child) = node.get(segment.name()) else {
                    continue;
                };
                match segment {
                    PathSegment::Element(_) => push_flattened(child, &mut next),
                    PathSegment::Attribute(_) => {
                        if is_scalar(child) {
                            next.push(child);
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        current
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn push_flattened<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                push_flattened(item, out);
            }
        }
        other => out.push(other),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Text form of a resolved node for value comparison; `None` for structured nodes.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
