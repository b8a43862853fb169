//! Semantic diff of two document trees.
//!
//! Header fields are compared one by one; body sections are paired by code, then title, then
//! position, and compared recursively. Paths read `header.<field>` and
//! `body.section[<key>].section[<key>]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{ClinicalDocument, DocumentBody, DocumentHeader, Section};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Removed => write!(f, "removed"),
            ChangeType::Modified => write!(f, "modified"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub path: String,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl Difference {
    pub fn added(path: impl Into<String>, new_value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            change_type: ChangeType::Added,
            old_value: None,
            new_value,
        }
    }

    pub fn removed(path: impl Into<String>, old_value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            change_type: ChangeType::Removed,
            old_value,
            new_value: None,
        }
    }

    pub fn modified(
        path: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            change_type: ChangeType::Modified,
            old_value,
            new_value,
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.change_type, self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub are_identical: bool,
    pub header_differences: Vec<Difference>,
    pub body_differences: Vec<Difference>,
}

impl ComparisonResult {
    fn new(header_differences: Vec<Difference>, body_differences: Vec<Difference>) -> Self {
        Self {
            are_identical: header_differences.is_empty() && body_differences.is_empty(),
            header_differences,
            body_differences,
        }
    }

    pub fn differences(&self) -> impl Iterator<Item = &Difference> {
        self.header_differences.iter().chain(&self.body_differences)
    }

    pub fn len(&self) -> usize {
        self.header_differences.len() + self.body_differences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.are_identical
    }

    pub fn find(&self, path: &str) -> Option<&Difference> {
        self.differences().find(|difference| difference.path == path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentComparator;

impl DocumentComparator {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(&self, a: &ClinicalDocument, b: &ClinicalDocument) -> ComparisonResult {
        let header_differences = compare_headers(&a.header, &b.header);

        let mut body_differences = Vec::new();
        compare_bodies(&a.body, &b.body, &mut body_differences);

        ComparisonResult::new(header_differences, body_differences)
    }
}

fn to_json<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(Value::Null) | Err(_) => None,
        Ok(Value::Array(items)) if items.is_empty() => None,
        Ok(value) => Some(value),
    }
}

macro_rules! compare_field {
    ($out:ident, $a:expr, $b:expr, $name:literal) => {
        if $a != $b {
            $out.push(Difference::modified(
                concat!("header.", $name),
                to_json(&$a),
                to_json(&$b),
            ));
        }
    };
}

fn compare_headers(a: &DocumentHeader, b: &DocumentHeader) -> Vec<Difference> {
    let mut out = Vec::new();

    compare_field!(out, a.id, b.id, "id");
    compare_field!(out, a.template_ids, b.template_ids, "templateId");
    compare_field!(out, a.code, b.code, "code");
    compare_field!(out, a.title, b.title, "title");
    compare_field!(out, a.effective_time, b.effective_time, "effectiveTime");
    compare_field!(
        out,
        a.confidentiality_code,
        b.confidentiality_code,
        "confidentialityCode"
    );
    compare_field!(out, a.language_code, b.language_code, "languageCode");
    compare_field!(out, a.set_id, b.set_id, "setId");
    compare_field!(out, a.version_number, b.version_number, "versionNumber");
    compare_field!(out, a.record_targets, b.record_targets, "recordTarget");
    compare_field!(out, a.authors, b.authors, "author");
    compare_field!(out, a.custodian, b.custodian, "custodian");
    compare_field!(
        out,
        a.related_documents,
        b.related_documents,
        "relatedDocument"
    );

    out
}

fn compare_bodies(a: &DocumentBody, b: &DocumentBody, out: &mut Vec<Difference>) {
    match (a, b) {
        (DocumentBody::Structured(left), DocumentBody::Structured(right)) => {
            compare_sections(&left.sections, &right.sections, "body", out);
        }
        (DocumentBody::NonXml(left), DocumentBody::NonXml(right)) => {
            if left != right {
                out.push(Difference::modified("body", to_json(left), to_json(right)));
            }
        }
        _ => out.push(Difference::modified(
            "body",
            Some(Value::from(a.kind())),
            Some(Value::from(b.kind())),
        )),
    }
}

/// Pairing key of a section within its sibling list.
#[derive(Debug, PartialEq)]
enum SectionKey<'a> {
    Code(&'a str, Option<&'a str>),
    Title(&'a str),
    Position(usize),
}

impl<'a> SectionKey<'a> {
    fn of(section: &'a Section, position: usize) -> Self {
        match (&section.code, &section.title) {
            (Some(code), _) => SectionKey::Code(&code.code, code.code_system.as_deref()),
            (None, Some(title)) => SectionKey::Title(title),
            (None, None) => SectionKey::Position(position),
        }
    }

    fn label(&self) -> String {
        match self {
            SectionKey::Code(code, _) => (*code).to_string(),
            SectionKey::Title(title) => (*title).to_string(),
            SectionKey::Position(position) => position.to_string(),
        }
    }
}

fn compare_sections(a: &[Section], b: &[Section], prefix: &str, out: &mut Vec<Difference>) {
    let b_keys: Vec<SectionKey<'_>> = b
        .iter()
        .enumerate()
        .map(|(position, section)| SectionKey::of(section, position))
        .collect();
    let mut paired = vec![false; b.len()];

    for (position, left) in a.iter().enumerate() {
        let key = SectionKey::of(left, position);
        let path = format!("{}.section[{}]", prefix, key.label());

        let partner = b_keys
            .iter()
            .enumerate()
            .position(|(index, candidate)| !paired[index] && *candidate == key);

        match partner {
            Some(index) => {
                paired[index] = true;
                let right = &b[index];
                if left.title != right.title
                    || left.text != right.text
                    || left.entries != right.entries
                {
                    out.push(Difference::modified(
                        path.clone(),
                        to_json(&shallow(left)),
                        to_json(&shallow(right)),
                    ));
                }
                compare_sections(&left.subsections, &right.subsections, &path, out);
            }
            None => out.push(Difference::removed(path, to_json(left))),
        }
    }

    for (index, right) in b.iter().enumerate() {
        if !paired[index] {
            let path = format!("{}.section[{}]", prefix, b_keys[index].label());
            out.push(Difference::added(path, to_json(right)));
        }
    }
}

/// The section without its subsections, which are reported separately.
fn shallow(section: &Section) -> Section {
    Section {
        subsections: Vec::new(),
        ..section.clone()
    }
}
