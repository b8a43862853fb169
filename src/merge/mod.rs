//! Policy-driven merging of two document trees.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{ClinicalDocument, DocumentBody, Entry, Section, StructuredBody};
use crate::utils::{ContentFingerprint, fingerprint_of};

/// How the merger resolves a section present in both documents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Primary's entries first, then secondary's; secondary-only sections dropped.
    #[default]
    KeepPrimary,
    /// Secondary's entries replace primary's in matched sections.
    KeepSecondary,
    /// Like `KeepPrimary`, and secondary-only sections are appended.
    IncludeBoth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MergeConfiguration {
    pub conflict_strategy: ConflictStrategy,
    pub merge_entries: bool,
    pub deduplicate_entries: bool,
}

impl Default for MergeConfiguration {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategy::KeepPrimary,
            merge_entries: true,
            deduplicate_entries: true,
        }
    }
}

impl MergeConfiguration {
    pub fn with_strategy(mut self, conflict_strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = conflict_strategy;
        self
    }

    pub fn with_merge_entries(mut self, merge_entries: bool) -> Self {
        self.merge_entries = merge_entries;
        self
    }

    pub fn with_deduplication(mut self, deduplicate_entries: bool) -> Self {
        self.deduplicate_entries = deduplicate_entries;
        self
    }
}

/// Combines a primary and a secondary document into a new one.
///
/// The header always comes from the primary. Sections are walked in primary order and paired
/// with secondary sections by code, falling back to title; the configuration decides what
/// happens to the entries of paired sections and to sections only the secondary has.
#[derive(Debug, Clone, Default)]
pub struct DocumentMerger {
    config: MergeConfiguration,
}

impl DocumentMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MergeConfiguration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfiguration {
        &self.config
    }

    pub fn merge(
        &self,
        primary: &ClinicalDocument,
        secondary: &ClinicalDocument,
    ) -> ClinicalDocument {
        let DocumentBody::Structured(primary_body) = &primary.body else {
            tracing::debug!(
                "Primary document {} has a non-structured body; returned unchanged",
                primary.id()
            );
            return primary.clone();
        };

        let sections = self.merge_sections(&primary_body.sections, secondary.body.sections());

        ClinicalDocument {
            header: primary.header.clone(),
            body: DocumentBody::Structured(StructuredBody { sections }),
        }
    }

    fn merge_sections(&self, primary: &[Section], secondary: &[Section]) -> Vec<Section> {
        let mut consumed = vec![false; secondary.len()];
        let mut merged = Vec::with_capacity(primary.len());

        for section in primary {
            let partner = secondary
                .iter()
                .enumerate()
                .find(|(index, candidate)| !consumed[*index] && sections_match(section, candidate));

            match partner {
                Some((index, candidate)) => {
                    consumed[index] = true;
                    merged.push(self.merge_matched(section, candidate));
                }
                None => merged.push(section.clone()),
            }
        }

        if self.config.conflict_strategy == ConflictStrategy::IncludeBoth {
            merged.extend(
                secondary
                    .iter()
                    .zip(&consumed)
                    .filter(|(_, used)| !**used)
                    .map(|(section, _)| section.clone()),
            );
        }

        merged
    }

    fn merge_matched(&self, primary: &Section, secondary: &Section) -> Section {
        let keep_secondary = self.config.conflict_strategy == ConflictStrategy::KeepSecondary;

        let entries = match (self.config.merge_entries, keep_secondary) {
            (true, true) => self.finish_entries(secondary.entries.clone()),
            (true, false) => self.finish_entries(
                primary
                    .entries
                    .iter()
                    .chain(&secondary.entries)
                    .cloned()
                    .collect(),
            ),
            (false, true) => secondary.entries.clone(),
            (false, false) => primary.entries.clone(),
        };

        Section {
            code: primary.code.clone().or_else(|| secondary.code.clone()),
            title: primary.title.clone().or_else(|| secondary.title.clone()),
            text: primary.text.clone().or_else(|| secondary.text.clone()),
            template_ids: primary.template_ids.clone(),
            entries,
            subsections: self.merge_sections(&primary.subsections, &secondary.subsections),
        }
    }

    fn finish_entries(&self, entries: Vec<Entry>) -> Vec<Entry> {
        if self.config.deduplicate_entries {
            deduplicate(entries)
        } else {
            entries
        }
    }
}

fn sections_match(a: &Section, b: &Section) -> bool {
    match (&a.code, &b.code) {
        (Some(left), Some(right)) => left.same_concept(right),
        _ => a.title.is_some() && a.title == b.title,
    }
}

/// Drop structurally equal entries, keeping the first occurrence.
///
/// Fingerprints bucket the entries; within a bucket `==` decides, so values that serialize
/// alike without being equal (NaN and infinite quantities both serialize as `null`) survive.
pub fn deduplicate(entries: Vec<Entry>) -> Vec<Entry> {
    let before = entries.len();
    let mut buckets: HashMap<ContentFingerprint, Vec<usize>> = HashMap::with_capacity(before);
    let mut unique: Vec<Entry> = Vec::with_capacity(before);

    for entry in entries {
        match fingerprint_of(&entry) {
            Some(fingerprint) => {
                let bucket = buckets.entry(fingerprint).or_default();
                if bucket.iter().any(|&kept| unique[kept] == entry) {
                    continue;
                }
                bucket.push(unique.len());
                unique.push(entry);
            }
            None => unique.push(entry),
        }
    }

    if unique.len() < before {
        tracing::debug!("Removed {} duplicate entries", before - unique.len());
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ClinicalStatement, CodedValue, EntryValue, InstanceIdentifier, NonXmlBody, PhysicalQuantity,
    };
    use chrono::{TimeZone, Utc};

    const LOINC: &str = "2.16.840.1.113883.6.1";

    fn observation(code: &str) -> Entry {
        Entry::Observation(ClinicalStatement::new(CodedValue::new(code, LOINC)))
    }

    fn section(code: &str, entries: &[&str]) -> Section {
        entries.iter().fold(
            Section::new().with_code(CodedValue::new(code, LOINC)),
            |section, entry| section.with_entry(observation(entry)),
        )
    }

    fn document(id: &str, sections: Vec<Section>) -> ClinicalDocument {
        sections.into_iter().fold(
            ClinicalDocument::new(
                InstanceIdentifier::new(id),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ),
            |document, section| document.with_section(section),
        )
    }

    fn entry_codes(section: &Section) -> Vec<&str> {
        section
            .entries
            .iter()
            .map(|entry| entry.code().code.as_str())
            .collect()
    }

    #[test]
    fn test_keep_secondary_replaces_entries() {
        let primary = document("p", vec![section("8716-3", &["a", "b"])]);
        let secondary = document("s", vec![section("8716-3", &["b", "c"])]);

        let merger = DocumentMerger::with_config(
            MergeConfiguration::default().with_strategy(ConflictStrategy::KeepSecondary),
        );
        let merged = merger.merge(&primary, &secondary);

        assert_eq!(entry_codes(&merged.body.sections()[0]), vec!["b", "c"]);
        assert_eq!(merged.header, primary.header);
    }

    #[test]
    fn test_without_entry_merge_strategy_picks_side() {
        let primary = document("p", vec![section("8716-3", &["a"])]);
        let secondary = document("s", vec![section("8716-3", &["b"])]);

        let keep_primary = DocumentMerger::with_config(
            MergeConfiguration::default().with_merge_entries(false),
        );
        assert_eq!(
            entry_codes(&keep_primary.merge(&primary, &secondary).body.sections()[0]),
            vec!["a"]
        );

        let keep_secondary = DocumentMerger::with_config(
            MergeConfiguration::default()
                .with_merge_entries(false)
                .with_strategy(ConflictStrategy::KeepSecondary),
        );
        assert_eq!(
            entry_codes(&keep_secondary.merge(&primary, &secondary).body.sections()[0]),
            vec!["b"]
        );
    }

    #[test]
    fn test_title_fallback_and_subsections() {
        let primary = document(
            "p",
            vec![Section::new()
                .with_title("Plan")
                .with_subsection(section("18776-5", &["a"]))],
        );
        let secondary = document(
            "s",
            vec![Section::new()
                .with_title("Plan")
                .with_subsection(section("18776-5", &["a", "b"]))],
        );

        let merged = DocumentMerger::new().merge(&primary, &secondary);
        let plan = &merged.body.sections()[0];

        assert_eq!(merged.body.sections().len(), 1);
        assert_eq!(entry_codes(&plan.subsections[0]), vec!["a", "b"]);
    }

    #[test]
    fn test_non_structured_primary_is_returned_unchanged() {
        let primary = document("p", vec![]).with_body(DocumentBody::NonXml(NonXmlBody {
            media_type: "application/pdf".to_string(),
            reference: "scan.pdf".to_string(),
        }));
        let secondary = document("s", vec![section("8716-3", &["a"])]);

        assert_eq!(DocumentMerger::new().merge(&primary, &secondary), primary);
    }

    #[test]
    fn test_deduplication_can_be_disabled() {
        let primary = document("p", vec![section("8716-3", &["a"])]);
        let secondary = document("s", vec![section("8716-3", &["a"])]);

        let merger =
            DocumentMerger::with_config(MergeConfiguration::default().with_deduplication(false));
        let merged = merger.merge(&primary, &secondary);

        assert_eq!(entry_codes(&merged.body.sections()[0]), vec!["a", "a"]);
    }

    fn blood_pressure(value: f64) -> Entry {
        Entry::Observation(
            ClinicalStatement::new(CodedValue::new("8480-6", LOINC))
                .with_value(EntryValue::PhysicalQuantity(PhysicalQuantity::new(value, "mm[Hg]"))),
        )
    }

    #[test]
    fn test_signed_zero_quantities_collapse() {
        assert_eq!(blood_pressure(0.0), blood_pressure(-0.0));

        let primary = document(
            "p",
            vec![Section::new().with_title("Vitals").with_entry(blood_pressure(0.0))],
        );
        let secondary = document(
            "s",
            vec![Section::new().with_title("Vitals").with_entry(blood_pressure(-0.0))],
        );

        let merged = DocumentMerger::new().merge(&primary, &secondary);
        assert_eq!(merged.body.sections()[0].entries, vec![blood_pressure(0.0)]);
    }

    #[test]
    fn test_dedup_agrees_with_equality_for_non_finite_values() {
        let entries = vec![
            blood_pressure(f64::NAN),
            blood_pressure(f64::INFINITY),
            blood_pressure(f64::NAN),
            blood_pressure(f64::NEG_INFINITY),
        ];

        let unique = deduplicate(entries);

        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0], blood_pressure(f64::NAN));
        assert_eq!(unique[1], blood_pressure(f64::INFINITY));
        assert_eq!(unique[2], blood_pressure(f64::NEG_INFINITY));
    }
}
