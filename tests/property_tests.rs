//! Property-based tests for the document tools.
//!
//! Uses proptest to generate document trees (including NaN, infinite and signed-zero
//! quantities) and verify:
//! - Comparator reflexivity and symmetry of identity
//! - Merged entries are unique and de-duplication is idempotent
//! - Version sorting is ordered and stable

mod common;

use common::*;
use octofhir_cda::*;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn entry_code() -> impl Strategy<Value = String> {
    "[0-9]{4,5}-[0-9]"
}

fn quantity() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(0.0),
        Just(-0.0),
        -500.0..500.0f64,
    ]
}

fn entry_value() -> impl Strategy<Value = Option<EntryValue>> {
    prop::option::of(prop_oneof![
        quantity().prop_map(|value| EntryValue::PhysicalQuantity(PhysicalQuantity::new(
            value, "mm[Hg]"
        ))),
        "[a-z]{1,8}".prop_map(|value| EntryValue::Text { value }),
        (0i64..100).prop_map(|value| EntryValue::Integer { value }),
        any::<bool>().prop_map(|value| EntryValue::Boolean { value }),
    ])
}

fn entry_strategy() -> impl Strategy<Value = Entry> {
    (entry_code(), entry_value()).prop_map(|(code, value)| {
        let statement = ClinicalStatement::new(loinc(&code));
        match value {
            Some(value) => Entry::Observation(statement.with_value(value)),
            None => Entry::Observation(statement),
        }
    })
}

fn section_strategy() -> impl Strategy<Value = Section> {
    (
        prop::option::of(prop_oneof![
            Just("48765-2"),
            Just("10160-0"),
            Just("11450-4"),
            Just("30954-2"),
        ]),
        prop::option::of("[A-Z][a-z]{3,10}"),
        prop::collection::vec(entry_strategy(), 0..5),
    )
        .prop_map(|(code, title, entries)| {
            let mut section = Section::new();
            if let Some(code) = code {
                section = section.with_code(loinc(code));
            }
            if let Some(title) = title {
                section = section.with_title(title);
            }
            entries
                .into_iter()
                .fold(section, |section, entry| section.with_entry(entry))
        })
}

fn document_strategy() -> impl Strategy<Value = ClinicalDocument> {
    (
        "[A-Z]{3}-[0-9]{1,3}",
        prop::option::of("[A-Z][a-z ]{3,20}"),
        prop::option::of(1u32..10),
        prop::collection::vec(section_strategy(), 0..4),
    )
        .prop_map(|(id, title, version, sections)| {
            let mut document = ClinicalDocument::new(InstanceIdentifier::new(id), timestamp(1));
            if let Some(title) = title {
                document = document.with_title(title);
            }
            if let Some(version) = version {
                document = document.with_version_number(version);
            }
            sections
                .into_iter()
                .fold(document, |document, section| document.with_section(section))
        })
}

fn version_of(document: &ClinicalDocument) -> u32 {
    document.header.version_number.unwrap_or(0)
}

fn include_both() -> DocumentMerger {
    DocumentMerger::with_config(
        MergeConfiguration::default().with_strategy(ConflictStrategy::IncludeBoth),
    )
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn comparator_is_reflexive(document in document_strategy()) {
        let result = DocumentComparator::new().compare(&document, &document);
        prop_assert!(result.are_identical);
        prop_assert_eq!(result.len(), 0);
    }

    #[test]
    fn comparator_identity_is_symmetric(a in document_strategy(), b in document_strategy()) {
        let comparator = DocumentComparator::new();
        prop_assert_eq!(
            comparator.compare(&a, &b).are_identical,
            comparator.compare(&b, &a).are_identical
        );
    }

    #[test]
    fn merged_entries_are_unique(
        primary in document_strategy(),
        secondary in document_strategy(),
    ) {
        let merger = include_both();
        let merged = merger.merge(&primary, &secondary);

        // Every section whose entries were merged carries no duplicate entries.
        for section in merged.body.sections() {
            let paired = primary.body.sections().iter().any(|p| p == section)
                || secondary.body.sections().iter().any(|s| s == section);
            if !paired {
                let mut seen = Vec::new();
                for entry in &section.entries {
                    prop_assert!(!seen.contains(&entry));
                    seen.push(entry);
                }
            }
        }

        prop_assert_eq!(merged.header, primary.header);
    }

    #[test]
    fn deduplication_is_idempotent(entries in prop::collection::vec(entry_strategy(), 0..12)) {
        let once = merge::deduplicate(entries);
        let twice = merge::deduplicate(once.clone());

        for (index, kept) in once.iter().enumerate() {
            for later in &once[index + 1..] {
                prop_assert_ne!(kept, later);
            }
        }
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merging_with_itself_only_deduplicates(document in document_strategy()) {
        let merged = include_both().merge(&document, &document);

        // Sections with neither code nor title never pair, so their secondary copies are appended.
        let unpairable = document
            .body
            .sections()
            .iter()
            .filter(|s| s.code.is_none() && s.title.is_none())
            .count();
        prop_assert_eq!(
            merged.body.sections().len(),
            document.body.sections().len() + unpairable
        );

        let sections = merged.body.sections().iter().zip(document.body.sections());
        for (merged_section, original) in sections {
            let unique = merge::deduplicate(original.entries.clone());
            let matched = original.code.is_some() || original.title.is_some();
            if matched {
                prop_assert_eq!(&merged_section.entries, &unique);
            } else {
                prop_assert_eq!(&merged_section.entries, &original.entries);
            }
        }
    }

    #[test]
    fn sort_by_version_is_ordered_and_stable(
        documents in prop::collection::vec(document_strategy(), 0..12),
    ) {
        let sorted = VersionManager::new().sort_by_version(&documents);
        prop_assert_eq!(sorted.len(), documents.len());

        for pair in sorted.windows(2) {
            prop_assert!(version_of(&pair[0]) <= version_of(&pair[1]));
        }

        // Equal versions keep input order.
        for version in 0..10u32 {
            let original: Vec<_> = documents.iter().filter(|d| version_of(d) == version).collect();
            let after: Vec<_> = sorted.iter().filter(|d| version_of(d) == version).collect();
            prop_assert_eq!(original, after);
        }
    }

    #[test]
    fn new_version_always_succeeds_original(document in document_strategy(), day in 2u32..28) {
        let manager = VersionManager::new();
        let next = manager.create_new_version(
            &document,
            InstanceIdentifier::new("NEXT"),
            timestamp(day),
            RelationshipType::Replace,
            None,
        );

        prop_assert!(manager.is_successor(&next, &document));
        prop_assert_eq!(
            next.header.version_number,
            Some(document.header.version_number.unwrap_or(1) + 1)
        );
        prop_assert_eq!(
            manager.version_chain(&[document.clone()], &next).len(),
            2
        );
    }
}
