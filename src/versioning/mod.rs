//! Version-succession bookkeeping over document sets.
//!
//! A document set is identified by `setId` (or, for a first version without one, by the
//! document's own id). Each new version copies the header, bumps `versionNumber`, and records a
//! `relatedDocument` link to the version it was derived from.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::types::{
    ClinicalDocument, DocumentBody, InstanceIdentifier, ParentDocument, RelatedDocument,
    RelationshipType,
};

/// Version coordinates of a document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo<'a> {
    pub version_number: Option<u32>,
    pub set_id: InstanceIdentifier,
    pub document: &'a ClinicalDocument,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VersionManager;

impl VersionManager {
    pub fn new() -> Self {
        Self
    }

    /// Derive the next version of `original`.
    ///
    /// The new document keeps `original`'s set (or starts one from `original.id`), carries
    /// `original`'s version plus one, and links back to `original` with `relationship`.
    /// The version number saturates at `u32::MAX`; the back link still identifies the
    /// predecessor.
    pub fn create_new_version(
        &self,
        original: &ClinicalDocument,
        new_id: InstanceIdentifier,
        new_effective_time: DateTime<Utc>,
        relationship: RelationshipType,
        body: Option<DocumentBody>,
    ) -> ClinicalDocument {
        let set_id = set_id_of(original).clone();
        let previous_version = original.header.version_number.unwrap_or(1);
        let next_version = previous_version.saturating_add(1);

        let mut header = original.header.clone();
        header.id = new_id;
        header.effective_time = new_effective_time;
        header.set_id = Some(set_id.clone());
        header.version_number = Some(next_version);
        header.related_documents.push(RelatedDocument {
            type_code: relationship,
            parent_document: ParentDocument {
                id: original.header.id.clone(),
                set_id: Some(set_id),
                version_number: Some(previous_version),
            },
        });

        tracing::debug!(
            "Created version {} of {} ({} {})",
            next_version,
            header.id,
            relationship.type_code(),
            original.header.id
        );

        ClinicalDocument {
            header,
            body: body.unwrap_or_else(|| original.body.clone()),
        }
    }

    /// [`create_new_version`](Self::create_new_version) with a random UUID id, effective now.
    pub fn create_new_version_with_generated_id(
        &self,
        original: &ClinicalDocument,
        relationship: RelationshipType,
        body: Option<DocumentBody>,
    ) -> ClinicalDocument {
        self.create_new_version(
            original,
            InstanceIdentifier::generate(),
            Utc::now(),
            relationship,
            body,
        )
    }

    pub fn extract_version_info<'a>(&self, document: &'a ClinicalDocument) -> VersionInfo<'a> {
        VersionInfo {
            version_number: document.header.version_number,
            set_id: set_id_of(document).clone(),
            document,
        }
    }

    /// Whether `candidate` directly follows `ancestor`.
    ///
    /// An explicit `RPLC` link to `ancestor.id` decides it; otherwise both must share a `setId`
    /// and `candidate` must carry `ancestor`'s version plus one (an unversioned ancestor counts
    /// as version 1). An ancestor at `u32::MAX` has no numeric successor.
    pub fn is_successor(&self, candidate: &ClinicalDocument, ancestor: &ClinicalDocument) -> bool {
        let replaces = candidate.header.related_documents.iter().any(|related| {
            related.type_code == RelationshipType::Replace
                && related.parent_document.id == ancestor.header.id
        });
        if replaces {
            return true;
        }

        match (
            &candidate.header.set_id,
            &ancestor.header.set_id,
            candidate.header.version_number,
        ) {
            (Some(candidate_set), Some(ancestor_set), Some(version)) => {
                candidate_set == ancestor_set
                    && ancestor
                        .header
                        .version_number
                        .unwrap_or(1)
                        .checked_add(1)
                        .is_some_and(|expected| version == expected)
            }
            _ => false,
        }
    }

    /// Ascending by version number; unversioned documents sort as version 0. Stable.
    pub fn sort_by_version(&self, documents: &[ClinicalDocument]) -> Vec<ClinicalDocument> {
        let mut sorted = documents.to_vec();
        sorted.sort_by_key(version_key);
        sorted
    }

    /// Documents keyed by set id (own id when unset), each group sorted by version.
    pub fn group_by_document_set(
        &self,
        documents: &[ClinicalDocument],
    ) -> BTreeMap<InstanceIdentifier, Vec<ClinicalDocument>> {
        let mut groups: BTreeMap<InstanceIdentifier, Vec<ClinicalDocument>> = BTreeMap::new();
        for document in documents {
            groups
                .entry(set_id_of(document).clone())
                .or_default()
                .push(document.clone());
        }
        for group in groups.values_mut() {
            group.sort_by_key(version_key);
        }
        groups
    }

    /// Highest-versioned document; on ties the later one in input order.
    pub fn latest_version<'a>(
        &self,
        documents: &'a [ClinicalDocument],
    ) -> Option<&'a ClinicalDocument> {
        documents.iter().max_by_key(|document| version_key(document))
    }

    /// Predecessors of `leaf` found in `documents`, oldest first, ending with `leaf`.
    pub fn version_chain(
        &self,
        documents: &[ClinicalDocument],
        leaf: &ClinicalDocument,
    ) -> Vec<ClinicalDocument> {
        let mut chain = vec![leaf.clone()];
        let mut visited = HashSet::from([leaf.header.id.clone()]);
        let mut current = leaf;

        loop {
            let predecessor = documents.iter().find(|candidate| {
                !visited.contains(&candidate.header.id) && self.is_successor(current, candidate)
            });
            let Some(previous) = predecessor else {
                break;
            };

            visited.insert(previous.header.id.clone());
            chain.push(previous.clone());
            current = previous;
        }

        chain.reverse();
        chain
    }
}

fn set_id_of(document: &ClinicalDocument) -> &InstanceIdentifier {
    document
        .header
        .set_id
        .as_ref()
        .unwrap_or(&document.header.id)
}

fn version_key(document: &ClinicalDocument) -> u32 {
    document.header.version_number.unwrap_or(0)
}
