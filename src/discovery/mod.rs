//! Read-only queries over the template store.
//!
//! Tag lookups go through a lock-free index keyed by lowercase tag. The index remembers the
//! store generation it was built from and is rebuilt on the first lookup after any write.

use papaya::HashMap as PapayaMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::storage::{TemplateSnapshot, TemplateStorage};
use crate::types::{EnhancedTemplateDefinition, TemplateStatus};

/// Index generation while the index has never been built or is being rebuilt.
const UNINDEXED: u64 = u64::MAX;

/// Filter for [`TemplateDiscovery::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TemplateQuery {
    pub author: Option<String>,
    pub status: Option<TemplateStatus>,
    /// Every tag listed must be present.
    pub tags: Vec<String>,
    /// Case-insensitive substring of id, name, author or any tag.
    pub text: Option<String>,
    /// Direct parent template id.
    pub parent: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl TemplateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_status(mut self, status: TemplateStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    fn matches(&self, template: &EnhancedTemplateDefinition) -> bool {
        if let Some(author) = &self.author {
            if !author_matches(template, author) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if template.status != status {
                return false;
            }
        }
        if !self.tags.iter().all(|tag| has_tag(template, tag)) {
            return false;
        }
        if let Some(text) = &self.text {
            if !text_matches(template, &text.to_lowercase()) {
                return false;
            }
        }
        if let Some(parent) = &self.parent {
            if !template.parent_template_ids.contains(parent) {
                return false;
            }
        }
        true
    }
}

pub struct TemplateDiscovery {
    store: Arc<dyn TemplateStorage>,
    tag_index: PapayaMap<String, Vec<String>>,
    indexed_generation: AtomicU64,
    rebuild_lock: Mutex<()>,
}

impl TemplateDiscovery {
    pub fn new(store: Arc<dyn TemplateStorage>) -> Self {
        Self {
            store,
            tag_index: PapayaMap::new(),
            indexed_generation: AtomicU64::new(UNINDEXED),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub async fn by_author(&self, author: &str) -> Vec<EnhancedTemplateDefinition> {
        self.query(&TemplateQuery::new().with_author(author)).await
    }

    pub async fn by_status(&self, status: TemplateStatus) -> Vec<EnhancedTemplateDefinition> {
        self.query(&TemplateQuery::new().with_status(status)).await
    }

    /// Templates carrying document-type `tag` (case-insensitive), ordered by template id.
    pub async fn by_tag(&self, tag: &str) -> Vec<EnhancedTemplateDefinition> {
        let snapshot = self.store.snapshot().await;
        self.tagged_in(&snapshot, &tag.to_lowercase()).await
    }

    async fn tagged_in(
        &self,
        snapshot: &TemplateSnapshot,
        tag: &str,
    ) -> Vec<EnhancedTemplateDefinition> {
        self.refresh_index(snapshot).await;

        let ids = match self.read_index(snapshot, |index| index.pin().get(tag).cloned()) {
            Some(ids) => ids.unwrap_or_default(),
            None => tag_map(snapshot).remove(tag).unwrap_or_default(),
        };

        ids.iter()
            .filter_map(|id| snapshot.get(id))
            .map(|record| record.to_enhanced())
            .filter(|template| has_tag(template, tag))
            .collect()
    }

    pub async fn search(&self, text: &str) -> Vec<EnhancedTemplateDefinition> {
        self.query(&TemplateQuery::new().with_text(text)).await
    }

    /// All templates matching `query`, ordered by template id, then paged.
    pub async fn query(&self, query: &TemplateQuery) -> Vec<EnhancedTemplateDefinition> {
        let snapshot = self.store.snapshot().await;

        let mut matched: Vec<EnhancedTemplateDefinition> = snapshot
            .records()
            .map(|record| record.to_enhanced())
            .filter(|template| query.matches(template))
            .collect();
        matched.sort_by(|a, b| a.template_id().cmp(b.template_id()));

        matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Ancestor ids of `template_id`, root first.
    pub async fn ancestors(&self, template_id: &str) -> Result<Vec<String>> {
        self.store.snapshot().await.ancestor_chain(template_id)
    }

    /// Ids of every template inheriting from `template_id`, directly or transitively.
    pub async fn descendants(&self, template_id: &str) -> BTreeSet<String> {
        self.store.snapshot().await.descendants(template_id)
    }

    /// Every indexed tag with its template count.
    pub async fn tags(&self) -> BTreeMap<String, usize> {
        let snapshot = self.store.snapshot().await;
        self.refresh_index(&snapshot).await;

        let counts = self.read_index(&snapshot, |index| {
            index
                .pin()
                .iter()
                .map(|(tag, ids)| (tag.clone(), ids.len()))
                .collect()
        });
        counts.unwrap_or_else(|| {
            tag_map(&snapshot)
                .into_iter()
                .map(|(tag, ids)| (tag, ids.len()))
                .collect()
        })
    }

    /// Run `read` against the index when it reflects exactly `snapshot`'s generation.
    ///
    /// `None` means the index belongs to another generation (or was rebuilt mid-read) and the
    /// caller has to fall back to scanning its snapshot.
    fn read_index<T>(
        &self,
        snapshot: &TemplateSnapshot,
        read: impl FnOnce(&PapayaMap<String, Vec<String>>) -> T,
    ) -> Option<T> {
        let generation = snapshot.generation();
        if self.indexed_generation.load(Ordering::Acquire) != generation {
            return None;
        }
        let value = read(&self.tag_index);
        (self.indexed_generation.load(Ordering::Acquire) == generation).then_some(value)
    }

    fn is_behind(&self, generation: u64) -> bool {
        let indexed = self.indexed_generation.load(Ordering::Acquire);
        indexed == UNINDEXED || generation > indexed
    }

    /// Bring the index up to `snapshot` unless it already reflects the same or a newer store
    /// generation.
    async fn refresh_index(&self, snapshot: &TemplateSnapshot) {
        let generation = snapshot.generation();
        if !self.is_behind(generation) {
            return;
        }

        let _rebuild = self.rebuild_lock.lock().await;
        if !self.is_behind(generation) {
            return;
        }

        let fresh = tag_map(snapshot);
        let tag_count = fresh.len();

        self.indexed_generation.store(UNINDEXED, Ordering::Release);
        let guard = self.tag_index.pin();
        let stale: Vec<String> = guard
            .keys()
            .filter(|tag| !fresh.contains_key(*tag))
            .cloned()
            .collect();
        for (tag, ids) in fresh {
            guard.insert(tag, ids);
        }
        for tag in stale {
            guard.remove(&tag);
        }
        self.indexed_generation.store(generation, Ordering::Release);

        tracing::debug!(
            "Rebuilt template tag index: {} tags at generation {}",
            tag_count,
            generation
        );
    }
}

impl std::fmt::Debug for TemplateDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateDiscovery")
            .field(
                "indexed_generation",
                &self.indexed_generation.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Lowercase tag to sorted, de-duplicated template ids.
fn tag_map(snapshot: &TemplateSnapshot) -> BTreeMap<String, Vec<String>> {
    let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in snapshot.records() {
        if let Some(enhanced) = record.enhanced() {
            for tag in &enhanced.tags {
                tags.entry(tag.to_lowercase())
                    .or_default()
                    .push(enhanced.template_id().to_string());
            }
        }
    }
    for ids in tags.values_mut() {
        ids.sort();
        ids.dedup();
    }
    tags
}

fn author_matches(template: &EnhancedTemplateDefinition, author: &str) -> bool {
    template
        .author
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(author))
}

fn has_tag(template: &EnhancedTemplateDefinition, tag: &str) -> bool {
    let tag = tag.to_lowercase();
    template
        .tags
        .iter()
        .any(|candidate| candidate.to_lowercase() == tag)
}

fn text_matches(template: &EnhancedTemplateDefinition, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);

    contains(template.template_id())
        || contains(&template.definition.name)
        || template.author.as_deref().is_some_and(contains)
        || template.tags.iter().any(|tag| contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTemplateStore;
    use crate::types::TemplateDefinition;

    async fn discovery() -> (Arc<MemoryTemplateStore>, TemplateDiscovery) {
        let store = Arc::new(MemoryTemplateStore::new());
        store
            .register_enhanced(
                EnhancedTemplateDefinition::new(TemplateDefinition::new("1.1", "US Realm Header"))
                    .with_status(TemplateStatus::Active)
                    .with_author("HL7 Structured Documents"),
            )
            .await;
        store
            .register_enhanced(
                EnhancedTemplateDefinition::new(TemplateDefinition::new("1.2", "CCD"))
                    .with_parent("1.1")
                    .with_status(TemplateStatus::Active)
                    .with_tag("CCD"),
            )
            .await;
        store
            .register_enhanced(
                EnhancedTemplateDefinition::new(TemplateDefinition::new("1.8", "Discharge"))
                    .with_parent("1.1")
                    .with_tag("discharge-summary"),
            )
            .await;

        let discovery = TemplateDiscovery::new(store.clone());
        (store, discovery)
    }

    #[tokio::test]
    async fn test_tag_index_follows_writes() {
        let (store, discovery) = discovery().await;

        let ccd = discovery.by_tag("ccd").await;
        assert_eq!(ccd.len(), 1);
        assert_eq!(ccd[0].template_id(), "1.2");

        store
            .register_enhanced(
                EnhancedTemplateDefinition::new(TemplateDefinition::new("1.2.1", "CCD R2"))
                    .with_parent("1.2")
                    .with_tag("CCD"),
            )
            .await;

        let ids: Vec<_> = discovery
            .by_tag("CCD")
            .await
            .iter()
            .map(|t| t.template_id().to_string())
            .collect();
        assert_eq!(ids, vec!["1.2", "1.2.1"]);

        store.remove("1.8").await;
        assert!(discovery.by_tag("discharge-summary").await.is_empty());
        assert!(!discovery.tags().await.contains_key("discharge-summary"));
    }

    #[tokio::test]
    async fn test_query_filters_and_pages() {
        let (_, discovery) = discovery().await;

        assert_eq!(discovery.by_status(TemplateStatus::Active).await.len(), 2);
        assert_eq!(
            discovery.by_author("hl7 structured documents").await.len(),
            1
        );
        assert_eq!(discovery.search("discharge").await.len(), 1);

        let children = discovery
            .query(&TemplateQuery::new().with_parent("1.1").with_offset(1).with_limit(5))
            .await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].template_id(), "1.8");
    }

    #[tokio::test]
    async fn test_hierarchy_inspection() {
        let (_, discovery) = discovery().await;

        assert_eq!(discovery.ancestors("1.2").await.unwrap(), vec!["1.1"]);
        assert_eq!(
            discovery.descendants("1.1").await,
            BTreeSet::from(["1.2".to_string(), "1.8".to_string()])
        );
        assert!(discovery.ancestors("9.9").await.is_err());
    }

    #[tokio::test]
    async fn test_stale_snapshot_does_not_roll_back_index() {
        let (store, discovery) = discovery().await;
        let before = store.snapshot().await;

        // Re-register the CCD template without its tag.
        store
            .register_enhanced(
                EnhancedTemplateDefinition::new(TemplateDefinition::new("1.2", "CCD"))
                    .with_parent("1.1")
                    .with_status(TemplateStatus::Active),
            )
            .await;
        assert!(discovery.by_tag("ccd").await.is_empty());
        let current = store.generation().await;

        // A reader still holding the older snapshot sees its own view...
        let stale = discovery.tagged_in(&before, "ccd").await;
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].template_id(), "1.2");

        // ...without rewinding the shared index.
        assert_eq!(discovery.indexed_generation.load(Ordering::Acquire), current);
        assert!(discovery.by_tag("CCD").await.is_empty());
        assert!(!discovery.tags().await.contains_key("ccd"));
    }
}
