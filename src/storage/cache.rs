use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::core::CacheConfig;
use crate::error::{CdaTemplateError, Result};
use crate::types::TemplateDefinition;

/// Memo of composed templates keyed by template id.
///
/// Besides the LRU entries it records the direct-parent graph of cached results, so that
/// [`ComposedTemplateCache::invalidate`] can evict a template together with all of its cached
/// descendants. The graph only keeps ids that are cached or lie on a parent path of a cached
/// entry; LRU evictions prune it.
pub struct ComposedTemplateCache {
    entries: LruCache<String, Arc<TemplateDefinition>>,
    /// parent id -> ids composed directly from it
    dependents: HashMap<String, HashSet<String>>,
    /// id -> direct parent ids
    parents: HashMap<String, Vec<String>>,
    config: CacheConfig,
}

impl ComposedTemplateCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            CdaTemplateError::configuration("composer cache capacity cannot be zero")
        })?;

        Ok(Self {
            entries: LruCache::new(capacity),
            dependents: HashMap::new(),
            parents: HashMap::new(),
            config: config.clone(),
        })
    }

    pub fn get(&mut self, template_id: &str) -> Option<Arc<TemplateDefinition>> {
        self.entries.get(template_id).cloned()
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.entries.contains(template_id)
    }

    /// Store a composed template; `parents` are the ids it was composed from directly.
    pub fn insert(
        &mut self,
        template_id: &str,
        template: Arc<TemplateDefinition>,
        parents: &[String],
    ) {
        let previous_parents = self.detach(template_id);

        for parent in parents {
            self.dependents
                .entry(parent.clone())
                .or_default()
                .insert(template_id.to_string());
        }
        if !parents.is_empty() {
            self.parents
                .insert(template_id.to_string(), parents.to_vec());
        }

        let mut orphans = previous_parents;
        if let Some((evicted, _)) = self.entries.push(template_id.to_string(), template) {
            if evicted != template_id {
                orphans.push(evicted);
            }
        }
        self.prune(orphans);
    }

    /// Evict `template_id` and every cached template composed from it. Returns evicted ids.
    pub fn invalidate(&mut self, template_id: &str) -> Vec<String> {
        let mut evicted = Vec::new();
        let mut pending = vec![template_id.to_string()];
        let mut seen = HashSet::new();

        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if self.entries.pop(&id).is_some() {
                evicted.push(id.clone());
            }
            if let Some(children) = self.dependents.remove(&id) {
                pending.extend(children);
            }
        }

        let mut orphans = Vec::new();
        for id in &seen {
            orphans.extend(self.detach(id));
        }
        self.prune(orphans);

        evicted
    }

    /// Drop `template_id`'s parent edges, returning the parents it was attached to.
    fn detach(&mut self, template_id: &str) -> Vec<String> {
        let parents = self.parents.remove(template_id).unwrap_or_default();
        for parent in &parents {
            if let Some(children) = self.dependents.get_mut(parent) {
                children.remove(template_id);
                if children.is_empty() {
                    self.dependents.remove(parent);
                }
            }
        }
        parents
    }

    /// Remove graph nodes that are neither cached nor ancestors of a cached entry.
    fn prune(&mut self, mut pending: Vec<String>) {
        while let Some(id) = pending.pop() {
            if self.entries.contains(&id) || self.dependents.contains_key(&id) {
                continue;
            }
            pending.extend(self.detach(&id));
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dependents.clear();
        self.parents.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl std::fmt::Debug for ComposedTemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedTemplateCache")
            .field("config", &self.config)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
