//! Flattening of template inheritance chains.
//!
//! `compose` resolves a template id depth-first against a consistent snapshot of the store:
//! parents are composed (cache first) in declaration order and folded left-to-right, then the
//! template's own definition is folded in last. Every composed template, intermediate ancestors
//! included, is cached by id until the cache is cleared or invalidated.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::CacheConfig;
use crate::error::{CdaTemplateError, Result};
use crate::storage::{ComposedTemplateCache, TemplateSnapshot, TemplateStorage};
use crate::types::TemplateDefinition;

pub struct TemplateComposer {
    store: Arc<dyn TemplateStorage>,
    cache: Mutex<ComposedTemplateCache>,
}

impl TemplateComposer {
    pub fn new(store: Arc<dyn TemplateStorage>, config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            store,
            cache: Mutex::new(ComposedTemplateCache::new(config)?),
        })
    }

    pub fn store(&self) -> &Arc<dyn TemplateStorage> {
        &self.store
    }

    /// Resolve `template_id` into a single flattened definition.
    ///
    /// # Errors
    ///
    /// `TemplateNotFound` when the template or any ancestor is not registered,
    /// `CircularDependency` when the ancestor chain revisits a template being resolved.
    pub async fn compose(&self, template_id: &str) -> Result<TemplateDefinition> {
        let snapshot = self.store.snapshot().await;
        let mut cache = self.cache.lock().await;

        let mut resolution = Resolution {
            snapshot: &snapshot,
            cache: &mut cache,
            stack: Vec::new(),
        };
        let composed = resolution.resolve(template_id)?;

        Ok(TemplateDefinition::clone(&composed))
    }

    /// Compose several templates; each id gets its own result.
    pub async fn compose_many(
        &self,
        template_ids: &[String],
    ) -> Vec<(String, Result<TemplateDefinition>)> {
        let results = join_all(template_ids.iter().map(|id| self.compose(id))).await;
        template_ids.iter().cloned().zip(results).collect()
    }

    /// Ancestor ids of `template_id` in composition order (root first), each listed once.
    pub async fn ancestor_chain(&self, template_id: &str) -> Result<Vec<String>> {
        self.store.snapshot().await.ancestor_chain(template_id)
    }

    /// Drop every cached composition. Subsequent `compose` calls re-resolve from the store.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        tracing::debug!("Cleared composed template cache");
    }

    /// Evict `template_id` and every cached template composed from it.
    pub async fn invalidate(&self, template_id: &str) -> Vec<String> {
        let evicted = self.cache.lock().await.invalidate(template_id);
        if !evicted.is_empty() {
            tracing::debug!(
                "Invalidated {} cached templates depending on {}",
                evicted.len(),
                template_id
            );
        }
        evicted
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

impl std::fmt::Debug for TemplateComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateComposer").finish_non_exhaustive()
    }
}

struct Resolution<'a> {
    snapshot: &'a TemplateSnapshot,
    cache: &'a mut ComposedTemplateCache,
    stack: Vec<String>,
}

impl Resolution<'_> {
    fn resolve(&mut self, template_id: &str) -> Result<Arc<TemplateDefinition>> {
        if self.stack.iter().any(|id| id == template_id) {
            let mut chain = self.stack.clone();
            chain.push(template_id.to_string());
            tracing::warn!("Circular template dependency: {}", chain.join(" -> "));
            return Err(CdaTemplateError::circular_dependency(chain));
        }

        if let Some(cached) = self.cache.get(template_id) {
            tracing::trace!("Composer cache hit for {}", template_id);
            return Ok(cached);
        }

        let record = self
            .snapshot
            .get(template_id)
            .ok_or_else(|| CdaTemplateError::template_not_found(template_id))?;
        let own = record.definition();
        let parent_ids = record.parent_ids();

        let composed = if parent_ids.is_empty() {
            own.clone()
        } else {
            self.stack.push(template_id.to_string());

            let mut accumulator: Option<TemplateDefinition> = None;
            for parent_id in parent_ids {
                let parent = self.resolve(parent_id)?;
                match accumulator.as_mut() {
                    Some(merged) => merged.absorb(&parent),
                    None => accumulator = Some(TemplateDefinition::clone(&parent)),
                }
            }

            self.stack.pop();

            let mut merged = accumulator.unwrap_or_else(|| own.clone());
            merged.absorb(own);
            merged.template_id = own.template_id.clone();
            merged.name = own.name.clone();
            merged
        };

        tracing::debug!(
            "Composed template {} ({} constraints from {} parents)",
            template_id,
            composed.constraints.len(),
            parent_ids.len()
        );

        let composed = Arc::new(composed);
        self.cache
            .insert(template_id, Arc::clone(&composed), parent_ids);

        Ok(composed)
    }
}
