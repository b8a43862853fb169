use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{TemplateRecord, TemplateSnapshot, TemplateStorage};
use crate::types::{EnhancedTemplateDefinition, TemplateDefinition};

/// In-memory template store.
///
/// Writers take the lock exclusively and copy the shared snapshot only when a reader still
/// holds it, so `snapshot()` is an `Arc` clone.
#[derive(Debug)]
pub struct MemoryTemplateStore {
    state: Arc<RwLock<Arc<TemplateSnapshot>>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(Arc::new(TemplateSnapshot::default()))),
        }
    }

    async fn write_record(&self, template_id: String, record: TemplateRecord) {
        let mut state = self.state.write().await;
        let snapshot = Arc::make_mut(&mut state);
        let replaced = snapshot.records.insert(template_id.clone(), record).is_some();
        snapshot.generation += 1;

        if replaced {
            tracing::debug!("Overwrote template {}", template_id);
        } else {
            tracing::debug!("Registered template {}", template_id);
        }
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let snapshot = Arc::make_mut(&mut state);
        snapshot.records.clear();
        snapshot.generation += 1;
    }
}

#[async_trait]
impl TemplateStorage for MemoryTemplateStore {
    async fn register(&self, definition: TemplateDefinition) {
        let template_id = definition.template_id.clone();
        self.write_record(template_id, TemplateRecord::Plain(definition))
            .await;
    }

    async fn register_enhanced(&self, enhanced: EnhancedTemplateDefinition) {
        let template_id = enhanced.template_id().to_string();
        self.write_record(template_id, TemplateRecord::Enhanced(enhanced))
            .await;
    }

    async fn lookup(&self, template_id: &str) -> Option<TemplateDefinition> {
        let state = self.state.read().await;
        state
            .get(template_id)
            .map(|record| record.definition().clone())
    }

    async fn lookup_enhanced(&self, template_id: &str) -> Option<EnhancedTemplateDefinition> {
        let state = self.state.read().await;
        state
            .get(template_id)
            .and_then(|record| record.enhanced().cloned())
    }

    async fn all_ids(&self) -> BTreeSet<String> {
        let state = self.state.read().await;
        state.ids().cloned().collect()
    }

    async fn remove(&self, template_id: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.contains(template_id) {
            return false;
        }
        let snapshot = Arc::make_mut(&mut state);
        snapshot.records.remove(template_id);
        snapshot.generation += 1;
        tracing::debug!("Removed template {}", template_id);
        true
    }

    async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    async fn snapshot(&self) -> Arc<TemplateSnapshot> {
        Arc::clone(&*self.state.read().await)
    }

    async fn generation(&self) -> u64 {
        self.state.read().await.generation()
    }
}

impl Default for MemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryTemplateStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}
