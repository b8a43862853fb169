use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{CdaTemplateError, Result};
use crate::types::{EnhancedTemplateDefinition, TemplateDefinition};

/// Serialized-access store of template definitions keyed by template id.
#[async_trait]
pub trait TemplateStorage: Send + Sync {
    /// Insert or overwrite a plain definition. Any enhanced metadata previously held for the
    /// same id is dropped.
    async fn register(&self, definition: TemplateDefinition);
    async fn register_enhanced(&self, enhanced: EnhancedTemplateDefinition);
    async fn lookup(&self, template_id: &str) -> Option<TemplateDefinition>;
    async fn lookup_enhanced(&self, template_id: &str) -> Option<EnhancedTemplateDefinition>;
    async fn all_ids(&self) -> BTreeSet<String>;
    async fn remove(&self, template_id: &str) -> bool;
    async fn len(&self) -> usize;
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
    /// A consistent view of the store at the time of the call.
    async fn snapshot(&self) -> Arc<TemplateSnapshot>;
    /// Monotonic counter bumped by every write.
    async fn generation(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRecord {
    Plain(TemplateDefinition),
    Enhanced(EnhancedTemplateDefinition),
}

impl TemplateRecord {
    pub fn definition(&self) -> &TemplateDefinition {
        match self {
            TemplateRecord::Plain(definition) => definition,
            TemplateRecord::Enhanced(enhanced) => &enhanced.definition,
        }
    }

    pub fn enhanced(&self) -> Option<&EnhancedTemplateDefinition> {
        match self {
            TemplateRecord::Plain(_) => None,
            TemplateRecord::Enhanced(enhanced) => Some(enhanced),
        }
    }

    /// Enhanced view of the record; plain definitions get default metadata.
    pub fn to_enhanced(&self) -> EnhancedTemplateDefinition {
        match self {
            TemplateRecord::Plain(definition) => {
                EnhancedTemplateDefinition::from(definition.clone())
            }
            TemplateRecord::Enhanced(enhanced) => enhanced.clone(),
        }
    }

    pub fn parent_ids(&self) -> &[String] {
        match self {
            TemplateRecord::Plain(_) => &[],
            TemplateRecord::Enhanced(enhanced) => &enhanced.parent_template_ids,
        }
    }
}

/// Immutable store contents shared with readers through copy-on-write.
#[derive(Debug, Clone, Default)]
pub struct TemplateSnapshot {
    pub(crate) records: HashMap<String, TemplateRecord>,
    pub(crate) generation: u64,
}

impl TemplateSnapshot {
    pub fn get(&self, template_id: &str) -> Option<&TemplateRecord> {
        self.records.get(template_id)
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.records.contains_key(template_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &TemplateRecord> {
        self.records.values()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ancestor ids of `template_id` in composition order (root first), each listed once.
    ///
    /// # Errors
    ///
    /// `TemplateNotFound` for an unregistered template or ancestor, `CircularDependency` when
    /// the parent links loop.
    pub fn ancestor_chain(&self, template_id: &str) -> Result<Vec<String>> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = Vec::new();

        self.collect_ancestors(template_id, &mut stack, &mut seen, &mut ordered)?;
        ordered.pop();

        Ok(ordered)
    }

    fn collect_ancestors(
        &self,
        template_id: &str,
        stack: &mut Vec<String>,
        seen: &mut HashSet<String>,
        ordered: &mut Vec<String>,
    ) -> Result<()> {
        if stack.iter().any(|id| id == template_id) {
            let mut chain = stack.clone();
            chain.push(template_id.to_string());
            return Err(CdaTemplateError::circular_dependency(chain));
        }

        let record = self
            .get(template_id)
            .ok_or_else(|| CdaTemplateError::template_not_found(template_id))?;

        stack.push(template_id.to_string());
        for parent_id in record.parent_ids() {
            self.collect_ancestors(parent_id, stack, seen, ordered)?;
        }
        stack.pop();

        if seen.insert(template_id.to_string()) {
            ordered.push(template_id.to_string());
        }

        Ok(())
    }

    /// Every registered template that inherits from `template_id`, directly or transitively.
    pub fn descendants(&self, template_id: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut pending = vec![template_id.to_string()];

        while let Some(current) = pending.pop() {
            for (id, record) in &self.records {
                if record.parent_ids().contains(&current) && found.insert(id.clone()) {
                    pending.push(id.clone());
                }
            }
        }

        found.remove(template_id);
        found
    }
}
