use std::collections::HashMap;

use crate::types::CodedValue;

/// Source of value-set membership for template bindings.
pub trait ValueSetProvider: Send + Sync {
    /// `Some(true)` when `code` is a member of `value_set`, `None` when the value set is unknown.
    fn contains(&self, value_set: &str, code: &CodedValue) -> Option<bool>;
}

/// Value sets held as plain code lists.
#[derive(Debug, Clone, Default)]
pub struct InMemoryValueSets {
    sets: HashMap<String, Vec<CodedValue>>,
}

impl InMemoryValueSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value_set(
        mut self,
        value_set: impl Into<String>,
        codes: impl IntoIterator<Item = CodedValue>,
    ) -> Self {
        self.insert(value_set, codes);
        self
    }

    pub fn insert(
        &mut self,
        value_set: impl Into<String>,
        codes: impl IntoIterator<Item = CodedValue>,
    ) {
        self.sets
            .entry(value_set.into())
            .or_default()
            .extend(codes);
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl ValueSetProvider for InMemoryValueSets {
    fn contains(&self, value_set: &str, code: &CodedValue) -> Option<bool> {
        let members = self.sets.get(value_set)?;
        // A code without a system matches on the code alone.
        Some(members.iter().any(|member| match code.code_system {
            Some(_) => member.same_concept(code),
            None => member.code == code.code,
        }))
    }
}
