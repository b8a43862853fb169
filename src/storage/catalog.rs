use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::storage::TemplateStorage;
use crate::types::EnhancedTemplateDefinition;

/// A bulk set of templates, typically one published implementation guide.
///
/// ```json
/// { "name": "C-CDA R2.1", "templates": [ { "templateId": "...", "name": "..." } ] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateCatalog {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub templates: Vec<EnhancedTemplateDefinition>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<EnhancedTemplateDefinition>) -> Self {
        Self {
            name: None,
            templates,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: TemplateCatalog = serde_json::from_str(json)?;
        catalog.check()?;
        Ok(catalog)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        tracing::debug!("Read template catalog from {}", path.display());
        Self::from_json_str(&contents)
    }

    /// Check every constraint path so malformed catalogs fail before registration.
    pub fn check(&self) -> Result<()> {
        for template in &self.templates {
            template.definition.check_constraints()?;
        }
        Ok(())
    }

    /// Register every template in declaration order. Returns the number registered.
    pub async fn register_all(&self, store: &dyn TemplateStorage) -> usize {
        for template in &self.templates {
            store.register_enhanced(template.clone()).await;
        }

        tracing::info!(
            "Registered {} templates from catalog {}",
            self.templates.len(),
            self.name.as_deref().unwrap_or("<unnamed>")
        );

        self.templates.len()
    }
}
