use std::path::Path;
use std::sync::Arc;

use crate::comparison::{ComparisonResult, DocumentComparator};
use crate::composer::TemplateComposer;
use crate::core::EngineConfig;
use crate::discovery::TemplateDiscovery;
use crate::error::Result;
use crate::merge::DocumentMerger;
use crate::storage::{MemoryTemplateStore, TemplateCatalog, TemplateStorage};
use crate::types::{ClinicalDocument, EnhancedTemplateDefinition, TemplateDefinition};
use crate::validation::{ConstraintValidator, ValidationResult, ValueSetProvider};
use crate::versioning::VersionManager;

/// One handle over the store, composer, validator and document tools.
pub struct TemplateEngine {
    store: Arc<dyn TemplateStorage>,
    composer: TemplateComposer,
    discovery: TemplateDiscovery,
    validator: ConstraintValidator,
    comparator: DocumentComparator,
    merger: DocumentMerger,
    versions: VersionManager,
    config: EngineConfig,
}

impl TemplateEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_store(Arc::new(MemoryTemplateStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn TemplateStorage>, config: EngineConfig) -> Result<Self> {
        config.cache.validate()?;

        let composer = TemplateComposer::new(Arc::clone(&store), &config.cache)?;
        let discovery = TemplateDiscovery::new(Arc::clone(&store));

        Ok(Self {
            store,
            composer,
            discovery,
            validator: ConstraintValidator::new(),
            comparator: DocumentComparator::new(),
            merger: DocumentMerger::with_config(config.merge),
            versions: VersionManager::new(),
            config,
        })
    }

    /// Check value-set bindings against `value_sets` during document validation.
    pub fn with_value_sets(mut self, value_sets: Arc<dyn ValueSetProvider>) -> Self {
        self.validator = ConstraintValidator::with_value_sets(value_sets);
        self
    }

    pub async fn register(&self, definition: TemplateDefinition) {
        let template_id = definition.template_id.clone();
        self.store.register(definition).await;
        self.after_register(&template_id).await;
    }

    pub async fn register_enhanced(&self, enhanced: EnhancedTemplateDefinition) {
        let template_id = enhanced.template_id().to_string();
        self.store.register_enhanced(enhanced).await;
        self.after_register(&template_id).await;
    }

    async fn after_register(&self, template_id: &str) {
        if self.config.cache.invalidate_on_register {
            self.composer.invalidate(template_id).await;
        }
    }

    pub async fn load_catalog_str(&self, json: &str) -> Result<usize> {
        let catalog = TemplateCatalog::from_json_str(json)?;
        Ok(self.load_catalog(&catalog).await)
    }

    pub async fn load_catalog_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let catalog = TemplateCatalog::from_path(path).await?;
        Ok(self.load_catalog(&catalog).await)
    }

    async fn load_catalog(&self, catalog: &TemplateCatalog) -> usize {
        let registered = catalog.register_all(self.store.as_ref()).await;
        if self.config.cache.invalidate_on_register {
            for template in &catalog.templates {
                self.composer.invalidate(template.template_id()).await;
            }
        }
        registered
    }

    pub async fn compose(&self, template_id: &str) -> Result<TemplateDefinition> {
        self.composer.compose(template_id).await
    }

    /// Compose `template_id` and validate `document` against the result.
    ///
    /// Errors only when composition fails; structural findings are in the returned result.
    pub async fn validate_document(
        &self,
        template_id: &str,
        document: &ClinicalDocument,
    ) -> Result<ValidationResult> {
        let template = self.composer.compose(template_id).await?;
        let result = self.validator.validate_template(&template, document);

        if result.is_valid {
            tracing::debug!("Document {} conforms to {}", document.id(), template_id);
        } else {
            tracing::info!(
                "Document {} failed {} with {} errors",
                document.id(),
                template_id,
                result.error_count
            );
        }

        Ok(result)
    }

    /// Like [`validate_document`](Self::validate_document), but error issues become
    /// `ValidationFailed`.
    pub async fn validate_document_strict(
        &self,
        template_id: &str,
        document: &ClinicalDocument,
    ) -> Result<ValidationResult> {
        self.validate_document(template_id, document)
            .await?
            .into_error()
    }

    pub fn compare(&self, a: &ClinicalDocument, b: &ClinicalDocument) -> ComparisonResult {
        self.comparator.compare(a, b)
    }

    pub fn merge(
        &self,
        primary: &ClinicalDocument,
        secondary: &ClinicalDocument,
    ) -> ClinicalDocument {
        self.merger.merge(primary, secondary)
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    pub fn discovery(&self) -> &TemplateDiscovery {
        &self.discovery
    }

    pub fn composer(&self) -> &TemplateComposer {
        &self.composer
    }

    pub fn store(&self) -> &Arc<dyn TemplateStorage> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
