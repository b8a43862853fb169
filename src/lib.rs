//! # OctoFHIR CDA
//!
//! Template composition and validation for Clinical Document Architecture (CDA) documents.
//!
//! ## Features
//!
//! - **Composition**: Flatten multi-parent template inheritance into one definition, with
//!   cycle detection and a dependency-aware LRU cache
//! - **Validation**: Check document trees against cardinality, fixed-value, required-element
//!   and value-set constraints
//! - **Comparison**: Semantic diff of headers and recursive section trees
//! - **Merging**: Combine two documents under a configurable conflict strategy with
//!   entry de-duplication
//! - **Versioning**: Derive successor versions and reason about document sets
//! - **Discovery**: Query registered templates by author, status, tag or text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_cda::*;
//!
//! # async fn example(document: ClinicalDocument) -> Result<()> {
//! let engine = TemplateEngine::new(EngineConfig::default())?;
//! engine
//!     .load_catalog_file("templates/ccda.json")
//!     .await?;
//!
//! let result = engine
//!     .validate_document("2.16.840.1.113883.10.20.22.1.2", &document)
//!     .await?;
//! for issue in &result.issues {
//!     println!("{}: {}", issue.code, issue.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod comparison;
pub mod composer;
pub mod core;
pub mod discovery;
pub mod error;
pub mod merge;
pub mod storage;
pub mod types;
pub mod utils;
pub mod validation;
pub mod versioning;

pub use comparison::{ChangeType, ComparisonResult, Difference, DocumentComparator};
pub use composer::TemplateComposer;
pub use crate::core::{CacheConfig, EngineConfig, TemplateEngine};
pub use discovery::{TemplateDiscovery, TemplateQuery};
pub use error::Result; // Our Result type takes precedence
pub use error::CdaTemplateError;
pub use merge::{ConflictStrategy, DocumentMerger, MergeConfiguration};
pub use storage::*;
pub use types::*;
pub use validation::{
    ConstraintValidator, InMemoryValueSets, ValidationIssue, ValidationResult, ValidationSeverity,
    ValueSetProvider,
};
pub use versioning::{VersionInfo, VersionManager};
