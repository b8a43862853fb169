pub mod constraint;
pub mod document;
pub mod path_resolver;
pub mod template;

pub use constraint::{Cardinality, ConstraintSeverity, TemplateConstraint};
pub use document::*;
pub use path_resolver::{ElementPath, PathSegment, scalar_text};
pub use template::{EnhancedTemplateDefinition, TemplateDefinition, TemplateStatus};
