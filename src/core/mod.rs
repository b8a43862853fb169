pub mod config;
pub mod manager;

pub use config::{CacheConfig, EngineConfig};
pub use manager::TemplateEngine;
