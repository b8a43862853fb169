use serde::{Deserialize, Serialize};

use crate::error::{CdaTemplateError, Result};
use crate::merge::MergeConfiguration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub merge: MergeConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of composed templates kept in memory.
    pub capacity: usize,
    /// Evict a template and everything composed from it whenever it is re-registered.
    pub invalidate_on_register: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            invalidate_on_register: false,
        }
    }
}

impl CacheConfig {
    pub fn minimal() -> Self {
        Self {
            capacity: 64,
            invalidate_on_register: false,
        }
    }

    pub fn tracking() -> Self {
        Self {
            capacity: 1000,
            invalidate_on_register: true,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CdaTemplateError::configuration(
                "composer cache capacity cannot be zero",
            ));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.cache.validate()?;
        Ok(config)
    }

    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_merge_config(mut self, merge: MergeConfiguration) -> Self {
        self.merge = merge;
        self
    }
}
