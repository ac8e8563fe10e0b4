//! Engine limits
//!
//! Limits are plain data so embedders can keep them in a JSON file next to
//! the rest of their settings:
//!
//! ```
//! use stackwasm::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "max_call_depth": 64, "instruction_budget": 100000 }"#).unwrap();
//! assert_eq!(config.max_call_depth, 64);
//! assert_eq!(config.max_memory_pages, 65536);
//! ```

use crate::runtime::memory::MAX_PAGES;
use serde::{Deserialize, Serialize};

/// Default maximum depth of nested calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nested calls beyond this depth trap with `CallStackExhausted`
    pub max_call_depth: usize,
    /// Upper bound on any memory's size in pages, applied on top of its declared maximum
    pub max_memory_pages: u32,
    /// Instructions one `invoke` may dispatch; `None` is unbounded
    pub instruction_budget: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_memory_pages: MAX_PAGES,
            instruction_budget: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.instruction_budget, None);
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = EngineConfig {
            max_call_depth: 8,
            max_memory_pages: 2,
            instruction_budget: Some(500),
        };
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(EngineConfig::from_json(r#"{ "max_call_depth": "deep" }"#).is_err());
    }
}
