//! Execution configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LIFO_PAGE_SIZE, DEFAULT_PAGE_SIZE, MAX_DECIMAL_PRECISION, MAX_KEY_SIZE,
    MAX_VALUE_SIZE, MIN_PAGE_SIZE, SYSTEM_STORAGE_NAME,
};

/// Configuration of the execution core.
///
/// # Example
///
/// ```rust
/// use jogasaki_common::config::ExecutionConfig;
///
/// let config = ExecutionConfig::default();
/// assert!(config.validate().is_ok());
/// assert!(!config.support_upsert_with_secondaries);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Page size of the paged memory resource used by value stores.
    /// Default: 2 MB
    pub page_size: usize,

    /// Page size of the per-statement LIFO arena.
    /// Default: 64 KB
    pub lifo_page_size: usize,

    /// Precision used when a decimal cast target omits it.
    /// `None` keeps the value as an unbounded triple.
    pub default_decimal_precision: Option<u8>,

    /// Scale used together with `default_decimal_precision`.
    pub default_decimal_scale: Option<u8>,

    /// Planner hint; carried through to the work-level classifier.
    pub enable_index_join: bool,

    /// Execute the read-modify-write protocol for INSERT OR REPLACE on tables
    /// with secondary indexes. When false such statements are rejected.
    pub support_upsert_with_secondaries: bool,

    /// Maximum encoded key size.
    pub max_key_size: usize,

    /// Maximum encoded value size.
    pub max_value_size: usize,

    /// Storage holding serialized catalog entries.
    pub system_storage_name: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            lifo_page_size: DEFAULT_LIFO_PAGE_SIZE,
            default_decimal_precision: None,
            default_decimal_scale: None,
            enable_index_join: false,
            support_upsert_with_secondaries: false,
            max_key_size: MAX_KEY_SIZE,
            max_value_size: MAX_VALUE_SIZE,
            system_storage_name: SYSTEM_STORAGE_NAME.to_string(),
        }
    }
}

impl ExecutionConfig {
    /// Creates a small-footprint configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            page_size: 4 * 1024,
            lifo_page_size: 1024,
            ..Default::default()
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(format!("page_size must be at least {MIN_PAGE_SIZE} bytes"));
        }
        if self.lifo_page_size < MIN_PAGE_SIZE {
            return Err(format!(
                "lifo_page_size must be at least {MIN_PAGE_SIZE} bytes"
            ));
        }
        match (self.default_decimal_precision, self.default_decimal_scale) {
            (None, Some(_)) => {
                return Err("default_decimal_scale requires default_decimal_precision".to_string())
            }
            (Some(p), s) => {
                if p == 0 || p > MAX_DECIMAL_PRECISION {
                    return Err(format!(
                        "default_decimal_precision must be in [1, {MAX_DECIMAL_PRECISION}]"
                    ));
                }
                if s.is_some_and(|s| s > p) {
                    return Err("default_decimal_scale must not exceed precision".to_string());
                }
            }
            (None, None) => {}
        }
        if self.max_key_size == 0 || self.max_value_size == 0 {
            return Err("key and value size limits must be positive".to_string());
        }
        if self.system_storage_name.is_empty() {
            return Err("system_storage_name must not be empty".to_string());
        }
        Ok(())
    }
}
