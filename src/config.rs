//! Runtime configuration for the hierarchy services.
//!
//! Loaded once at startup, either from defaults or from `ITEM_HIERARCHY_*`
//! environment variables (a `.env` file is honoured).

use serde::{Deserialize, Serialize};

/// Ceiling on the number of documents a recursive action may touch.
pub const MAXIMUM_NUMBER_OF_ITEMS: usize = 250;

/// Number of documents translated concurrently by a recursive translate.
pub const TRANSLATE_BATCH_SIZE: usize = 10;

/// Page size used when looking up parent collections for a batch of ids.
pub const ANCESTOR_LOOKUP_PAGE_SIZE: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub max_items_in_recursive_action: usize,
    pub translate_batch_size: usize,
    pub ancestor_lookup_page_size: usize,
    pub title_lookup_page_size: usize,
    pub ancestor_cache_prefix: String,
    pub ancestor_cache_version: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_items_in_recursive_action: MAXIMUM_NUMBER_OF_ITEMS,
            translate_batch_size: TRANSLATE_BATCH_SIZE,
            ancestor_lookup_page_size: ANCESTOR_LOOKUP_PAGE_SIZE,
            title_lookup_page_size: MAXIMUM_NUMBER_OF_ITEMS,
            ancestor_cache_prefix: "doc-anc-".into(),
            ancestor_cache_version: 3,
        }
    }
}

impl HierarchyConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            max_items_in_recursive_action: env_parse(
                "ITEM_HIERARCHY_MAX_ITEMS",
                defaults.max_items_in_recursive_action,
            ),
            translate_batch_size: env_parse(
                "ITEM_HIERARCHY_TRANSLATE_BATCH_SIZE",
                defaults.translate_batch_size,
            ),
            ancestor_lookup_page_size: env_parse(
                "ITEM_HIERARCHY_ANCESTOR_PAGE_SIZE",
                defaults.ancestor_lookup_page_size,
            ),
            title_lookup_page_size: env_parse(
                "ITEM_HIERARCHY_TITLE_PAGE_SIZE",
                defaults.title_lookup_page_size,
            ),
            ancestor_cache_prefix: std::env::var("ITEM_HIERARCHY_CACHE_PREFIX")
                .unwrap_or(defaults.ancestor_cache_prefix),
            ancestor_cache_version: env_parse(
                "ITEM_HIERARCHY_CACHE_VERSION",
                defaults.ancestor_cache_version,
            ),
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items_in_recursive_action = max_items;
        self
    }

    pub fn with_translate_batch_size(mut self, batch_size: usize) -> Self {
        self.translate_batch_size = batch_size;
        self
    }

    pub fn with_ancestor_lookup_page_size(mut self, page_size: usize) -> Self {
        self.ancestor_lookup_page_size = page_size;
        self
    }

    /// Cache key holding the direct parents of `item_id`.
    pub fn ancestor_cache_key(&self, item_id: &str) -> String {
        format!(
            "{}{}-{}",
            self.ancestor_cache_prefix, self.ancestor_cache_version, item_id
        )
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    target: "item_hierarchy.config",
                    key,
                    value = %raw,
                    fallback = %default,
                    "ignoring unparsable configuration value"
                );
                default
            }
        },
        Err(_) => default,
    }
}
