//! # Store configuration
//!
//! Page cache tuning knobs. Where the values come from is up to the embedding application; the
//! usual route is a TOML table:
//!
//! ```toml
//! page_size = 8192
//! max_cached_pages = 1024
//! ```

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Smallest page size accepted by [`StoreConfig::validate`].
pub const MIN_PAGE_SIZE: usize = 16;

/// # Page cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
  /// Size of one cached page in bytes. Must be a power of two.
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  /// Soft limit on the number of pages each mapped file keeps in memory. Pinned pages are never
  /// evicted, so the limit can be exceeded while many cursors are alive.
  #[serde(default = "default_max_cached_pages")]
  pub max_cached_pages: usize,
}

fn default_page_size() -> usize {
  8192
}

fn default_max_cached_pages() -> usize {
  1024
}

impl Default for StoreConfig {
  fn default() -> Self {
    StoreConfig { page_size: default_page_size(), max_cached_pages: default_max_cached_pages() }
  }
}

impl StoreConfig {
  /// Parses and validates a configuration from TOML text. Missing keys take their defaults.
  pub fn from_toml_str(text: &str) -> Result<Self> {
    let config: StoreConfig = toml::from_str(text).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// Checks the invariants the page cache relies on.
  pub fn validate(&self) -> Result<()> {
    if self.page_size < MIN_PAGE_SIZE || !self.page_size.is_power_of_two() {
      return Err(StoreError::InvalidConfig(format!(
        "page_size must be a power of two of at least {MIN_PAGE_SIZE}, got {}",
        self.page_size
      )));
    }
    if self.max_cached_pages == 0 {
      return Err(StoreError::InvalidConfig("max_cached_pages must be at least 1".to_string()));
    }
    Ok(())
  }
}
