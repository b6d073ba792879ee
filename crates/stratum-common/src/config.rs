//! Configuration structures for StratumDB indexes.

use crate::error::{Result, StratumError};
use serde::{Deserialize, Serialize};

/// Default number of items/keys held by a single index page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Default minimum histogram fill, in percent of the requested bucket count.
///
/// The histogram builder keeps descending until at least this share of the
/// requested buckets is populated, or every frontier page is a leaf.
pub const DEFAULT_HISTOGRAM_FILL_PERCENT: u32 = 50;

/// Configuration for an ordered paged index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum number of items in a leaf page / separator keys in an inner page.
    pub page_size: usize,
    /// Minimum histogram fill, in percent of the requested bucket count.
    pub histogram_fill_percent: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            histogram_fill_percent: DEFAULT_HISTOGRAM_FILL_PERCENT,
        }
    }
}

impl IndexConfig {
    /// Creates a configuration with the given page size and default histogram settings.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Minimum number of entries a non-root page must hold.
    pub fn min_page_size(&self) -> usize {
        self.page_size / 2
    }

    /// Validates the configuration.
    ///
    /// The page size must be even so that the split point and the underflow
    /// threshold coincide at `page_size / 2`.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < 4 {
            return Err(StratumError::ConfigError(format!(
                "page_size must be at least 4, got {}",
                self.page_size
            )));
        }
        if self.page_size % 2 != 0 {
            return Err(StratumError::ConfigError(format!(
                "page_size must be even, got {}",
                self.page_size
            )));
        }
        if self.histogram_fill_percent == 0 || self.histogram_fill_percent > 100 {
            return Err(StratumError::ConfigError(format!(
                "histogram_fill_percent must be in 1..=100, got {}",
                self.histogram_fill_percent
            )));
        }
        Ok(())
    }
}
