//! Per-run context handed to every stage.

use chrono::NaiveDate;

use crate::data::CacheManager;

/// The current date and the cache, passed explicitly instead of read from
/// the clock or a global.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub today: NaiveDate,
    pub cache: Option<CacheManager>,
}

impl ScanContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today, cache: None }
    }

    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&CacheManager> {
        self.cache.as_ref()
    }
}
