use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::log_store::LogStore;
use crate::models::DailyTotals;
use crate::nutrition::sum_totals;

#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    pub totals: DailyTotals,
    pub computed_at: DateTime<Utc>,
}

/// Memoized per-day totals derived from the log store.
///
/// An entry exists only while it matches the stored log: every writer of the
/// log calls [`ComputationCache::invalidate`] right after its write. The miss
/// path holds the cache lock across the log read, so an invalidation that
/// races a recompute always lands after it.
pub struct ComputationCache {
    log: Arc<LogStore>,
    entries: Mutex<HashMap<NaiveDate, CacheEntry>>,
}

impl ComputationCache {
    #[must_use]
    pub fn new(log: Arc<LogStore>) -> Self {
        Self {
            log,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<NaiveDate, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get_totals(&self, date: NaiveDate) -> DailyTotals {
        let mut entries = self.entries();
        if let Some(entry) = entries.get(&date) {
            debug!(%date, "totals cache hit");
            return entry.totals;
        }
        debug!(%date, "totals cache miss");
        let totals = sum_totals(&self.log.get(date));
        entries.insert(
            date,
            CacheEntry {
                totals,
                computed_at: Utc::now(),
            },
        );
        totals
    }

    #[must_use]
    pub fn get_protein_total(&self, date: NaiveDate) -> f64 {
        self.get_totals(date).protein
    }

    /// Drop the cached totals for `date`. Returns whether an entry existed.
    pub fn invalidate(&self, date: NaiveDate) -> bool {
        self.entries().remove(&date).is_some()
    }

    /// Invalidate and immediately recompute from the store.
    pub fn refresh(&self, date: NaiveDate) -> DailyTotals {
        self.invalidate(date);
        self.get_totals(date)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    #[must_use]
    pub fn cached(&self, date: NaiveDate) -> Option<CacheEntry> {
        self.entries().get(&date).copied()
    }
}
