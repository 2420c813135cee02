use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::warn;

use crate::db::Database;
use crate::error::Result;
use crate::models::{FoodEntry, day_key, parse_date};

pub type SharedDatabase = Arc<Mutex<Database>>;

/// Per-day ordered food logs persisted as JSON payloads.
///
/// Reads never fail: a missing day and a payload that no longer parses both
/// read back as an empty log.
pub struct LogStore {
    db: SharedDatabase,
}

impl LogStore {
    #[must_use]
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Vec<FoodEntry> {
        let key = day_key(date);
        let payload = match self.db().get_log_payload(&key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(date = %key, error = %err, "failed to read food log, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&payload) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(date = %key, error = %err, "corrupt food log payload, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the whole log for `date`.
    pub fn set(&self, date: NaiveDate, entries: &[FoodEntry]) -> Result<()> {
        let payload = serde_json::to_string(entries)?;
        self.db().put_log_payload(&day_key(date), &payload)
    }

    /// Days that have a stored log, newest first. Keys that are not valid
    /// dates are skipped.
    pub fn dates(&self, limit: Option<i64>) -> Result<Vec<NaiveDate>> {
        let keys = self.db().log_dates(limit)?;
        Ok(keys.iter().filter_map(|k| parse_date(k).ok()).collect())
    }
}
