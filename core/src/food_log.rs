use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::ComputationCache;
use crate::clock::Clock;
use crate::error::Result;
use crate::events::{Event, EventBus, LogChange};
use crate::log_store::LogStore;
use crate::models::{DailyTotals, FoodEntry, NewFoodEntry, NutritionRecommendation};
use crate::recommendation::RecommendationStore;

/// The only writer of the per-day food logs.
///
/// Every mutation runs the same sequence: write the log, recompute the day's
/// cached totals, update `current` when the day is the active one, and only
/// then notify subscribers.
pub struct FoodLog {
    log: Arc<LogStore>,
    cache: Arc<ComputationCache>,
    recommendation: Arc<RecommendationStore>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl FoodLog {
    #[must_use]
    pub fn new(
        log: Arc<LogStore>,
        cache: Arc<ComputationCache>,
        recommendation: Arc<RecommendationStore>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            log,
            cache,
            recommendation,
            bus,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn add(&self, date: NaiveDate, item: &NewFoodEntry) -> Result<FoodEntry> {
        let item = item.validated()?;

        let (entry, events) = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut entries = self.log.get(date);
            let mut id = Uuid::new_v4().to_string();
            while entries.iter().any(|e| e.id == id) {
                id = Uuid::new_v4().to_string();
            }
            let entry = FoodEntry {
                id,
                name: item.name,
                protein: item.protein,
                calories: item.calories,
                carbs: item.carbs,
                fat: item.fat,
                serving_size: item.serving_size,
                meal_type: item.meal_type,
                timestamp: Utc::now(),
            };
            entries.push(entry.clone());
            self.log.set(date, &entries)?;

            let events = self.after_write(date, LogChange::Added, &entry.id);
            (entry, events)
        };

        self.emit(&events);
        Ok(entry)
    }

    /// Remove an entry by id. Returns false, without writing or notifying,
    /// when no entry has that id.
    pub fn remove(&self, date: NaiveDate, id: &str) -> Result<bool> {
        let events = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut entries = self.log.get(date);
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() == before {
                debug!(%date, id, "remove of unknown entry ignored");
                return Ok(false);
            }
            self.log.set(date, &entries)?;

            self.after_write(date, LogChange::Removed, id)
        };

        self.emit(&events);
        Ok(true)
    }

    /// Bring the cache and `current` in line with a committed log write.
    /// Returns the events to send once the write lock is released, so
    /// handlers are free to call back into the log.
    fn after_write(&self, date: NaiveDate, change: LogChange, entry_id: &str) -> Vec<Event> {
        let totals = self.cache.refresh(date);
        let mut events = vec![Event::FoodLogUpdated {
            date,
            change,
            entry_id: entry_id.to_string(),
            totals,
        }];
        if date == self.clock.today() {
            let recommendation = self.record_current(date, totals.protein);
            events.push(Event::ProteinDataUpdated { recommendation });
        }
        events
    }

    // The log write has already happened by the time this runs, so a record
    // that fails to persist is logged instead of failing the mutation.
    fn record_current(&self, day: NaiveDate, total: f64) -> NutritionRecommendation {
        self.recommendation
            .set_current(day, total)
            .unwrap_or_else(|err| {
                warn!(error = %err, %day, "failed to persist current intake");
                self.recommendation.snapshot()
            })
    }

    fn emit(&self, events: &[Event]) {
        for event in events {
            self.bus.dispatch(event);
        }
    }

    #[must_use]
    pub fn entries(&self, date: NaiveDate) -> Vec<FoodEntry> {
        self.log.get(date)
    }

    #[must_use]
    pub fn totals(&self, date: NaiveDate) -> DailyTotals {
        self.cache.get_totals(date)
    }

    /// Re-derive `current` from the active day's log when the record belongs
    /// to another day or disagrees with the cached total. Returns the active
    /// day's protein total and, when the record changed, the new record.
    ///
    /// Earlier days are left as they are; a new day with no log reads as 0.
    pub fn roll_active_day(&self) -> (f64, Option<NutritionRecommendation>) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let today = self.clock.today();
        let total = self.cache.get_protein_total(today);
        let recorded = self.recommendation.snapshot();
        if recorded.day == Some(today) && (recorded.current - total).abs() <= f64::EPSILON {
            return (total, None);
        }
        debug!(%today, previous_day = ?recorded.day, total, "re-deriving current intake");
        (total, Some(self.record_current(today, total)))
    }

    /// Protein logged on the active day. Notifies subscribers when `current`
    /// had to be re-derived.
    pub fn current_protein_intake(&self) -> f64 {
        let (total, changed) = self.roll_active_day();
        if let Some(recommendation) = changed {
            self.bus
                .dispatch(&Event::ProteinDataUpdated { recommendation });
        }
        total
    }
}
