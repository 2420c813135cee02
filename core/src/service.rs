use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Days, NaiveDate};

use crate::cache::ComputationCache;
use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::error::Result;
use crate::events::EventBus;
use crate::food_log::FoodLog;
use crate::log_store::{LogStore, SharedDatabase};
use crate::models::{
    DailyTotals, DaySummary, FoodEntry, HistoryDay, NewFoodEntry, NutritionRecommendation,
    RemoteProfile, SyncDirection, day_key, parse_date,
};
use crate::recommendation::RecommendationStore;
use crate::remote::{MemoryProfileStore, RemoteProfileStore};
use crate::sync::{DEFAULT_DEBOUNCE, SyncCoordinator, SyncOutcome};

/// Longest window [`ProteusService::history`] will report.
pub const MAX_HISTORY_DAYS: u32 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Minimum gap between the end of one successful sync and the start of
    /// the next.
    pub debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Builder for [`ProteusService`]. Anything not supplied falls back to the
/// system clock, an in-memory remote store and no signed-in user.
pub struct ServiceBuilder {
    db: Database,
    remote: Option<Arc<dyn RemoteProfileStore>>,
    clock: Option<Arc<dyn Clock>>,
    user_id: Option<String>,
    config: EngineConfig,
}

impl ServiceBuilder {
    #[must_use]
    pub fn remote(mut self, remote: Arc<dyn RemoteProfileStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn build(self) -> ProteusService {
        let db: SharedDatabase = Arc::new(Mutex::new(self.db));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let remote = self
            .remote
            .unwrap_or_else(|| Arc::new(MemoryProfileStore::new()));

        let bus = Arc::new(EventBus::new());
        let log = Arc::new(LogStore::new(Arc::clone(&db)));
        let cache = Arc::new(ComputationCache::new(Arc::clone(&log)));
        let recommendation = Arc::new(RecommendationStore::load(db));
        let food_log = Arc::new(FoodLog::new(
            Arc::clone(&log),
            Arc::clone(&cache),
            Arc::clone(&recommendation),
            Arc::clone(&bus),
            Arc::clone(&clock),
        ));
        let sync = SyncCoordinator::new(
            remote,
            Arc::clone(&recommendation),
            Arc::clone(&food_log),
            Arc::clone(&bus),
            self.user_id,
            self.config.debounce,
        );

        ProteusService {
            bus,
            log,
            cache,
            recommendation,
            food_log,
            sync,
            clock,
        }
    }
}

/// The engine, constructed once and handed to every consumer.
pub struct ProteusService {
    bus: Arc<EventBus>,
    log: Arc<LogStore>,
    cache: Arc<ComputationCache>,
    recommendation: Arc<RecommendationStore>,
    food_log: Arc<FoodLog>,
    sync: SyncCoordinator,
    clock: Arc<dyn Clock>,
}

impl ProteusService {
    pub fn builder(db_path: &str) -> Result<ServiceBuilder> {
        Ok(Self::builder_for(Database::open(Path::new(db_path))?))
    }

    pub fn builder_in_memory() -> Result<ServiceBuilder> {
        Ok(Self::builder_for(Database::open_in_memory()?))
    }

    fn builder_for(db: Database) -> ServiceBuilder {
        ServiceBuilder {
            db,
            remote: None,
            clock: None,
            user_id: None,
            config: EngineConfig::default(),
        }
    }

    pub fn new(db_path: &str) -> Result<Self> {
        Ok(Self::builder(db_path)?.build())
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::builder_in_memory()?.build())
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // --- Food log ---

    pub fn add_food(&self, date: &str, item: &NewFoodEntry) -> Result<FoodEntry> {
        self.food_log.add(parse_date(date)?, item)
    }

    pub fn remove_food(&self, date: &str, id: &str) -> Result<bool> {
        self.food_log.remove(parse_date(date)?, id)
    }

    pub fn entries(&self, date: &str) -> Result<Vec<FoodEntry>> {
        Ok(self.food_log.entries(parse_date(date)?))
    }

    pub fn totals(&self, date: &str) -> Result<DailyTotals> {
        Ok(self.food_log.totals(parse_date(date)?))
    }

    pub fn protein_total(&self, date: &str) -> Result<f64> {
        Ok(self.cache.get_protein_total(parse_date(date)?))
    }

    pub fn day_summary(&self, date: &str) -> Result<DaySummary> {
        let date = parse_date(date)?;
        Ok(DaySummary {
            date: day_key(date),
            entries: self.food_log.entries(date),
            totals: self.food_log.totals(date),
        })
    }

    #[must_use]
    pub fn current_protein_intake(&self) -> f64 {
        self.food_log.current_protein_intake()
    }

    /// Totals for each of the last `days` days ending today, oldest first.
    /// Days without a log report zero. At most [`MAX_HISTORY_DAYS`] days are
    /// returned.
    #[must_use]
    pub fn history(&self, days: u32) -> Vec<HistoryDay> {
        let today = self.clock.today();
        (0..u64::from(days.min(MAX_HISTORY_DAYS)))
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|date| HistoryDay {
                date,
                totals: self.cache.get_totals(date),
            })
            .collect()
    }

    /// Days that have a stored log, newest first.
    pub fn logged_dates(&self, limit: Option<i64>) -> Result<Vec<NaiveDate>> {
        self.log.dates(limit)
    }

    // --- Profile and recommendation ---

    /// The recommendation record, with `current` brought up to date for the
    /// active day.
    #[must_use]
    pub fn recommendation(&self) -> NutritionRecommendation {
        self.food_log.current_protein_intake();
        self.recommendation.snapshot()
    }

    #[must_use]
    pub fn profile(&self) -> Option<RemoteProfile> {
        self.recommendation.snapshot().profile
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.sync.user_id()
    }

    pub async fn sync_profile(
        &self,
        profile: &RemoteProfile,
        direction: SyncDirection,
    ) -> Result<SyncOutcome> {
        self.sync.sync_profile(profile, direction).await
    }

    pub async fn refresh_from_remote(&self) -> Result<SyncOutcome> {
        self.sync.refresh_from_remote().await
    }
}
