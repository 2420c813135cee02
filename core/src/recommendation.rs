use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};
use tracing::warn;

use crate::error::Result;
use crate::log_store::SharedDatabase;
use crate::models::{NutritionRecommendation, RemoteProfile};
use crate::nutrition::recommended_protein;

const SETTING_KEY: &str = "nutrition_recommendation";

/// The session's recommendation record, persisted in the settings table.
///
/// Two write paths exist and each touches only its own fields:
/// [`RecommendationStore::set_current`] for the food log and
/// [`RecommendationStore::apply_profile`] for profile sync.
pub struct RecommendationStore {
    db: SharedDatabase,
    state: Mutex<NutritionRecommendation>,
}

impl RecommendationStore {
    /// Load the persisted record. A missing or unreadable record starts from
    /// the default.
    #[must_use]
    pub fn load(db: SharedDatabase) -> Self {
        let stored = db
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_setting(SETTING_KEY);
        let state = match stored {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "corrupt recommendation record, starting fresh");
                NutritionRecommendation::default()
            }),
            Ok(None) => NutritionRecommendation::default(),
            Err(err) => {
                warn!(error = %err, "failed to read recommendation record, starting fresh");
                NutritionRecommendation::default()
            }
        };
        Self {
            db,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, NutritionRecommendation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> NutritionRecommendation {
        self.state().clone()
    }

    /// Record today's intake as derived from the log for `day`.
    ///
    /// The in-memory record always takes the new value, since it mirrors a
    /// log write that has already happened. An error only means the record
    /// could not be persisted.
    pub fn set_current(&self, day: NaiveDate, current: f64) -> Result<NutritionRecommendation> {
        let mut state = self.state();
        state.current = current;
        state.day = Some(day);
        state.last_updated = Some(Utc::now());
        let next = state.clone();
        self.persist(&next)?;
        Ok(next)
    }

    /// Recompute `recommended` from `profile`. `current` is carried forward
    /// untouched.
    pub fn apply_profile(&self, profile: &RemoteProfile) -> Result<NutritionRecommendation> {
        let mut state = self.state();
        let next = NutritionRecommendation {
            recommended: recommended_protein(profile.weight, profile.fitness_goal),
            current: state.current,
            profile: Some(profile.clone()),
            day: state.day,
            last_updated: Some(Utc::now()),
        };
        self.persist(&next)?;
        *state = next.clone();
        Ok(next)
    }

    fn persist(&self, record: &NutritionRecommendation) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.db
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_setting(SETTING_KEY, &raw)
    }
}
