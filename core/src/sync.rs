//! Profile synchronization between the remote store and the local
//! recommendation record.
//!
//! At most one sync runs at a time and a new one may not start within the
//! debounce window of the last successful one. Calls turned away for either
//! reason return [`SyncOutcome::Skipped`] instead of queuing.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::food_log::FoodLog;
use crate::models::{NutritionRecommendation, ProfileUpdate, RemoteProfile, SyncDirection};
use crate::recommendation::RecommendationStore;
use crate::remote::RemoteProfileStore;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InFlight,
    Debounced,
    NoRemoteProfile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InFlight => "another sync is in progress",
            Self::Debounced => "a sync completed moments ago",
            Self::NoRemoteProfile => "no remote profile for this session",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub profile: RemoteProfile,
    pub recommendation: NutritionRecommendation,
    pub direction: SyncDirection,
    /// Whether the remote store accepted the push. `None` for pulls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_accepted: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped { reason: SkipReason },
}

impl SyncOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Completed(_) => None,
            Self::Skipped { reason } => Some(*reason),
        }
    }
}

#[derive(Default)]
struct FlightState {
    in_flight: bool,
    last_completed: Option<Instant>,
}

/// Clears the in-flight flag when dropped, whether the sync finished, failed,
/// or its future was dropped mid-await.
struct FlightGuard<'a> {
    state: &'a Mutex<FlightState>,
}

impl FlightGuard<'_> {
    fn complete(&self) {
        lock(self.state).last_completed = Some(Instant::now());
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).in_flight = false;
    }
}

fn lock(state: &Mutex<FlightState>) -> MutexGuard<'_, FlightState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SyncCoordinator {
    remote: Arc<dyn RemoteProfileStore>,
    recommendation: Arc<RecommendationStore>,
    food_log: Arc<FoodLog>,
    bus: Arc<EventBus>,
    user_id: Option<String>,
    debounce: Duration,
    state: Mutex<FlightState>,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteProfileStore>,
        recommendation: Arc<RecommendationStore>,
        food_log: Arc<FoodLog>,
        bus: Arc<EventBus>,
        user_id: Option<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            remote,
            recommendation,
            food_log,
            bus,
            user_id,
            debounce,
            state: Mutex::new(FlightState::default()),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        lock(&self.state).in_flight
    }

    fn begin(&self) -> std::result::Result<FlightGuard<'_>, SkipReason> {
        let mut state = lock(&self.state);
        if state.in_flight {
            return Err(SkipReason::InFlight);
        }
        if state
            .last_completed
            .is_some_and(|at| at.elapsed() < self.debounce)
        {
            return Err(SkipReason::Debounced);
        }
        state.in_flight = true;
        Ok(FlightGuard { state: &self.state })
    }

    /// Reconcile `profile` in the given direction.
    ///
    /// `ToLocal` treats `profile` as authoritative and only recomputes the
    /// local target. `ToRemote` pushes it to the remote store first; a remote
    /// failure propagates and leaves local state untouched.
    pub async fn sync_profile(
        &self,
        profile: &RemoteProfile,
        direction: SyncDirection,
    ) -> Result<SyncOutcome> {
        profile.validate()?;
        let guard = match self.begin() {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(?reason, ?direction, "profile sync dropped");
                return Ok(SyncOutcome::Skipped { reason });
            }
        };

        let remote_accepted = match direction {
            SyncDirection::ToLocal => None,
            SyncDirection::ToRemote => {
                let user_id = self
                    .user_id
                    .as_deref()
                    .ok_or_else(|| Error::RemoteUnavailable("no signed-in user".to_string()))?;
                let accepted = self
                    .remote
                    .update(user_id, &ProfileUpdate::from(profile))
                    .await?;
                if !accepted {
                    warn!(user_id, "remote store declined profile update");
                }
                Some(accepted)
            }
        };

        let report = self.apply(&guard, profile.clone(), direction, remote_accepted)?;
        Ok(SyncOutcome::Completed(report))
    }

    /// Fetch the signed-in user's profile and apply it locally.
    pub async fn refresh_from_remote(&self) -> Result<SyncOutcome> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::NoRemoteProfile,
            });
        };
        let guard = match self.begin() {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(?reason, "profile refresh dropped");
                return Ok(SyncOutcome::Skipped { reason });
            }
        };

        let Some(profile) = self.remote.fetch(user_id).await? else {
            debug!(user_id, "no remote profile to pull");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::NoRemoteProfile,
            });
        };
        profile.validate()?;

        let report = self.apply(&guard, profile, SyncDirection::ToLocal, None)?;
        Ok(SyncOutcome::Completed(report))
    }

    // Events go out while the flight is still held, so a handler that
    // triggers another sync is turned away instead of looping. `current` is
    // rolled to the active day first so a sync never carries a previous
    // day's intake forward.
    fn apply(
        &self,
        guard: &FlightGuard<'_>,
        profile: RemoteProfile,
        direction: SyncDirection,
        remote_accepted: Option<bool>,
    ) -> Result<SyncReport> {
        self.food_log.roll_active_day();
        let recommendation = self.recommendation.apply_profile(&profile)?;
        guard.complete();
        info!(
            ?direction,
            recommended = recommendation.recommended,
            current = recommendation.current,
            "profile sync completed"
        );

        self.bus.dispatch(&Event::ProfileUpdated {
            profile: profile.clone(),
        });
        self.bus.dispatch(&Event::ProteinDataUpdated {
            recommendation: recommendation.clone(),
        });
        self.bus.dispatch(&Event::SyncCompleted {
            profile: profile.clone(),
            recommendation: recommendation.clone(),
            direction,
        });

        Ok(SyncReport {
            profile,
            recommendation,
            direction,
            remote_accepted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ComputationCache;
    use crate::clock::{Clock, FixedClock};
    use crate::db::Database;
    use crate::events::EventKind;
    use crate::log_store::LogStore;
    use crate::models::{ActivityLevel, FitnessGoal, Gender, NewFoodEntry};
    use crate::remote::MemoryProfileStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Remote store that takes a while to answer and counts its calls.
    #[derive(Default)]
    struct SlowStore {
        updates: AtomicUsize,
        fetches: AtomicUsize,
        fail: AtomicBool,
        profile: Mutex<Option<RemoteProfile>>,
    }

    #[async_trait]
    impl RemoteProfileStore for SlowStore {
        async fn fetch(&self, _user_id: &str) -> Result<Option<RemoteProfile>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(self.profile.lock().unwrap().clone())
        }

        async fn update(&self, _user_id: &str, _update: &ProfileUpdate) -> Result<bool> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::RemoteUnavailable("connection refused".to_string()));
            }
            Ok(true)
        }
    }

    fn profile(weight: f64, goal: FitnessGoal) -> RemoteProfile {
        RemoteProfile {
            weight,
            height: 180.0,
            age: 35,
            gender: Gender::Male,
            activity_level: ActivityLevel::Moderate,
            fitness_goal: goal,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    struct Fixture {
        coordinator: SyncCoordinator,
        recommendation: Arc<RecommendationStore>,
        food_log: Arc<FoodLog>,
        bus: Arc<EventBus>,
        clock: Arc<FixedClock>,
    }

    fn fixture(remote: Arc<dyn RemoteProfileStore>, user_id: Option<&str>) -> Fixture {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let log = Arc::new(LogStore::new(Arc::clone(&db)));
        let cache = Arc::new(ComputationCache::new(Arc::clone(&log)));
        let recommendation = Arc::new(RecommendationStore::load(db));
        let bus = Arc::new(EventBus::new());
        let clock = Arc::new(FixedClock::new(day(15)));
        let food_log = Arc::new(FoodLog::new(
            log,
            cache,
            Arc::clone(&recommendation),
            Arc::clone(&bus),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let coordinator = SyncCoordinator::new(
            remote,
            Arc::clone(&recommendation),
            Arc::clone(&food_log),
            Arc::clone(&bus),
            user_id.map(str::to_string),
            DEFAULT_DEBOUNCE,
        );
        Fixture {
            coordinator,
            recommendation,
            food_log,
            bus,
            clock,
        }
    }

    fn coordinator(
        remote: Arc<dyn RemoteProfileStore>,
        user_id: Option<&str>,
    ) -> (SyncCoordinator, Arc<RecommendationStore>, Arc<EventBus>) {
        let f = fixture(remote, user_id);
        (f.coordinator, f.recommendation, f.bus)
    }

    fn food(protein: f64) -> NewFoodEntry {
        NewFoodEntry {
            name: "Chicken".to_string(),
            protein,
            calories: 0.0,
            carbs: 0.0,
            fat: 0.0,
            serving_size: 100.0,
            meal_type: "lunch".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_syncs_single_flight() {
        let store = Arc::new(SlowStore::default());
        let (c, _, _) = coordinator(store.clone(), Some("u1"));
        let p = profile(70.0, FitnessGoal::MuscleGain);

        let (a, b) = tokio::join!(
            c.sync_profile(&p, SyncDirection::ToRemote),
            c.sync_profile(&p, SyncDirection::ToRemote)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(a.is_completed());
        assert_eq!(b.skip_reason(), Some(SkipReason::InFlight));
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
        assert!(!c.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_window() {
        let (c, _, _) = coordinator(Arc::new(MemoryProfileStore::new()), None);
        let p = profile(70.0, FitnessGoal::Maintenance);

        assert!(c.sync_profile(&p, SyncDirection::ToLocal).await.unwrap().is_completed());

        tokio::time::advance(Duration::from_millis(400)).await;
        let second = c.sync_profile(&p, SyncDirection::ToLocal).await.unwrap();
        assert_eq!(second.skip_reason(), Some(SkipReason::Debounced));

        tokio::time::advance(Duration::from_millis(601)).await;
        assert!(c.sync_profile(&p, SyncDirection::ToLocal).await.unwrap().is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_to_local_preserves_current() {
        let f = fixture(Arc::new(MemoryProfileStore::new()), None);
        let (c, recommendation) = (&f.coordinator, &f.recommendation);
        f.food_log.add(day(15), &food(31.0)).unwrap();
        f.food_log.add(day(15), &food(17.0)).unwrap();

        let outcome = c
            .sync_profile(&profile(70.0, FitnessGoal::MuscleGain), SyncDirection::ToLocal)
            .await
            .unwrap();
        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected a completed sync");
        };
        assert!((report.recommendation.recommended - 126.0).abs() < f64::EPSILON);
        assert!((report.recommendation.current - 48.0).abs() < f64::EPSILON);
        assert!(report.remote_accepted.is_none());
        assert!((recommendation.snapshot().current - 48.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_after_day_change_starts_from_new_day() {
        let f = fixture(Arc::new(MemoryProfileStore::new()), None);
        f.food_log.add(day(15), &food(48.0)).unwrap();
        f.clock.set(day(16));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_ref = Arc::clone(&seen);
        f.bus.subscribe(EventKind::SyncCompleted, move |event| {
            if let Event::SyncCompleted { recommendation, .. } = event {
                seen_ref
                    .lock()
                    .unwrap()
                    .push((recommendation.day, recommendation.current));
            }
            Ok(())
        });

        f.coordinator
            .sync_profile(&profile(70.0, FitnessGoal::MuscleGain), SyncDirection::ToLocal)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(Some(day(16)), 0.0)]);
        let rec = f.recommendation.snapshot();
        assert!(rec.current.abs() < f64::EPSILON);
        assert_eq!(rec.day, Some(day(16)));
        // The previous day's log is untouched
        assert!((f.food_log.totals(day(15)).protein - 48.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_after_day_change_picks_up_logged_new_day() {
        let f = fixture(Arc::new(MemoryProfileStore::new()), None);
        f.food_log.add(day(16), &food(20.0)).unwrap();
        f.food_log.add(day(15), &food(48.0)).unwrap();
        f.clock.set(day(16));

        let SyncOutcome::Completed(report) = f
            .coordinator
            .sync_profile(&profile(70.0, FitnessGoal::MuscleGain), SyncDirection::ToLocal)
            .await
            .unwrap()
        else {
            panic!("expected a completed sync");
        };
        assert!((report.recommendation.current - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_propagates_and_releases_flight() {
        let store = Arc::new(SlowStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let (c, recommendation, _) = coordinator(store.clone(), Some("u1"));
        let p = profile(90.0, FitnessGoal::WeightLoss);

        let err = c.sync_profile(&p, SyncDirection::ToRemote).await.unwrap_err();
        assert!(err.is_remote_unavailable());
        assert!(!c.is_in_flight());
        // Local state untouched by the failed push
        assert!(recommendation.snapshot().recommended.abs() < f64::EPSILON);

        // A failed sync does not start the debounce window
        store.fail.store(false, Ordering::SeqCst);
        let outcome = c.sync_profile(&p, SyncDirection::ToRemote).await.unwrap();
        assert!(outcome.is_completed());
        assert!((recommendation.snapshot().recommended - 144.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_to_remote_without_user_is_unavailable() {
        let (c, _, _) = coordinator(Arc::new(MemoryProfileStore::new()), None);
        let err = c
            .sync_profile(&profile(70.0, FitnessGoal::Maintenance), SyncDirection::ToRemote)
            .await
            .unwrap_err();
        assert!(err.is_remote_unavailable());
        assert!(!c.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_to_remote_writes_remote_store() {
        let store = Arc::new(MemoryProfileStore::new());
        let (c, _, _) = coordinator(store.clone(), Some("u1"));
        let p = profile(65.0, FitnessGoal::MuscleGain);

        let SyncOutcome::Completed(report) =
            c.sync_profile(&p, SyncDirection::ToRemote).await.unwrap()
        else {
            panic!("expected a completed sync");
        };
        assert_eq!(report.remote_accepted, Some(true));
        assert_eq!(store.fetch("u1").await.unwrap(), Some(p));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_profile_rejected_before_flight() {
        let store = Arc::new(SlowStore::default());
        let (c, _, _) = coordinator(store.clone(), Some("u1"));
        let mut p = profile(70.0, FitnessGoal::Maintenance);
        p.weight = -5.0;

        let err = c.sync_profile(&p, SyncDirection::ToRemote).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_completed_event_payload() {
        let (c, _, bus) = coordinator(Arc::new(MemoryProfileStore::new()), None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_ref = Arc::clone(&seen);
        bus.subscribe(EventKind::SyncCompleted, move |event| {
            if let Event::SyncCompleted {
                recommendation,
                direction,
                ..
            } = event
            {
                seen_ref
                    .lock()
                    .unwrap()
                    .push((recommendation.recommended, *direction));
            }
            Ok(())
        });

        c.sync_profile(&profile(70.0, FitnessGoal::MuscleGain), SyncDirection::ToLocal)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(126.0, SyncDirection::ToLocal)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_fire_while_flight_held() {
        let (c, _, bus) = coordinator(Arc::new(MemoryProfileStore::new()), None);
        let c = Arc::new(c);
        let observed = Arc::new(AtomicBool::new(false));
        let (c_ref, observed_ref) = (Arc::clone(&c), Arc::clone(&observed));
        bus.subscribe(EventKind::SyncCompleted, move |_| {
            observed_ref.store(c_ref.is_in_flight(), Ordering::SeqCst);
            Ok(())
        });

        c.sync_profile(&profile(70.0, FitnessGoal::Maintenance), SyncDirection::ToLocal)
            .await
            .unwrap();
        assert!(observed.load(Ordering::SeqCst));
        assert!(!c.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_from_remote() {
        let store = Arc::new(SlowStore::default());
        *store.profile.lock().unwrap() = Some(profile(80.0, FitnessGoal::WeightLoss));
        let (c, recommendation, _) = coordinator(store.clone(), Some("u1"));

        let outcome = c.refresh_from_remote().await.unwrap();
        assert!(outcome.is_completed());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert!((recommendation.snapshot().recommended - 128.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_profile_or_user() {
        let store = Arc::new(SlowStore::default());
        let (c, _, _) = coordinator(store.clone(), Some("u1"));
        let outcome = c.refresh_from_remote().await.unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::NoRemoteProfile));
        assert!(!c.is_in_flight());

        let (anon, _, _) = coordinator(store.clone(), None);
        let outcome = anon.refresh_from_remote().await.unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::NoRemoteProfile));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refresh_and_push_single_flight() {
        let store = Arc::new(SlowStore::default());
        *store.profile.lock().unwrap() = Some(profile(80.0, FitnessGoal::Maintenance));
        let (c, _, _) = coordinator(store.clone(), Some("u1"));

        let p = profile(70.0, FitnessGoal::Maintenance);
        let (pull, push) = tokio::join!(
            c.refresh_from_remote(),
            c.sync_profile(&p, SyncDirection::ToRemote)
        );
        assert!(pull.unwrap().is_completed());
        assert_eq!(push.unwrap().skip_reason(), Some(SkipReason::InFlight));
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    }
}
