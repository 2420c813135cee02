//! Typed publish/subscribe dispatch for engine notifications.
//!
//! Handlers run synchronously on the dispatching thread. Each `dispatch` works
//! from a snapshot of the handler list, so handlers may subscribe, unsubscribe,
//! or dispatch again without disturbing the delivery in progress.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::models::{DailyTotals, NutritionRecommendation, RemoteProfile, SyncDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ProfileUpdated,
    ProteinDataUpdated,
    FoodLogUpdated,
    SyncCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChange {
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    ProfileUpdated {
        profile: RemoteProfile,
    },
    ProteinDataUpdated {
        recommendation: NutritionRecommendation,
    },
    FoodLogUpdated {
        date: NaiveDate,
        change: LogChange,
        entry_id: String,
        totals: DailyTotals,
    },
    SyncCompleted {
        profile: RemoteProfile,
        recommendation: NutritionRecommendation,
        direction: SyncDirection,
    },
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProfileUpdated { .. } => EventKind::ProfileUpdated,
            Self::ProteinDataUpdated { .. } => EventKind::ProteinDataUpdated,
            Self::FoodLogUpdated { .. } => EventKind::FoodLogUpdated,
            Self::SyncCompleted { .. } => EventKind::SyncCompleted,
        }
    }
}

pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(SubscriptionId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not subscribed to `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }

    /// Deliver `event` to every handler subscribed to its kind at the moment
    /// of the call. Handler errors and panics are logged and counted, never
    /// propagated.
    pub fn dispatch(&self, event: &Event) -> DispatchSummary {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, Handler)> =
            self.handlers().get(&kind).cloned().unwrap_or_default();

        let mut summary = DispatchSummary::default();
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => summary.delivered += 1,
                Ok(Err(err)) => {
                    warn!(?kind, subscription = id.0, error = %format!("{err:#}"), "event handler failed");
                    summary.failed += 1;
                }
                Err(_) => {
                    warn!(?kind, subscription = id.0, "event handler panicked");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers().get(&kind).map_or(0, Vec::len)
    }
}
