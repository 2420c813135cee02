use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ProfileUpdate, RemoteProfile};

/// Identity-bound profile records held by an external, authenticated
/// document store.
///
/// `fetch` returns `Ok(None)` when the user has no profile or the caller is not
/// authenticated. Network and auth failures surface as
/// [`Error::RemoteUnavailable`](crate::Error::RemoteUnavailable).
#[async_trait]
pub trait RemoteProfileStore: Send + Sync {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteProfile>>;

    /// Apply a partial update. Returns false when the store declined it
    /// (for example no profile document exists and the update is partial).
    async fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<bool>;
}

/// Process-local profile store, used for offline sessions and tests.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, RemoteProfile>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_profile(user_id: &str, profile: RemoteProfile) -> Self {
        let store = Self::new();
        store.profiles().insert(user_id.to_string(), profile);
        store
    }

    fn profiles(&self) -> MutexGuard<'_, HashMap<String, RemoteProfile>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteProfileStore for MemoryProfileStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteProfile>> {
        Ok(self.profiles().get(user_id).cloned())
    }

    async fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<bool> {
        let mut profiles = self.profiles();
        if let Some(existing) = profiles.get_mut(user_id) {
            *existing = existing.merged(update);
            return Ok(true);
        }
        match complete_profile(update) {
            Some(profile) => {
                profiles.insert(user_id.to_string(), profile);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn complete_profile(update: &ProfileUpdate) -> Option<RemoteProfile> {
    Some(RemoteProfile {
        weight: update.weight?,
        height: update.height?,
        age: update.age?,
        gender: update.gender?,
        activity_level: update.activity_level?,
        fitness_goal: update.fitness_goal?,
    })
}
