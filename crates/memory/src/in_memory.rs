//! In-memory profile store: profiles live exactly as long as the process.

use async_trait::async_trait;
use pocketmed_core::error::ProfileError;
use pocketmed_core::profile::{FieldUpdate, PatientProfile};
use pocketmed_core::store::{ProfileStore, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Stores one profile per user in a map of per-user mutexes.
///
/// The outer lock only guards map membership; each profile has its own
/// mutex, so updates for one user never wait on another user.
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<UserId, Arc<Mutex<PatientProfile>>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the user's slot, inserting an empty profile on first access.
    async fn slot(&self, user_id: &UserId) -> Arc<Mutex<PatientProfile>> {
        if let Some(slot) = self.profiles.read().await.get(user_id) {
            return Arc::clone(slot);
        }

        let mut profiles = self.profiles.write().await;
        let slot = profiles.entry(user_id.clone()).or_insert_with(|| {
            debug!(user = %user_id, "Creating empty profile");
            Arc::new(Mutex::new(PatientProfile::new()))
        });
        Arc::clone(slot)
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_or_create(&self, user_id: &UserId) -> Result<PatientProfile, ProfileError> {
        let slot = self.slot(user_id).await;
        let profile = slot.lock().await.clone();
        Ok(profile)
    }

    async fn set_field(
        &self,
        user_id: &UserId,
        update: FieldUpdate,
    ) -> Result<PatientProfile, ProfileError> {
        let slot = self.slot(user_id).await;
        let mut profile = slot.lock().await;
        debug!(user = %user_id, field = %update.field(), "Updating profile field");
        profile.apply(update);
        Ok(profile.clone())
    }

    async fn count(&self) -> Result<usize, ProfileError> {
        Ok(self.profiles.read().await.len())
    }
}
