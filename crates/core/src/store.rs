//! ProfileStore trait: per-user session memory for patient profiles.
//!
//! A store holds one [`PatientProfile`] per user identity for as long as the
//! backend lives. Implementations must make a single-field update atomic with
//! respect to other updates for the same user; users never share state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProfileError;
use crate::profile::{FieldUpdate, PatientProfile};

/// Opaque user identity, owned by the chat channel that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Scope a platform sender id to its channel so ids from different
    /// platforms never collide.
    pub fn scoped(channel: &str, sender_id: &str) -> Self {
        Self(format!("{channel}:{sender_id}"))
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The core ProfileStore trait.
///
/// Implementations: in-memory (process lifetime).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Return the user's profile, creating an empty one on first access.
    ///
    /// Repeated calls for the same user observe the same underlying record.
    async fn get_or_create(&self, user_id: &UserId) -> std::result::Result<PatientProfile, ProfileError>;

    /// Overwrite exactly one field of the user's profile and return the
    /// profile as it stands after the write.
    async fn set_field(
        &self,
        user_id: &UserId,
        update: FieldUpdate,
    ) -> std::result::Result<PatientProfile, ProfileError>;

    /// Number of profiles currently held.
    async fn count(&self) -> std::result::Result<usize, ProfileError>;
}
