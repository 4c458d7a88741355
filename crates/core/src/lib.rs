//! # PocketMed Core
//!
//! Domain types, traits, and error definitions for the PocketMed diabetes
//! assistant. This crate has **no transport or HTTP dependencies**: it defines
//! the patient profile, the message model sent to language models, and the
//! seams (`Provider`, `Channel`, `ProfileStore`) that other crates implement.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates.

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod profile;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{ChannelError, ProfileError, ProviderError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use channel::{Channel, ChannelMessage, ChannelId};
pub use profile::{PatientProfile, ProfileField, FieldUpdate, NO_PROFILE_SENTINEL};
pub use store::{ProfileStore, UserId};
