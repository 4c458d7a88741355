//! # pocketmed-assistant
//!
//! The conversational core of PocketMed: classifies chat text into profile
//! commands or questions, assembles model queries with the patient's profile,
//! and drives replies across channels.

pub mod classifier;
pub mod composer;
pub mod gateway;
pub mod handler;
pub mod replies;
pub mod runtime;

#[cfg(test)]
mod test_helpers;

pub use classifier::{Action, Classifier};
pub use composer::{ComposedQuery, QueryComposer, SYSTEM_PROMPT};
pub use gateway::AssistantGateway;
pub use handler::{ConversationHandler, Reply, ReplyKind};
pub use runtime::Runtime;
