//! Subcommand implementations.

pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod serve;
pub mod status;

use std::sync::Arc;

use pocketmed_assistant::ConversationHandler;
use pocketmed_config::AppConfig;
use pocketmed_memory::InMemoryProfileStore;

/// Wire the default provider and a fresh in-memory store into a handler.
pub(crate) fn build_handler(
    config: &AppConfig,
) -> Result<Arc<ConversationHandler>, Box<dyn std::error::Error>> {
    let router = pocketmed_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let store = Arc::new(InMemoryProfileStore::new());

    Ok(Arc::new(ConversationHandler::from_config(config, provider, store)))
}
