//! Conversation handler: one inbound text in, one reply out.
//!
//! Ties the classifier, the profile store, the composer and the gateway
//! together. Failures never escape as errors; they become fixed apology or
//! correction texts so no internal detail reaches the chat.

use std::sync::Arc;
use std::time::Duration;

use pocketmed_config::AppConfig;
use pocketmed_core::error::ProfileError;
use pocketmed_core::profile::{FieldUpdate, ProfileField};
use pocketmed_core::provider::Provider;
use pocketmed_core::store::{ProfileStore, UserId};
use tracing::{debug, info, warn};

use crate::classifier::{Action, Classifier};
use crate::composer::QueryComposer;
use crate::gateway::AssistantGateway;
use crate::replies;

/// What kind of reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Greeting,
    Saved(ProfileField),
    Summary,
    NoProfile,
    Answer,
    InvalidValue(ProfileField),
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
}

impl Reply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

pub struct ConversationHandler {
    classifier: Classifier,
    composer: QueryComposer,
    gateway: AssistantGateway,
    store: Arc<dyn ProfileStore>,
    max_output_tokens: u32,
    temperature: f32,
}

impl ConversationHandler {
    pub fn new(
        classifier: Classifier,
        composer: QueryComposer,
        gateway: AssistantGateway,
        store: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            classifier,
            composer,
            gateway,
            store,
            max_output_tokens: 300,
            temperature: 0.2,
        }
    }

    /// Build a handler with keywords, prompt, model and limits from config.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn ProfileStore>,
    ) -> Self {
        let gateway = AssistantGateway::new(
            provider,
            &config.default_model,
            Duration::from_secs(config.request_timeout_secs),
        );

        Self::new(
            Classifier::from_config(&config.keywords),
            QueryComposer::with_override(config.assistant.system_prompt.as_deref()),
            gateway,
            store,
        )
        .with_generation(config.default_max_tokens, config.default_temperature)
    }

    pub fn with_generation(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }

    /// The reply to a new conversation. Static, independent of any profile.
    pub fn greeting(&self) -> Reply {
        Reply::new(ReplyKind::Greeting, replies::GREETING)
    }

    pub fn classify(&self, text: &str) -> Result<Action, ProfileError> {
        self.classifier.classify(text)
    }

    /// Classify and resolve one message.
    pub async fn handle(&self, user: &UserId, text: &str) -> Reply {
        let action = self.classify(text);
        self.handle_action(user, action).await
    }

    /// Resolve an already classified message.
    pub async fn handle_action(&self, user: &UserId, action: Result<Action, ProfileError>) -> Reply {
        match action {
            Ok(Action::FieldUpdate(update)) => self.save(user, update).await,
            Ok(Action::SummaryRequest) => self.summary(user).await,
            Ok(Action::Question(question)) => self.answer(user, &question).await,
            Err(ProfileError::Validation { field, value }) => {
                info!(user = %user, field = %field, "Rejected profile value");
                Reply::new(
                    ReplyKind::InvalidValue(field),
                    replies::invalid_value(field, &value, self.classifier.keyword_for(field)),
                )
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Profile command failed");
                Reply::new(ReplyKind::Failure, replies::STORAGE_FAILURE)
            }
        }
    }

    async fn save(&self, user: &UserId, update: FieldUpdate) -> Reply {
        let field = update.field();
        match self.store.set_field(user, update).await {
            Ok(_) => {
                info!(user = %user, field = %field, "Profile field saved");
                Reply::new(ReplyKind::Saved(field), replies::saved(field))
            }
            Err(e) => {
                warn!(user = %user, field = %field, error = %e, "Failed to save profile field");
                Reply::new(ReplyKind::Failure, replies::STORAGE_FAILURE)
            }
        }
    }

    async fn summary(&self, user: &UserId) -> Reply {
        match self.store.get_or_create(user).await {
            Ok(profile) if profile.is_empty() => Reply::new(ReplyKind::NoProfile, replies::NO_PROFILE),
            Ok(profile) => Reply::new(ReplyKind::Summary, profile.format()),
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to read profile");
                Reply::new(ReplyKind::Failure, replies::STORAGE_FAILURE)
            }
        }
    }

    async fn answer(&self, user: &UserId, question: &str) -> Reply {
        // The snapshot is taken before the model call; no lock is held while it runs.
        let profile = match self.store.get_or_create(user).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(user = %user, error = %e, "Answering without profile context");
                None
            }
        };

        let query = self.composer.compose(question, profile.as_ref());
        debug!(
            user = %user,
            question_len = question.len(),
            with_profile = query.has_profile_context(),
            "Asking model"
        );

        match self
            .gateway
            .generate(query, self.max_output_tokens, self.temperature)
            .await
        {
            Ok(answer) => Reply::new(ReplyKind::Answer, answer),
            Err(e) => {
                warn!(
                    user = %user,
                    provider = self.gateway.provider_name(),
                    error = %e,
                    "Model call failed"
                );
                Reply::new(ReplyKind::Failure, replies::GATEWAY_FAILURE)
            }
        }
    }
}
