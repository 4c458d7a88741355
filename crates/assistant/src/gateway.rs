//! Assistant gateway: runs a composed query against the language model.

use std::sync::Arc;
use std::time::Duration;

use pocketmed_core::error::ProviderError;
use pocketmed_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

use crate::composer::ComposedQuery;

pub struct AssistantGateway {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl AssistantGateway {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate an answer for `query`. Not retried on failure.
    ///
    /// An answer that is blank after trimming counts as an API failure.
    pub async fn generate(
        &self,
        query: ComposedQuery,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: query.into_messages(),
            temperature,
            max_tokens: Some(max_output_tokens),
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                warn!(
                    provider = self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Model call timed out"
                );
                ProviderError::Timeout(format!("no answer within {:?}", self.timeout))
            })??;

        let answer = response.message.content.trim();
        if answer.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "empty answer".into(),
            });
        }

        debug!(
            provider = self.provider.name(),
            model = %response.model,
            answer_len = answer.len(),
            total_tokens = response.usage.as_ref().map(|u| u.total_tokens),
            "Model answered"
        );

        Ok(answer.to_string())
    }
}
