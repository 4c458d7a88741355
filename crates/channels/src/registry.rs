//! Channel registry: manages all active channel instances.
//!
//! Merges inbound messages from every channel into one stream and routes
//! outbound replies back to the channel a message came from.

use std::collections::HashMap;
use std::sync::Arc;

use pocketmed_core::channel::{Channel, ChannelMessage};
use pocketmed_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Central registry holding all enabled channel instances.
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    /// List all registered channel names.
    pub fn list(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Start all channels and merge their message streams into one receiver.
    pub async fn start_all(
        &self,
    ) -> Result<mpsc::Receiver<(String, Result<ChannelMessage, ChannelError>)>, ChannelError> {
        let (merged_tx, merged_rx) = mpsc::channel(256);

        for (name, channel) in &self.channels {
            let mut rx = channel.start().await?;
            let tx = merged_tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if tx.send((channel_name.clone(), msg)).await.is_err() {
                        break; // Merged receiver dropped
                    }
                }
            });

            info!(channel = %name, "Started channel");
        }

        Ok(merged_rx)
    }

    fn lookup(&self, channel_name: &str) -> Result<&Arc<dyn Channel>, ChannelError> {
        self.channels.get(channel_name).ok_or_else(|| {
            ChannelError::NotConfigured(format!("Channel '{}' not found", channel_name))
        })
    }

    /// Send a message to a specific channel.
    pub async fn send_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.lookup(channel_name)?
            .send(chat_id, content, reply_to)
            .await
    }

    /// Show a typing indicator on a specific channel.
    pub async fn typing_on(&self, channel_name: &str, chat_id: &str) -> Result<(), ChannelError> {
        self.lookup(channel_name)?.send_typing(chat_id).await
    }

    /// Whether the named channel accepts this sender. Unknown channels accept no one.
    pub fn is_allowed(&self, channel_name: &str, sender_id: &str) -> bool {
        self.channels
            .get(channel_name)
            .is_some_and(|c| c.is_allowed(sender_id))
    }

    /// Stop all channels gracefully.
    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }

    /// Run health checks on all channels.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            let healthy = channel.health_check().await.unwrap_or(false);
            results.insert(name.clone(), healthy);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{TelegramChannel, TelegramConfig};
    use crate::CliChannel;
    use pocketmed_core::channel::ChannelId;

    fn telegram() -> Arc<TelegramChannel> {
        Arc::new(TelegramChannel::new(TelegramConfig {
            allowed_users: vec!["42".into()],
            poll_timeout_secs: 1,
            api_base: "http://127.0.0.1:9".into(),
            ..TelegramConfig::new("tok")
        }))
    }

    #[test]
    fn register_and_list() {
        let mut registry = ChannelRegistry::new();
        assert!(registry.list().is_empty());

        registry.register(Arc::new(CliChannel::new()));
        registry.register(telegram());

        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["cli", "telegram"]);
    }

    #[tokio::test]
    async fn health_check_reports_each_channel() {
        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(CliChannel::new()));
        registry.register(telegram());

        let health = registry.health_check_all().await;
        assert_eq!(health.len(), 2);
        assert_eq!(health.get("cli"), Some(&true));
        // Nothing listens on the Telegram test endpoint
        assert_eq!(health.get("telegram"), Some(&false));
    }

    #[test]
    fn allowlist_is_per_channel() {
        let mut registry = ChannelRegistry::new();
        registry.register(telegram());
        registry.register(Arc::new(CliChannel::new()));

        assert!(registry.is_allowed("telegram", "42"));
        assert!(!registry.is_allowed("telegram", "7"));
        assert!(registry.is_allowed("cli", "7"));
        assert!(!registry.is_allowed("discord", "42"));
    }

    #[tokio::test]
    async fn send_to_unknown_channel_fails() {
        let registry = ChannelRegistry::new();
        let err = registry.send_to("nope", "c", "hi", None).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn merged_stream_tags_channel_name() {
        let tg = telegram();
        let mut registry = ChannelRegistry::new();
        registry.register(tg.clone());

        let mut rx = registry.start_all().await.unwrap();
        tg.inject_message(ChannelMessage {
            channel_id: ChannelId("telegram".into()),
            sender_id: "42".into(),
            sender_name: None,
            content: "summary".into(),
            chat_id: "42".into(),
            message_id: None,
            metadata: serde_json::Map::new(),
        })
        .await
        .unwrap();

        let (name, msg) = rx.recv().await.unwrap();
        assert_eq!(name, "telegram");
        assert_eq!(msg.unwrap().content, "summary");
        registry.stop_all().await;
    }
}
