//! Telegram channel adapter.
//!
//! Implements the Channel trait for the Telegram Bot API using `getUpdates`
//! long polling for inbound messages and `sendMessage` for replies.
//! Only text messages are relayed; other update kinds are skipped.

use async_trait::async_trait;
use pocketmed_core::channel::{Channel, ChannelId, ChannelMessage};
use pocketmed_core::error::ChannelError;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram rejects messages longer than this many UTF-16 code units.
const MAX_MESSAGE_UNITS: usize = 4096;

/// Pause after a failed poll before trying again.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed user IDs. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
    /// Long-poll timeout passed to getUpdates, in seconds.
    pub poll_timeout_secs: u64,
    /// Bot API base URL (overridable for self-hosted Bot API servers).
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            allowed_users: vec!["*".into()],
            poll_timeout_secs: 30,
            api_base: TELEGRAM_API.into(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    /// Sender shared with the polling task; also used to inject test messages.
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    stop_tx: watch::Sender<bool>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        // The HTTP timeout must outlast the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        let (stop_tx, _) = watch::channel(false);

        Self {
            config,
            channel_id: ChannelId("telegram".into()),
            client,
            inject_tx: tokio::sync::Mutex::new(None),
            stop_tx,
        }
    }

    /// Inject a message as if it came from Telegram (for testing).
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.config.bot_token, method)
    }

    /// Call a Bot API method and check the `ok` flag of the reply.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), ChannelError> {
        let delivery_failed = |reason: String| ChannelError::DeliveryFailed {
            channel: "telegram".into(),
            reason,
        };

        // `without_url` keeps the bot token out of error messages.
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| delivery_failed(e.without_url().to_string()))?;

        let status = response.status();
        let reply: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| delivery_failed(e.without_url().to_string()))?;

        if !reply.ok {
            return Err(delivery_failed(
                reply.description.unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!(poll_timeout_secs = self.config.poll_timeout_secs, "Telegram channel starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx.clone());

        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();

        let client = self.client.clone();
        let url = self.method_url("getUpdates");
        let timeout = self.config.poll_timeout_secs;
        let channel_id = self.channel_id.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            loop {
                let result = tokio::select! {
                    _ = stop_rx.changed() => break,
                    result = fetch_updates(&client, &url, offset, timeout) => result,
                };

                match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            let Some(msg) = update.into_channel_message(&channel_id) else {
                                continue;
                            };
                            if tx.send(Ok(msg)).await.is_err() {
                                debug!("Telegram receiver dropped, stopping poll loop");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Telegram getUpdates failed");
                        tokio::select! {
                            _ = stop_rx.changed() => break,
                            _ = tokio::time::sleep(POLL_BACKOFF) => {}
                        }
                    }
                }
            }

            info!("Telegram polling stopped");
        });

        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        if content.trim().is_empty() {
            return Err(ChannelError::InvalidPayload("Refusing to send an empty message".into()));
        }

        let reply_to = reply_to.and_then(|id| id.parse::<i64>().ok());

        for (i, chunk) in split_message(content, MAX_MESSAGE_UNITS).into_iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let (0, Some(id)) = (i, reply_to) {
                body["reply_to_message_id"] = serde_json::json!(id);
            }

            self.call("sendMessage", body).await?;
        }

        debug!(chat_id = %chat_id, content_len = content.len(), "Telegram message sent");
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.call(
            "sendChatAction",
            serde_json::json!({ "chat_id": chat_id, "action": "typing" }),
        )
        .await
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_users.is_empty() {
            return false;
        }
        if self.config.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        *self.inject_tx.lock().await = None;
        self.stop_tx.send_replace(true);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Ok(false);
        }
        match self.call("getMe", serde_json::json!({})).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "Telegram getMe failed");
                Ok(false)
            }
        }
    }
}

/// One long-poll round trip.
async fn fetch_updates(
    client: &reqwest::Client,
    url: &str,
    offset: i64,
    timeout_secs: u64,
) -> Result<Vec<Update>, ChannelError> {
    let response = client
        .get(url)
        .query(&[
            ("offset", offset.to_string()),
            ("timeout", timeout_secs.to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ])
        .send()
        .await
        .map_err(|e| ChannelError::ConnectionLost(e.without_url().to_string()))?;

    let reply: ApiResponse<Vec<Update>> = response
        .json()
        .await
        .map_err(|e| ChannelError::InvalidPayload(e.without_url().to_string()))?;

    match reply {
        ApiResponse { ok: true, result: Some(updates), .. } => Ok(updates),
        ApiResponse { description, .. } => Err(ChannelError::ConnectionLost(
            description.unwrap_or_else(|| "getUpdates returned ok=false".into()),
        )),
    }
}

/// Split text into pieces of at most `max_units` UTF-16 code units, the unit
/// Telegram measures length in. A character is never cut in two.
fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(2);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut units = 0;

    for c in text.chars() {
        let width = c.len_utf16();
        if units + width > max_units && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            units = 0;
        }
        current.push(c);
        units += width;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

// --- Bot API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    #[serde(default)]
    from: Option<TgUser>,
    chat: TgChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

impl Update {
    fn into_channel_message(self, channel_id: &ChannelId) -> Option<ChannelMessage> {
        let message = self.message?;
        let text = message.text?;

        let sender_id = message
            .from
            .as_ref()
            .map(|u| u.id)
            .unwrap_or(message.chat.id)
            .to_string();

        let mut metadata = serde_json::Map::new();
        metadata.insert("update_id".into(), serde_json::json!(self.update_id));
        if let Some(username) = message.from.as_ref().and_then(|u| u.username.clone()) {
            metadata.insert("username".into(), serde_json::json!(username));
        }

        Some(ChannelMessage {
            channel_id: channel_id.clone(),
            sender_id,
            sender_name: message.from.and_then(|u| u.first_name),
            content: text,
            chat_id: message.chat.id.to_string(),
            message_id: Some(message.message_id.to_string()),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TelegramConfig {
        TelegramConfig {
            bot_token: "test-token-123".into(),
            allowed_users: vec!["*".into()],
            poll_timeout_secs: 1,
            // Nothing listens here; polling fails fast and backs off.
            api_base: "http://127.0.0.1:9".into(),
        }
    }

    fn test_message(content: &str) -> ChannelMessage {
        ChannelMessage {
            channel_id: ChannelId("telegram".into()),
            sender_id: "user123".into(),
            sender_name: Some("Sara".into()),
            content: content.into(),
            chat_id: "chat456".into(),
            message_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn channel_name_and_id() {
        let ch = TelegramChannel::new(test_config());
        assert_eq!(ch.name(), "telegram");
        assert_eq!(ch.id().0, "telegram");
    }

    #[test]
    fn allowlist_wildcard() {
        let ch = TelegramChannel::new(test_config());
        assert!(ch.is_allowed("anyone"));
    }

    #[test]
    fn allowlist_specific() {
        let ch = TelegramChannel::new(TelegramConfig {
            allowed_users: vec!["111".into(), "222".into()],
            ..test_config()
        });
        assert!(ch.is_allowed("111"));
        assert!(ch.is_allowed("222"));
        assert!(!ch.is_allowed("333"));
    }

    #[test]
    fn allowlist_empty_denies() {
        let ch = TelegramChannel::new(TelegramConfig {
            allowed_users: vec![],
            ..test_config()
        });
        assert!(!ch.is_allowed("anyone"));
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("test-token-123"));
    }

    #[test]
    fn method_url_includes_token_and_method() {
        let ch = TelegramChannel::new(test_config());
        assert_eq!(
            ch.method_url("sendMessage"),
            "http://127.0.0.1:9/bottest-token-123/sendMessage"
        );
    }

    #[test]
    fn parse_text_update() {
        let data = r#"{
            "ok": true,
            "result": [{
                "update_id": 1001,
                "message": {
                    "message_id": 7,
                    "from": {"id": 555, "is_bot": false, "first_name": "Sara", "username": "sara_k"},
                    "chat": {"id": 555, "type": "private"},
                    "date": 1700000000,
                    "text": "سن 65"
                }
            }]
        }"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(data).unwrap();
        assert!(parsed.ok);
        let update = parsed.result.unwrap().into_iter().next().unwrap();
        let msg = update
            .into_channel_message(&ChannelId("telegram".into()))
            .unwrap();

        assert_eq!(msg.sender_id, "555");
        assert_eq!(msg.chat_id, "555");
        assert_eq!(msg.content, "سن 65");
        assert_eq!(msg.message_id.as_deref(), Some("7"));
        assert_eq!(msg.sender_name.as_deref(), Some("Sara"));
        assert_eq!(msg.metadata["username"], "sara_k");
    }

    #[test]
    fn non_text_updates_are_skipped() {
        let sticker = r#"{
            "update_id": 1002,
            "message": {"message_id": 8, "chat": {"id": 1, "type": "private"}, "sticker": {}}
        }"#;
        let update: Update = serde_json::from_str(sticker).unwrap();
        assert!(update.into_channel_message(&ChannelId("telegram".into())).is_none());

        let edited = r#"{"update_id": 1003, "edited_message": {}}"#;
        let update: Update = serde_json::from_str(edited).unwrap();
        assert!(update.into_channel_message(&ChannelId("telegram".into())).is_none());
    }

    #[test]
    fn error_reply_parses() {
        let data = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(data).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn long_messages_are_split_on_char_boundaries() {
        let text = "ب".repeat(10);
        let parts = split_message(&text, 4);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].chars().count(), 4);
        assert_eq!(parts[2].chars().count(), 2);
        assert_eq!(parts.concat(), text);

        assert_eq!(split_message("short", MAX_MESSAGE_UNITS), vec!["short".to_string()]);
    }

    #[test]
    fn split_counts_utf16_units_for_emoji() {
        // 3000 emoji fit under the char limit but take 6000 UTF-16 units
        let text = "😀".repeat(3000);
        let parts = split_message(&text, MAX_MESSAGE_UNITS);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.encode_utf16().count() <= MAX_MESSAGE_UNITS));
        assert_eq!(parts[0].chars().count(), 2048);
        assert_eq!(parts.concat(), text);

        // A surrogate pair that would straddle the limit moves to the next piece
        assert_eq!(split_message("ab😀", 3), vec!["ab".to_string(), "😀".to_string()]);
    }

    #[tokio::test]
    async fn start_and_inject() {
        let ch = TelegramChannel::new(test_config());
        let mut rx = ch.start().await.unwrap();

        ch.inject_message(test_message("Hello bot!")).await.unwrap();

        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.content, "Hello bot!");
        assert_eq!(received.sender_id, "user123");
        ch.stop().await.unwrap();
    }

    #[tokio::test]
    async fn empty_reply_is_rejected() {
        let ch = TelegramChannel::new(test_config());
        let err = ch.send("chat1", "  ", None).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn health_check_without_token() {
        let ch = TelegramChannel::new(TelegramConfig {
            bot_token: "".into(),
            ..test_config()
        });
        assert!(!ch.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn stop_channel() {
        let ch = TelegramChannel::new(test_config());
        let _rx = ch.start().await.unwrap();
        ch.stop().await.unwrap();
        // Inject should fail after stop
        assert!(ch.inject_message(test_message("test")).await.is_err());
    }
}
