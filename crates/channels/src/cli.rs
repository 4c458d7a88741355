//! CLI channel: interactive terminal-based chat.
//!
//! Reads lines from stdin and writes replies to stdout. Used by
//! `pocketmed chat` to talk to the assistant without Telegram.

use async_trait::async_trait;
use pocketmed_core::channel::{Channel, ChannelId, ChannelMessage};
use pocketmed_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// The single local user every CLI message is attributed to.
pub const CLI_SENDER: &str = "local_user";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }

    fn is_exit(line: &str) -> bool {
        matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
    }

    fn to_message(channel_id: &ChannelId, line: String) -> ChannelMessage {
        ChannelMessage {
            channel_id: channel_id.clone(),
            sender_id: CLI_SENDER.into(),
            sender_name: Some("User".into()),
            content: line,
            chat_id: "cli_session".into(),
            message_id: None,
            metadata: serde_json::Map::new(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(io::stdin());
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if Self::is_exit(&line) {
                            break;
                        }

                        if tx.send(Ok(Self::to_message(&channel_id, line))).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        println!();
        for line in content.lines() {
            println!("  PocketMed > {line}");
        }
        println!();
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}
