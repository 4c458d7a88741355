//! Runtime: pumps inbound chat events through the conversation handler.
//!
//! Every user gets an ordered lane, a worker task fed by its own queue.
//! One user's events are handled strictly one after another; different users
//! never wait on each other. A lane that stays idle shuts down and is
//! reopened on the user's next message.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pocketmed_channels::ChannelRegistry;
use pocketmed_core::channel::ChannelMessage;
use pocketmed_core::error::ChannelError;
use pocketmed_core::store::UserId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::Action;
use crate::handler::ConversationHandler;

const DEFAULT_LANE_IDLE: Duration = Duration::from_secs(600);

/// One inbound message plus the registry name of the channel it came from.
#[derive(Debug)]
struct Event {
    channel: String,
    message: ChannelMessage,
}

struct Lane {
    tx: mpsc::UnboundedSender<Event>,
    worker: JoinHandle<()>,
}

/// Turns one event into at most one reply on the originating channel.
struct Dispatcher {
    registry: Arc<ChannelRegistry>,
    handler: Arc<ConversationHandler>,
    reply_threading: bool,
}

impl Dispatcher {
    async fn dispatch(&self, user: &UserId, event: Event) {
        let Event { channel, message } = event;

        let content = message.content.trim();
        if content.is_empty() {
            debug!(user = %user, "Skipping empty message");
            return;
        }

        let reply = match message.command() {
            Some("start") => self.handler.greeting(),
            Some(command) => {
                debug!(user = %user, command, "Ignoring unknown command");
                return;
            }
            None => {
                let action = self.handler.classify(content);
                if matches!(action, Ok(Action::Question(_))) {
                    if let Err(e) = self.registry.typing_on(&channel, &message.chat_id).await {
                        debug!(channel = %channel, error = %e, "Typing indicator failed");
                    }
                }
                self.handler.handle_action(user, action).await
            }
        };

        let reply_to = if self.reply_threading {
            message.message_id.as_deref()
        } else {
            None
        };

        match self
            .registry
            .send_to(&channel, &message.chat_id, &reply.text, reply_to)
            .await
        {
            Ok(()) => debug!(user = %user, kind = ?reply.kind, reply_len = reply.text.len(), "Replied"),
            Err(e) => warn!(user = %user, channel = %channel, error = %e, "Failed to deliver reply"),
        }
    }
}

pub struct Runtime {
    registry: Arc<ChannelRegistry>,
    handler: Arc<ConversationHandler>,
    reply_threading: bool,
    lane_idle: Duration,
}

impl Runtime {
    pub fn new(registry: Arc<ChannelRegistry>, handler: Arc<ConversationHandler>) -> Self {
        Self {
            registry,
            handler,
            reply_threading: false,
            lane_idle: DEFAULT_LANE_IDLE,
        }
    }

    /// Quote the user's message when replying, on channels that support it.
    pub fn with_reply_threading(mut self, enabled: bool) -> Self {
        self.reply_threading = enabled;
        self
    }

    /// How long a user's lane may sit empty before its worker exits.
    pub fn with_lane_idle(mut self, idle: Duration) -> Self {
        self.lane_idle = idle.max(Duration::from_millis(1));
        self
    }

    /// Start every registered channel and serve until all streams close or
    /// `shutdown` resolves. Queued events are finished before returning.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), ChannelError> {
        let dispatcher = Arc::new(Dispatcher {
            registry: self.registry.clone(),
            handler: self.handler.clone(),
            reply_threading: self.reply_threading,
        });
        let mut inbound = self.registry.start_all().await?;
        let mut lanes: HashMap<UserId, Lane> = HashMap::new();
        let mut sweep = tokio::time::interval(self.lane_idle);

        info!(channels = ?self.registry.list(), "PocketMed runtime started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = inbound.recv() => match next {
                    Some((channel, Ok(message))) => {
                        self.route(&dispatcher, &mut lanes, channel, message);
                    }
                    Some((channel, Err(e))) => {
                        warn!(channel = %channel, error = %e, "Channel error");
                    }
                    None => {
                        info!("All channel streams closed");
                        break;
                    }
                },
                _ = sweep.tick() => {
                    lanes.retain(|_, lane| !lane.worker.is_finished());
                }
            }
        }

        // Dropping the senders lets each worker drain its queue and exit
        let workers: Vec<_> = lanes.into_values().map(|lane| lane.worker).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Lane worker failed");
            }
        }

        self.registry.stop_all().await;
        info!("PocketMed runtime stopped");
        Ok(())
    }

    fn route(
        &self,
        dispatcher: &Arc<Dispatcher>,
        lanes: &mut HashMap<UserId, Lane>,
        channel: String,
        message: ChannelMessage,
    ) {
        if !self.registry.is_allowed(&channel, &message.sender_id) {
            warn!(channel = %channel, sender_id = %message.sender_id, "Dropping message from unauthorized sender");
            return;
        }

        let user = UserId::scoped(&channel, &message.sender_id);
        let mut event = Event { channel, message };
        let mut previous = None;

        if let Some(lane) = lanes.remove(&user) {
            match lane.tx.send(event) {
                Ok(()) => {
                    lanes.insert(user, lane);
                    return;
                }
                // The worker went idle; the new lane waits for it to finish
                Err(mpsc::error::SendError(returned)) => {
                    event = returned;
                    previous = Some(lane.worker);
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }

        debug!(user = %user, "Opening lane");
        let worker = tokio::spawn(run_lane(
            user.clone(),
            rx,
            dispatcher.clone(),
            self.lane_idle,
            previous,
        ));
        lanes.insert(user, Lane { tx, worker });
    }
}

async fn run_lane(
    user: UserId,
    mut rx: mpsc::UnboundedReceiver<Event>,
    dispatcher: Arc<Dispatcher>,
    idle: Duration,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(event)) => dispatcher.dispatch(&user, event).await,
            Ok(None) => break,
            Err(_) => {
                // Refuse new events, then finish what was already queued
                rx.close();
                while let Some(event) = rx.recv().await {
                    dispatcher.dispatch(&user, event).await;
                }
                debug!(user = %user, "Lane idle, closing");
                break;
            }
        }
    }
}
