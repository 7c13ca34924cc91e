//! Event dispatcher
//!
//! A single task drains the event channel and routes each event to the engine,
//! so events are handled strictly one at a time. Failures are logged and the
//! event is dropped; the loop only stops on shutdown or when every sender is gone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::format::SearchResponse;
use crate::domain::moderation::DeleteRequest;
use crate::engine::Engine;
use crate::error::Result;
use crate::events::{Command, Event, IncomingMessage, SearchRequest};

/// Default capacity of the event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Outbound side of the chat platform
#[async_trait]
pub trait Transport: Send + Sync {
    async fn answer_search(&self, query_id: &str, response: &SearchResponse) -> Result<()>;

    /// Reply to a message, returning the id of the reply
    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<i64>;

    async fn delete_message(&self, chat_id: i64, msg_id: i64) -> Result<()>;
}

/// Create the bounded event channel feeding a dispatcher
pub fn channel(capacity: usize) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
    mpsc::channel(capacity)
}

/// Routes inbound events to the engine and answers through the transport
pub struct Dispatcher {
    engine: Arc<Engine>,
    transport: Arc<dyn Transport>,
    events: mpsc::Receiver<Event>,
    shutdown: CancellationToken,
    reply_ttl: Duration,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<Engine>,
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<Event>,
        shutdown: CancellationToken,
    ) -> Self {
        let reply_ttl = engine.reply_ttl();
        Self {
            engine,
            transport,
            events,
            shutdown,
            reply_ttl,
        }
    }

    /// Override the reply lifetime taken from the engine's config
    pub fn with_reply_ttl(mut self, reply_ttl: Duration) -> Self {
        self.reply_ttl = reply_ttl;
        self
    }

    /// Run until cancelled or until the channel closes
    pub async fn run(mut self) {
        info!("Dispatcher started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Dispatcher shutting down");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                },
            }
        }
    }

    async fn dispatch(&self, event: Event) {
        let result = match event {
            Event::Message(message) => self.on_message(&message).await,
            Event::MemberUpdate(update) => self.engine.member_update(&update).await.map(|_| ()),
            Event::Search(request) => self.on_search(&request).await,
        };

        match result {
            Err(e) if e.is_transient() => warn!(code = e.code(), error = %e, "Event dropped"),
            Err(e) => error!(code = e.code(), error = %e, "Event failed"),
            Ok(()) => {}
        }
    }

    async fn on_message(&self, message: &IncomingMessage) -> Result<()> {
        match message.command() {
            Some(Command::Delete) => self.on_delete(message).await,
            Some(command @ (Command::Start | Command::Stop)) => {
                let enable = command == Command::Start;
                let reply = self
                    .engine
                    .toggle_chat(&message.chat, message.sender.id, enable)
                    .await?;
                if let Some(reply) = reply {
                    self.transport
                        .reply(message.chat.id, message.message_id, reply.text())
                        .await?;
                }
                Ok(())
            }
            None => {
                let outcome = self.engine.ingest(message).await?;
                debug!(
                    chat_id = message.chat.id,
                    msg_id = message.message_id,
                    ?outcome,
                    "Message handled"
                );
                Ok(())
            }
        }
    }

    async fn on_delete(&self, message: &IncomingMessage) -> Result<()> {
        let request = DeleteRequest {
            chat_id: message.chat.id,
            chat_kind: message.chat.kind,
            requester: message.sender.id,
            text: message.text.clone(),
        };
        let outcome = self.engine.delete(&request).await?;
        debug!(chat_id = message.chat.id, ?outcome, "Delete command handled");

        if let Some(text) = outcome.reply_text() {
            let reply_id = self
                .transport
                .reply(message.chat.id, message.message_id, text)
                .await?;
            self.expire_later(message.chat.id, reply_id);
        }
        Ok(())
    }

    async fn on_search(&self, request: &SearchRequest) -> Result<()> {
        let response = self.engine.search(request.from.id, &request.query).await?;
        self.transport
            .answer_search(&request.query_id, &response)
            .await
    }

    /// Delete a reply once its lifetime is over, unless shutdown comes first
    fn expire_later(&self, chat_id: i64, msg_id: i64) {
        let transport = Arc::clone(&self.transport);
        let shutdown = self.shutdown.clone();
        let ttl = self.reply_ttl;

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(ttl) => {
                    if let Err(e) = transport.delete_message(chat_id, msg_id).await {
                        warn!(chat_id, msg_id, error = %e, "Failed to remove expired reply");
                    }
                }
            }
        });
    }
}
