//! Search engine facade
//!
//! Wires the repositories and services over one database and exposes the
//! operations the dispatcher and CLI drive: ingestion, membership updates,
//! search, deletion and chat toggling.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::chat::{ChatRepository, ToggleOutcome};
use crate::domain::format::{ResultFormatter, SearchResponse};
use crate::domain::membership::{MembershipRegistry, StatusChange};
use crate::domain::message::{MessageStore, NewMessage, UpsertOutcome};
use crate::domain::moderation::{
    AdminCache, DeleteOutcome, DeleteRequest, DeletionGuard, PrivilegeFetcher,
};
use crate::domain::search::{SearchOutcome, SearchService};
use crate::error::Result;
use crate::events::{ChatRef, IncomingMessage, MemberUpdate};
use crate::storage::Database;

/// Why an incoming message was not indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PrivateChat,
    OwnInlineResult,
    EmptyText,
    ChatNotEnabled,
}

/// Result of ingesting one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum IngestOutcome {
    Skipped(SkipReason),
    Stored,
    EditIgnored,
}

/// Reply to a chat enable/disable command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleReply {
    Enabled,
    Disabled,
    AlreadyEnabled,
    AlreadyDisabled,
}

impl ToggleReply {
    fn from_outcome(outcome: ToggleOutcome, enable: bool) -> Self {
        match (outcome, enable) {
            (ToggleOutcome::Unchanged, true) => Self::AlreadyEnabled,
            (ToggleOutcome::Unchanged, false) => Self::AlreadyDisabled,
            (_, true) => Self::Enabled,
            (_, false) => Self::Disabled,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::Enabled => "This chat is enabled",
            Self::Disabled => "This chat is disabled",
            Self::AlreadyEnabled => "This chat is already enabled",
            Self::AlreadyDisabled => "This chat is already disabled",
        }
    }
}

/// Every core component over one store
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    chats: ChatRepository,
    registry: MembershipRegistry,
    store: MessageStore,
    search: SearchService,
    formatter: ResultFormatter,
    admins: AdminCache,
    guard: DeletionGuard,
    self_id: Option<i64>,
    reply_ttl: Duration,
}

impl Engine {
    pub fn new(config: &Config, db: Database, fetcher: Arc<dyn PrivilegeFetcher>) -> Result<Self> {
        let pool = db.pool().clone();
        let chats = ChatRepository::new(pool.clone());
        let registry = MembershipRegistry::new(pool.clone());
        let store = MessageStore::new(pool).with_edit_window(config.ingest.edit_window());
        let search = SearchService::new(registry.clone(), store.clone())
            .with_page_size(config.search.page_size);
        let formatter = ResultFormatter::from_config(config)?;
        let admins = AdminCache::new(fetcher);
        let guard = DeletionGuard::new(
            chats.clone(),
            registry.clone(),
            store.clone(),
            admins.clone(),
            formatter.links().clone(),
        );

        Ok(Self {
            db,
            chats,
            registry,
            store,
            search,
            formatter,
            admins,
            guard,
            self_id: config.ingest.self_id,
            reply_ttl: config.moderation.reply_ttl(),
        })
    }

    /// How long command replies stay up before they are removed
    pub fn reply_ttl(&self) -> Duration {
        self.reply_ttl
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn chats(&self) -> &ChatRepository {
        &self.chats
    }

    pub fn registry(&self) -> &MembershipRegistry {
        &self.registry
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn admins(&self) -> &AdminCache {
        &self.admins
    }

    pub fn formatter(&self) -> &ResultFormatter {
        &self.formatter
    }

    /// Index a message observed in a chat.
    ///
    /// The sender is recorded as a member before the text is stored.
    pub async fn ingest(&self, message: &IncomingMessage) -> Result<IngestOutcome> {
        if let Some(reason) = self.skip_reason(message).await? {
            debug!(
                chat_id = message.chat.id,
                msg_id = message.message_id,
                ?reason,
                "Message not indexed"
            );
            return Ok(IngestOutcome::Skipped(reason));
        }

        self.registry.observe(&message.sender).await?;
        self.registry
            .record_join_or_post(message.chat.id, message.sender.id)
            .await?;

        let mut record = NewMessage::new(
            message.chat.id,
            message.sender.id,
            message.message_id,
            message.text.clone(),
            message.date,
        );
        record.edited_at = message.edit_date;

        Ok(match self.store.upsert(&record).await? {
            UpsertOutcome::Stored => IngestOutcome::Stored,
            UpsertOutcome::EditIgnored => IngestOutcome::EditIgnored,
        })
    }

    async fn skip_reason(&self, message: &IncomingMessage) -> Result<Option<SkipReason>> {
        if message.chat.kind.is_private() {
            return Ok(Some(SkipReason::PrivateChat));
        }
        if self.self_id.is_some() && message.via_bot == self.self_id {
            return Ok(Some(SkipReason::OwnInlineResult));
        }
        if message.text.is_empty() {
            return Ok(Some(SkipReason::EmptyText));
        }
        if !self.chats.is_enabled(message.chat.id).await? {
            return Ok(Some(SkipReason::ChatNotEnabled));
        }
        Ok(None)
    }

    /// Apply a membership-status change. Returns `None` for untracked chats.
    pub async fn member_update(&self, update: &MemberUpdate) -> Result<Option<StatusChange>> {
        if !self.chats.is_enabled(update.chat.id).await? {
            return Ok(None);
        }

        let change = self
            .registry
            .apply_status_change(update.chat.id, &update.user, update.old, update.new)
            .await?;
        if let Some(effect) = change.admin {
            self.admins
                .rebuild(update.chat.id, update.user.id, effect)
                .await;
        }
        Ok(Some(change))
    }

    pub async fn search_outcome(&self, requester: i64, query: &str) -> Result<SearchOutcome> {
        self.search.search(requester, query).await
    }

    /// Search and render the response cards
    pub async fn search(&self, requester: i64, query: &str) -> Result<SearchResponse> {
        let outcome = self.search_outcome(requester, query).await?;
        Ok(self.formatter.render(&outcome))
    }

    pub async fn delete(&self, request: &DeleteRequest) -> Result<DeleteOutcome> {
        self.guard.handle(request).await
    }

    /// Enable or disable a chat on behalf of `requester`.
    ///
    /// Returns `None` when the command is ignored: private chats and non-admins.
    pub async fn toggle_chat(
        &self,
        chat: &ChatRef,
        requester: i64,
        enable: bool,
    ) -> Result<Option<ToggleReply>> {
        if chat.kind.is_private() {
            return Ok(None);
        }
        if !self.admins.is_admin(chat.id, requester).await? {
            debug!(chat_id = chat.id, requester, "Toggle from non-admin ignored");
            return Ok(None);
        }

        let outcome = self.chats.set_enabled(chat.id, &chat.title, enable).await?;
        info!(chat_id = chat.id, requester, enable, ?outcome, "Chat toggled");
        Ok(Some(ToggleReply::from_outcome(outcome, enable)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatKind;
    use crate::domain::format::Card;
    use crate::domain::membership::{MemberStatus, PeerProfile};
    use crate::domain::moderation::StaticPrivileges;

    const CHAT: i64 = -1001234;
    const SELF_BOT: i64 = 999;

    async fn engine() -> Engine {
        let mut config = Config::default();
        config.ingest.self_id = Some(SELF_BOT);
        let db = Database::in_memory().await.unwrap();
        let engine = Engine::new(
            &config,
            db,
            Arc::new(StaticPrivileges::new().with_admin(CHAT, 100)),
        )
        .unwrap();
        engine.chats().upsert(CHAT, "General", true).await.unwrap();
        engine
    }

    fn group() -> ChatRef {
        ChatRef::new(CHAT, ChatKind::Supergroup, "General")
    }

    fn message(id: i64, text: &str) -> IncomingMessage {
        IncomingMessage::new(group(), PeerProfile::new(1, "Ada"), id, text, 1_000)
    }

    #[tokio::test]
    async fn test_ingest_records_peer_membership_and_text() {
        let engine = engine().await;
        assert_eq!(
            engine.ingest(&message(1, "hello")).await.unwrap(),
            IngestOutcome::Stored
        );
        assert!(engine.registry().is_member(CHAT, 1).await.unwrap());
        assert_eq!(engine.store().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_skips() {
        let engine = engine().await;

        let mut private = message(1, "hi");
        private.chat.kind = ChatKind::Private;
        assert_eq!(
            engine.ingest(&private).await.unwrap(),
            IngestOutcome::Skipped(SkipReason::PrivateChat)
        );
        assert_eq!(
            engine.ingest(&message(2, "card").via(SELF_BOT)).await.unwrap(),
            IngestOutcome::Skipped(SkipReason::OwnInlineResult)
        );
        assert_eq!(
            engine.ingest(&message(3, "")).await.unwrap(),
            IngestOutcome::Skipped(SkipReason::EmptyText)
        );

        let mut elsewhere = message(4, "hi");
        elsewhere.chat.id = -1005555;
        assert_eq!(
            engine.ingest(&elsewhere).await.unwrap(),
            IngestOutcome::Skipped(SkipReason::ChatNotEnabled)
        );

        assert_eq!(engine.store().count().await.unwrap(), 0);
        assert!(!engine.registry().is_member(CHAT, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_late_edit_ignored() {
        let engine = engine().await;
        engine.ingest(&message(1, "first")).await.unwrap();
        let late = message(1, "second").edited_at(1_000 + 48 * 3600 + 1);
        assert_eq!(engine.ingest(&late).await.unwrap(), IngestOutcome::EditIgnored);
    }

    #[tokio::test]
    async fn test_member_update_rebuilds_admins() {
        let engine = engine().await;
        let update = MemberUpdate {
            chat: group(),
            user: PeerProfile::new(5, "Eve"),
            old: MemberStatus::Member,
            new: MemberStatus::Administrator,
        };
        let change = engine.member_update(&update).await.unwrap().unwrap();
        assert!(change.admin.is_some());
        assert!(engine.admins().is_admin(CHAT, 5).await.unwrap());

        let mut untracked = update.clone();
        untracked.chat.id = -1007777;
        assert_eq!(engine.member_update(&untracked).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_toggle_requires_admin() {
        let engine = engine().await;
        let chat = ChatRef::new(-1004321, ChatKind::Group, "New");

        assert_eq!(engine.toggle_chat(&chat, 1, true).await.unwrap(), None);

        let admin_chat = ChatRef::new(CHAT, ChatKind::Supergroup, "General");
        assert_eq!(
            engine.toggle_chat(&admin_chat, 100, true).await.unwrap(),
            Some(ToggleReply::AlreadyEnabled)
        );
        assert_eq!(
            engine.toggle_chat(&admin_chat, 100, false).await.unwrap(),
            Some(ToggleReply::Disabled)
        );
        assert_eq!(ToggleReply::Disabled.text(), "This chat is disabled");
    }

    #[tokio::test]
    async fn test_search_renders_cards() {
        let engine = engine().await;
        engine.ingest(&message(1, "hello world")).await.unwrap();

        let response = engine.search(1, "world").await.unwrap();
        assert_eq!(response.cards.len(), 2);
        assert!(matches!(&response.cards[1], Card::Hit { id, .. } if id == "-1001234_1"));

        let response = engine.search(2, "world").await.unwrap();
        assert!(matches!(&response.cards[0], Card::Sticker { .. }));
    }

    #[tokio::test]
    async fn test_reply_ttl_from_config() {
        assert_eq!(engine().await.reply_ttl(), Duration::from_secs(10));

        let mut config = Config::default();
        config.moderation.reply_ttl_secs = 30;
        let db = Database::in_memory().await.unwrap();
        let engine = Engine::new(&config, db, Arc::new(StaticPrivileges::new())).unwrap();
        assert_eq!(engine.reply_ttl(), Duration::from_secs(30));
    }
}
