//! Deletion guard
//!
//! Decides whether a delete command referencing a message link may remove that
//! message from search. Only the author or a chat admin may do so.
//!
//! A message that is already soft-deleted answers `NotFound` to everyone, so a
//! repeated command never reveals whether a hidden message exists.

use serde::Serialize;
use tracing::{debug, info};

use super::admin_cache::AdminCache;
use crate::domain::chat::{ChatKind, ChatRepository};
use crate::domain::format::LinkCodec;
use crate::domain::membership::MembershipRegistry;
use crate::domain::message::MessageStore;
use crate::error::Result;

pub const REPLY_NOT_FOUND: &str = "Message not found";
pub const REPLY_UNAUTHORIZED: &str = "Unauthorized";
pub const REPLY_DELETED: &str = "Message deleted";

/// Why a delete command was silently ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    PrivateChat,
    ChatNotEnabled,
    NoLink,
    ForeignChat,
    NotMember,
}

/// Result of a delete command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Ignored(IgnoreReason),
    NotFound,
    Unauthorized,
    Deleted,
}

impl DeleteOutcome {
    /// Reply to post back in the chat, if any
    pub fn reply_text(&self) -> Option<&'static str> {
        match self {
            Self::Ignored(_) => None,
            Self::NotFound => Some(REPLY_NOT_FOUND),
            Self::Unauthorized => Some(REPLY_UNAUTHORIZED),
            Self::Deleted => Some(REPLY_DELETED),
        }
    }
}

/// A delete command as received in a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub requester: i64,
    /// Full command text, expected to contain a message link
    pub text: String,
}

/// Authorization guard for delete commands
#[derive(Debug, Clone)]
pub struct DeletionGuard {
    chats: ChatRepository,
    registry: MembershipRegistry,
    store: MessageStore,
    admins: AdminCache,
    links: LinkCodec,
}

impl DeletionGuard {
    pub fn new(
        chats: ChatRepository,
        registry: MembershipRegistry,
        store: MessageStore,
        admins: AdminCache,
        links: LinkCodec,
    ) -> Self {
        Self {
            chats,
            registry,
            store,
            admins,
            links,
        }
    }

    pub async fn handle(&self, request: &DeleteRequest) -> Result<DeleteOutcome> {
        if request.chat_kind.is_private() {
            return Ok(DeleteOutcome::Ignored(IgnoreReason::PrivateChat));
        }
        if !self.chats.is_enabled(request.chat_id).await? {
            return Ok(DeleteOutcome::Ignored(IgnoreReason::ChatNotEnabled));
        }

        let Some(link) = self.links.parse(&request.text) else {
            return Ok(DeleteOutcome::Ignored(IgnoreReason::NoLink));
        };
        if link.chat_id != request.chat_id {
            debug!(
                chat_id = request.chat_id,
                link_chat = link.chat_id,
                "Delete link points at another chat"
            );
            return Ok(DeleteOutcome::Ignored(IgnoreReason::ForeignChat));
        }
        if !self
            .registry
            .is_member(request.chat_id, request.requester)
            .await?
        {
            return Ok(DeleteOutcome::Ignored(IgnoreReason::NotMember));
        }

        let message = match self.store.get(link.chat_id, link.msg_id).await? {
            Some(message) if !message.deleted => message,
            _ => return Ok(DeleteOutcome::NotFound),
        };

        let authorized = message.from_id == request.requester
            || self
                .admins
                .is_admin(request.chat_id, request.requester)
                .await?;
        if !authorized {
            return Ok(DeleteOutcome::Unauthorized);
        }

        self.store.soft_delete(link.chat_id, link.msg_id).await?;
        info!(
            chat_id = link.chat_id,
            msg_id = link.msg_id,
            requester = request.requester,
            "Message removed from search"
        );
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::message::NewMessage;
    use crate::domain::moderation::StaticPrivileges;
    use crate::storage::Database;

    const CHAT: i64 = -1001234;
    const AUTHOR: i64 = 1;
    const OTHER: i64 = 2;
    const ADMIN: i64 = 3;
    const LINK: &str = "/dlog https://t.me/c/1234/10";

    async fn setup() -> (DeletionGuard, MessageStore) {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool().clone();
        let chats = ChatRepository::new(pool.clone());
        chats.upsert(CHAT, "General", true).await.unwrap();
        chats.upsert(-1005678, "Elsewhere", true).await.unwrap();

        let registry = MembershipRegistry::new(pool.clone());
        for (id, name) in [(AUTHOR, "Author"), (OTHER, "Other"), (ADMIN, "Admin")] {
            registry.upsert_peer(id, name, "").await.unwrap();
            registry.record_join_or_post(CHAT, id).await.unwrap();
        }

        let store = MessageStore::new(pool);
        store
            .upsert(&NewMessage::new(CHAT, AUTHOR, 10, "oops", 100))
            .await
            .unwrap();

        let admins = AdminCache::new(Arc::new(StaticPrivileges::new().with_admin(CHAT, ADMIN)));
        let guard = DeletionGuard::new(
            chats,
            registry,
            store.clone(),
            admins,
            LinkCodec::new("https://t.me").unwrap(),
        );
        (guard, store)
    }

    fn request(requester: i64, text: &str) -> DeleteRequest {
        DeleteRequest {
            chat_id: CHAT,
            chat_kind: ChatKind::Supergroup,
            requester,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_author_may_delete() {
        let (guard, store) = setup().await;
        let outcome = guard.handle(&request(AUTHOR, LINK)).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(outcome.reply_text(), Some("Message deleted"));
        assert!(store.get(CHAT, 10).await.unwrap().unwrap().deleted);

        // a second request finds nothing left to delete
        assert_eq!(
            guard.handle(&request(AUTHOR, LINK)).await.unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_admin_may_delete() {
        let (guard, _) = setup().await;
        assert_eq!(
            guard.handle(&request(ADMIN, LINK)).await.unwrap(),
            DeleteOutcome::Deleted
        );
    }

    #[tokio::test]
    async fn test_other_member_unauthorized() {
        let (guard, store) = setup().await;
        let outcome = guard.handle(&request(OTHER, LINK)).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Unauthorized);
        assert_eq!(outcome.reply_text(), Some("Unauthorized"));
        assert!(!store.get(CHAT, 10).await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn test_missing_message() {
        let (guard, _) = setup().await;
        let outcome = guard
            .handle(&request(AUTHOR, "/dlog https://t.me/c/1234/99"))
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(outcome.reply_text(), Some("Message not found"));
    }

    #[tokio::test]
    async fn test_silently_ignored() {
        let (guard, _) = setup().await;

        let mut private = request(AUTHOR, LINK);
        private.chat_kind = ChatKind::Private;
        assert_eq!(
            guard.handle(&private).await.unwrap(),
            DeleteOutcome::Ignored(IgnoreReason::PrivateChat)
        );

        let mut unknown = request(AUTHOR, LINK);
        unknown.chat_id = -1009999;
        assert_eq!(
            guard.handle(&unknown).await.unwrap(),
            DeleteOutcome::Ignored(IgnoreReason::ChatNotEnabled)
        );

        assert_eq!(
            guard.handle(&request(AUTHOR, "/dlog")).await.unwrap(),
            DeleteOutcome::Ignored(IgnoreReason::NoLink)
        );
        assert_eq!(
            guard
                .handle(&request(AUTHOR, "/dlog https://t.me/c/5678/10"))
                .await
                .unwrap(),
            DeleteOutcome::Ignored(IgnoreReason::ForeignChat)
        );

        let outcome = guard.handle(&request(42, LINK)).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Ignored(IgnoreReason::NotMember));
        assert_eq!(outcome.reply_text(), None);
    }
}
