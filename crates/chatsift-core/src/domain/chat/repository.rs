//! Chat repository
//!
//! Chats are created by the first enable/disable action and never hard-deleted.

use sqlx::SqlitePool;
use tracing::info;

use super::entity::Chat;
use crate::error::{Error, Result};

/// Result of toggling a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The chat was not tracked before
    Created,
    /// The enabled flag flipped
    Changed,
    /// The chat was already in the requested state
    Unchanged,
}

/// Repository for chat rows
#[derive(Debug, Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a chat by id
    pub async fn get(&self, id: i64) -> Result<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>("SELECT id, title, enabled FROM chat WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chat)
    }

    /// Whether the chat is tracked and enabled
    pub async fn is_enabled(&self, id: i64) -> Result<bool> {
        Ok(self.get(id).await?.is_some_and(|c| c.enabled))
    }

    /// Insert or overwrite a chat row
    pub async fn upsert(&self, id: i64, title: &str, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat (id, title, enabled) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                enabled = excluded.enabled
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(enabled)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;
        Ok(())
    }

    /// Enable or disable a chat, creating it on first use
    pub async fn set_enabled(&self, id: i64, title: &str, enabled: bool) -> Result<ToggleOutcome> {
        let outcome = match self.get(id).await? {
            None => ToggleOutcome::Created,
            Some(chat) if chat.enabled != enabled => ToggleOutcome::Changed,
            Some(_) => ToggleOutcome::Unchanged,
        };

        if outcome != ToggleOutcome::Unchanged {
            self.upsert(id, title, enabled).await?;
            info!(chat_id = id, enabled, ?outcome, "Chat tracking updated");
        }

        Ok(outcome)
    }

    /// List all tracked chats
    pub async fn list(&self) -> Result<Vec<Chat>> {
        let chats = sqlx::query_as::<_, Chat>("SELECT id, title, enabled FROM chat ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn repo() -> ChatRepository {
        let db = Database::in_memory().await.unwrap();
        ChatRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_get_missing_chat() {
        let repo = repo().await;
        assert!(repo.get(-100123).await.unwrap().is_none());
        assert!(!repo.is_enabled(-100123).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_enabled_transitions() {
        let repo = repo().await;

        assert_eq!(
            repo.set_enabled(-1001, "Rustaceans", true).await.unwrap(),
            ToggleOutcome::Created
        );
        assert_eq!(
            repo.set_enabled(-1001, "Rustaceans", true).await.unwrap(),
            ToggleOutcome::Unchanged
        );
        assert_eq!(
            repo.set_enabled(-1001, "Rustaceans", false).await.unwrap(),
            ToggleOutcome::Changed
        );

        let chat = repo.get(-1001).await.unwrap().unwrap();
        assert_eq!(chat, Chat::new(-1001, "Rustaceans", false));
    }

    #[tokio::test]
    async fn test_disable_keeps_row() {
        let repo = repo().await;
        repo.set_enabled(-1002, "Quiet", true).await.unwrap();
        repo.set_enabled(-1002, "Quiet", false).await.unwrap();

        let chats = repo.list().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert!(!chats[0].enabled);
    }
}
