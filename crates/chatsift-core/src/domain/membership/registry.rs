//! Membership registry
//!
//! Owns the `peer` and `membership` tables. Membership is best-effort: a peer that
//! was active before tracking began, or whose leave event was missed, is never
//! reconciled.

use std::collections::BTreeSet;

use sqlx::SqlitePool;
use tracing::debug;

use super::entity::{MemberStatus, MembershipEffect, Peer, PeerProfile, StatusChange};
use crate::error::{Error, Result};

/// Registry of peers and their chat memberships
#[derive(Debug, Clone)]
pub struct MembershipRegistry {
    pool: SqlitePool,
}

impl MembershipRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a peer
    pub async fn upsert_peer(&self, id: i64, full_name: &str, username: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO peer (id, full_name, username) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                username = excluded.username
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;
        Ok(())
    }

    /// Upsert a peer from an event profile
    pub async fn observe(&self, profile: &PeerProfile) -> Result<()> {
        self.upsert_peer(profile.id, &profile.full_name(), profile.username())
            .await
    }

    pub async fn get_peer(&self, id: i64) -> Result<Option<Peer>> {
        let peer = sqlx::query_as::<_, Peer>("SELECT id, full_name, username FROM peer WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(peer)
    }

    /// Ensure a membership row exists. Returns true when a row was inserted.
    pub async fn record_join_or_post(&self, chat_id: i64, peer_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO membership (chat_id, peer_id) VALUES (?, ?)
            ON CONFLICT(chat_id, peer_id) DO NOTHING
            "#,
        )
        .bind(chat_id)
        .bind(peer_id)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(chat_id, peer_id, "Membership recorded");
        }
        Ok(inserted)
    }

    /// Remove a membership row if present. Returns true when a row was removed.
    pub async fn record_leave(&self, chat_id: i64, peer_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM membership WHERE chat_id = ? AND peer_id = ?")
            .bind(chat_id)
            .bind(peer_id)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        let removed = result.rows_affected() > 0;
        if removed {
            debug!(chat_id, peer_id, "Membership removed");
        }
        Ok(removed)
    }

    pub async fn is_member(&self, chat_id: i64, peer_id: i64) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM membership WHERE chat_id = ? AND peer_id = ?")
                .bind(chat_id)
                .bind(peer_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// All chats the peer is believed to participate in
    pub async fn memberships_of(&self, peer_id: i64) -> Result<BTreeSet<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT chat_id FROM membership WHERE peer_id = ?")
            .bind(peer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Chats the peer may search: memberships in enabled chats only
    pub async fn search_scope(&self, peer_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT membership.chat_id
            FROM membership
            INNER JOIN chat ON chat.id = membership.chat_id
            WHERE membership.peer_id = ? AND chat.enabled = 1
            ORDER BY membership.chat_id
            "#,
        )
        .bind(peer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Peers currently recorded as members of a chat
    pub async fn members_of(&self, chat_id: i64) -> Result<Vec<Peer>> {
        let peers = sqlx::query_as::<_, Peer>(
            r#"
            SELECT peer.id, peer.full_name, peer.username
            FROM membership
            INNER JOIN peer ON peer.id = membership.peer_id
            WHERE membership.chat_id = ?
            ORDER BY peer.id
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(peers)
    }

    /// Apply a membership-status change event and report what it meant.
    ///
    /// Admin effects are returned to the caller, which owns the admin cache.
    pub async fn apply_status_change(
        &self,
        chat_id: i64,
        profile: &PeerProfile,
        old: MemberStatus,
        new: MemberStatus,
    ) -> Result<StatusChange> {
        let change = StatusChange::classify(old, new);

        match change.membership {
            Some(MembershipEffect::Joined) => {
                self.observe(profile).await?;
                self.record_join_or_post(chat_id, profile.id).await?;
            }
            Some(MembershipEffect::Left) => {
                self.record_leave(chat_id, profile.id).await?;
            }
            None => {}
        }

        debug!(
            chat_id,
            peer_id = profile.id,
            old = old.as_str(),
            new = new.as_str(),
            ?change,
            "Member status change applied"
        );

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatRepository;
    use crate::storage::Database;

    async fn setup() -> (MembershipRegistry, ChatRepository) {
        let db = Database::in_memory().await.unwrap();
        let chats = ChatRepository::new(db.pool().clone());
        chats.upsert(-1001, "General", true).await.unwrap();
        chats.upsert(-1002, "Archive", false).await.unwrap();
        (MembershipRegistry::new(db.pool().clone()), chats)
    }

    #[tokio::test]
    async fn test_upsert_peer_updates_names() {
        let (registry, _) = setup().await;
        registry.upsert_peer(7, "Old Name", "old").await.unwrap();
        registry.upsert_peer(7, "New Name", "new").await.unwrap();

        let peer = registry.get_peer(7).await.unwrap().unwrap();
        assert_eq!(peer.full_name, "New Name");
        assert_eq!(peer.username, "new");
    }

    #[tokio::test]
    async fn test_record_join_is_idempotent() {
        let (registry, _) = setup().await;
        registry.upsert_peer(7, "Seven", "").await.unwrap();

        assert!(registry.record_join_or_post(-1001, 7).await.unwrap());
        assert!(!registry.record_join_or_post(-1001, 7).await.unwrap());
        assert_eq!(registry.members_of(-1001).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_leave_is_idempotent() {
        let (registry, _) = setup().await;
        registry.upsert_peer(7, "Seven", "").await.unwrap();
        registry.record_join_or_post(-1001, 7).await.unwrap();

        assert!(registry.record_leave(-1001, 7).await.unwrap());
        assert!(!registry.record_leave(-1001, 7).await.unwrap());
        assert!(!registry.is_member(-1001, 7).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_scope_skips_disabled_chats() {
        let (registry, _) = setup().await;
        registry.upsert_peer(7, "Seven", "").await.unwrap();
        registry.record_join_or_post(-1001, 7).await.unwrap();
        registry.record_join_or_post(-1002, 7).await.unwrap();

        let memberships = registry.memberships_of(7).await.unwrap();
        assert_eq!(memberships.into_iter().collect::<Vec<_>>(), vec![-1002, -1001]);
        assert_eq!(registry.search_scope(7).await.unwrap(), vec![-1001]);
        assert!(registry.search_scope(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_change_join_then_kick() {
        let (registry, _) = setup().await;
        let profile = PeerProfile::new(9, "Nine").with_username("nine");

        let change = registry
            .apply_status_change(-1001, &profile, MemberStatus::Left, MemberStatus::Member)
            .await
            .unwrap();
        assert_eq!(change.membership, Some(MembershipEffect::Joined));
        assert!(registry.is_member(-1001, 9).await.unwrap());
        assert_eq!(registry.get_peer(9).await.unwrap().unwrap().username, "nine");

        registry
            .apply_status_change(-1001, &profile, MemberStatus::Member, MemberStatus::Kicked)
            .await
            .unwrap();
        assert!(!registry.is_member(-1001, 9).await.unwrap());
    }

    #[tokio::test]
    async fn test_promotion_leaves_rows_untouched() {
        let (registry, _) = setup().await;
        let profile = PeerProfile::new(9, "Nine");

        let change = registry
            .apply_status_change(
                -1001,
                &profile,
                MemberStatus::Member,
                MemberStatus::Administrator,
            )
            .await
            .unwrap();

        assert_eq!(change.membership, None);
        assert!(!registry.is_member(-1001, 9).await.unwrap());
        assert!(registry.get_peer(9).await.unwrap().is_none());
    }
}
