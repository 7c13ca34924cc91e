//! Message store
//!
//! Owns the `message` table. Rows are never removed: deletion only flips the
//! `deleted` marker, and re-upserting an existing message leaves that marker alone.

use std::time::Duration;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use super::entity::{
    row_id, Message, MessageHit, NewMessage, SearchPage, SearchPredicate, UpsertOutcome,
};
use crate::error::{Error, Result};

/// Default edit-acceptance window (48 hours)
pub const DEFAULT_EDIT_WINDOW: Duration = Duration::from_secs(48 * 60 * 60);

/// Escape LIKE wildcards so a token matches literally, then wrap it for a substring match
pub fn like_pattern(token: &str) -> String {
    let mut pattern = String::with_capacity(token.len() + 2);
    pattern.push('%');
    for c in token.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append the FROM/WHERE clause shared by page and count queries
fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, predicate: &SearchPredicate) {
    query.push(
        r#"
            FROM message
            INNER JOIN peer ON peer.id = message.from_id
            INNER JOIN chat ON chat.id = message.chat_id
            WHERE message.deleted = 0 AND message.chat_id IN ("#,
    );
    {
        let mut ids = query.separated(", ");
        for chat_id in &predicate.chat_ids {
            ids.push_bind(*chat_id);
        }
    }
    query.push(")");

    if let Some(username) = &predicate.username {
        query.push(" AND peer.username = ").push_bind(username.clone());
    }
    if let Some(from_id) = predicate.from_id {
        query.push(" AND message.from_id = ").push_bind(from_id);
    }

    for variants in predicate.token_variants.iter().filter(|v| !v.is_empty()) {
        query.push(" AND (");
        for (i, variant) in variants.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            query
                .push("message.text LIKE ")
                .push_bind(like_pattern(variant))
                .push(" ESCAPE '\\'");
        }
        query.push(")");
    }
}

#[derive(sqlx::FromRow)]
struct HitRow {
    chat_id: i64,
    msg_id: i64,
    from_id: i64,
    text: String,
    timestamp: i64,
    full_name: String,
    title: String,
    total_count: i64,
}

/// Durable store of indexed messages
#[derive(Debug, Clone)]
pub struct MessageStore {
    pool: SqlitePool,
    edit_window: Duration,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            edit_window: DEFAULT_EDIT_WINDOW,
        }
    }

    pub fn with_edit_window(mut self, edit_window: Duration) -> Self {
        self.edit_window = edit_window;
        self
    }

    pub fn edit_window(&self) -> Duration {
        self.edit_window
    }

    fn edit_is_stale(&self, message: &NewMessage) -> bool {
        match message.edited_at {
            Some(edited_at) => {
                let elapsed = edited_at.saturating_sub(message.timestamp);
                let window = i64::try_from(self.edit_window.as_secs()).unwrap_or(i64::MAX);
                elapsed > window
            }
            None => false,
        }
    }

    /// Insert or overwrite a message by its (chat, msg) identity
    pub async fn upsert(&self, message: &NewMessage) -> Result<UpsertOutcome> {
        if message.text.is_empty() {
            return Err(Error::EmptyText);
        }

        if self.edit_is_stale(message) {
            debug!(
                chat_id = message.chat_id,
                msg_id = message.msg_id,
                "Edit outside acceptance window ignored"
            );
            return Ok(UpsertOutcome::EditIgnored);
        }

        sqlx::query(
            r#"
            INSERT INTO message (id, chat_id, from_id, msg_id, text, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                from_id = excluded.from_id,
                text = excluded.text,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(row_id(message.chat_id, message.msg_id))
        .bind(message.chat_id)
        .bind(message.from_id)
        .bind(message.msg_id)
        .bind(&message.text)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;

        Ok(UpsertOutcome::Stored)
    }

    /// Mark a message deleted. Returns true when the marker changed.
    pub async fn soft_delete(&self, chat_id: i64, msg_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE message SET deleted = 1 WHERE id = ? AND deleted = 0")
            .bind(row_id(chat_id, msg_id))
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        let changed = result.rows_affected() > 0;
        if changed {
            debug!(chat_id, msg_id, "Message soft-deleted");
        }
        Ok(changed)
    }

    pub async fn get(&self, chat_id: i64, msg_id: i64) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT chat_id, msg_id, from_id, text, timestamp, deleted
            FROM message
            WHERE id = ?
            "#,
        )
        .bind(row_id(chat_id, msg_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    /// Total stored rows, deleted ones included
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Run a scoped search and return one page plus the total match count.
    ///
    /// The count comes from a window function in the same statement, so it is
    /// consistent with the page even under concurrent writes.
    pub async fn search(
        &self,
        predicate: &SearchPredicate,
        offset: i64,
        limit: i64,
    ) -> Result<SearchPage> {
        if predicate.chat_ids.is_empty() {
            return Ok(SearchPage::default());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT
                message.chat_id, message.msg_id, message.from_id, message.text,
                message.timestamp, peer.full_name, chat.title,
                COUNT(*) OVER() AS total_count"#,
        );
        push_filters(&mut query, predicate);

        query
            .push(" ORDER BY message.timestamp DESC, message.msg_id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<HitRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Search query failed");
                Error::DatabaseError(e)
            })?;

        let total = match rows.first() {
            Some(row) => row.total_count,
            // Past the last page the window yields no rows; recount so the header stays right.
            None if offset > 0 => self.count_matches(predicate).await?,
            None => 0,
        };

        let hits = rows
            .into_iter()
            .map(|row| MessageHit {
                chat_id: row.chat_id,
                msg_id: row.msg_id,
                from_id: row.from_id,
                text: row.text,
                timestamp: row.timestamp,
                full_name: row.full_name,
                chat_title: row.title,
            })
            .collect();

        Ok(SearchPage { hits, total })
    }

    async fn count_matches(&self, predicate: &SearchPredicate) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_filters(&mut query, predicate);
        let (count,): (i64,) = query.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatRepository;
    use crate::domain::membership::MembershipRegistry;
    use crate::storage::Database;

    const CHAT: i64 = -1001;

    async fn setup() -> MessageStore {
        let db = Database::in_memory().await.unwrap();
        ChatRepository::new(db.pool().clone())
            .upsert(CHAT, "General", true)
            .await
            .unwrap();
        let registry = MembershipRegistry::new(db.pool().clone());
        registry.upsert_peer(1, "Alice", "alice").await.unwrap();
        registry.upsert_peer(2, "Bob", "bob").await.unwrap();
        MessageStore::new(db.pool().clone())
    }

    fn scope() -> SearchPredicate {
        SearchPredicate {
            chat_ids: vec![CHAT],
            ..Default::default()
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = setup().await;
        let message = NewMessage::new(CHAT, 1, 10, "hello", 1_000);

        store.upsert(&message).await.unwrap();
        store.upsert(&message).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(CHAT, 10).await.unwrap().unwrap();
        assert_eq!(stored.text, "hello");
        assert!(!stored.deleted);
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_text() {
        let store = setup().await;
        let err = store
            .upsert(&NewMessage::new(CHAT, 1, 10, "", 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyText));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_unknown_author() {
        let store = setup().await;
        let result = store.upsert(&NewMessage::new(CHAT, 99, 10, "hi", 1_000)).await;
        assert!(matches!(result, Err(Error::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_edit_within_window_overwrites() {
        let store = setup().await;
        store
            .upsert(&NewMessage::new(CHAT, 1, 10, "typo", 1_000))
            .await
            .unwrap();

        let outcome = store
            .upsert(&NewMessage::new(CHAT, 1, 10, "fixed", 1_000).edited(1_060))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Stored);
        assert_eq!(store.get(CHAT, 10).await.unwrap().unwrap().text, "fixed");
    }

    #[tokio::test]
    async fn test_edit_outside_window_ignored() {
        let store = setup().await.with_edit_window(Duration::from_secs(60));
        store
            .upsert(&NewMessage::new(CHAT, 1, 10, "original", 1_000))
            .await
            .unwrap();

        let outcome = store
            .upsert(&NewMessage::new(CHAT, 1, 10, "late", 1_000).edited(1_061))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::EditIgnored);
        assert_eq!(store.get(CHAT, 10).await.unwrap().unwrap().text, "original");
    }

    #[tokio::test]
    async fn test_unbounded_edit_window_accepts_edits() {
        let store = setup().await.with_edit_window(Duration::from_secs(u64::MAX));
        store
            .upsert(&NewMessage::new(CHAT, 1, 10, "original", 1_000))
            .await
            .unwrap();

        let outcome = store
            .upsert(&NewMessage::new(CHAT, 1, 10, "fixed", 1_000).edited(1_001))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Stored);
        assert_eq!(store.get(CHAT, 10).await.unwrap().unwrap().text, "fixed");
    }

    #[tokio::test]
    async fn test_soft_delete_survives_reupsert() {
        let store = setup().await;
        let message = NewMessage::new(CHAT, 1, 10, "secret", 1_000);
        store.upsert(&message).await.unwrap();

        assert!(store.soft_delete(CHAT, 10).await.unwrap());
        assert!(!store.soft_delete(CHAT, 10).await.unwrap());
        assert!(!store.soft_delete(CHAT, 11).await.unwrap());

        store.upsert(&message).await.unwrap();
        assert!(store.get(CHAT, 10).await.unwrap().unwrap().deleted);

        let page = store.search(&scope(), 0, 49).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_orders_newest_first() {
        let store = setup().await;
        store.upsert(&NewMessage::new(CHAT, 1, 1, "first", 100)).await.unwrap();
        store.upsert(&NewMessage::new(CHAT, 2, 2, "second", 200)).await.unwrap();
        store.upsert(&NewMessage::new(CHAT, 1, 3, "tie", 200)).await.unwrap();

        let page = store.search(&scope(), 0, 49).await.unwrap();
        let ids: Vec<i64> = page.hits.iter().map(|h| h.msg_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(page.total, 3);
        assert_eq!(page.hits[0].full_name, "Alice");
        assert_eq!(page.hits[0].chat_title, "General");
    }

    #[tokio::test]
    async fn test_search_tokens_and_variants() {
        let store = setup().await;
        store.upsert(&NewMessage::new(CHAT, 1, 1, "rust and go", 100)).await.unwrap();
        store.upsert(&NewMessage::new(CHAT, 1, 2, "rust only", 200)).await.unwrap();
        store.upsert(&NewMessage::new(CHAT, 2, 3, "go only", 300)).await.unwrap();

        let mut predicate = scope();
        predicate.token_variants = vec![vec!["rust".into()], vec!["go".into()]];
        let page = store.search(&predicate, 0, 49).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.hits[0].msg_id, 1);

        predicate.token_variants = vec![vec!["only".into(), "nothing".into()]];
        assert_eq!(store.search(&predicate, 0, 49).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_search_author_filters() {
        let store = setup().await;
        store.upsert(&NewMessage::new(CHAT, 1, 1, "from alice", 100)).await.unwrap();
        store.upsert(&NewMessage::new(CHAT, 2, 2, "from bob", 200)).await.unwrap();

        let mut predicate = scope();
        predicate.username = Some("bob".into());
        let page = store.search(&predicate, 0, 49).await.unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].from_id, 2);

        let mut predicate = scope();
        predicate.from_id = Some(1);
        let page = store.search(&predicate, 0, 49).await.unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].from_id, 1);
    }

    #[tokio::test]
    async fn test_search_literal_percent() {
        let store = setup().await;
        store.upsert(&NewMessage::new(CHAT, 1, 1, "100% done", 100)).await.unwrap();
        store.upsert(&NewMessage::new(CHAT, 1, 2, "100 done", 200)).await.unwrap();

        let mut predicate = scope();
        predicate.token_variants = vec![vec!["100%".into()]];
        let page = store.search(&predicate, 0, 49).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.hits[0].msg_id, 1);
    }

    #[tokio::test]
    async fn test_search_pagination_is_disjoint() {
        let store = setup().await;
        for i in 1..=5 {
            store
                .upsert(&NewMessage::new(CHAT, 1, i, format!("msg {i}"), i * 10))
                .await
                .unwrap();
        }

        let first = store.search(&scope(), 0, 2).await.unwrap();
        let second = store.search(&scope(), 2, 2).await.unwrap();
        let beyond = store.search(&scope(), 10, 2).await.unwrap();

        assert_eq!(first.hits.iter().map(|h| h.msg_id).collect::<Vec<_>>(), vec![5, 4]);
        assert_eq!(second.hits.iter().map(|h| h.msg_id).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(first.total, 5);
        assert_eq!(second.total, 5);
        assert!(beyond.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[tokio::test]
    async fn test_search_empty_scope() {
        let store = setup().await;
        store.upsert(&NewMessage::new(CHAT, 1, 1, "hi", 100)).await.unwrap();
        let page = store.search(&SearchPredicate::default(), 0, 49).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
    }
}
