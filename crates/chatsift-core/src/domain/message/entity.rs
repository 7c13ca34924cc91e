//! Message entity and search types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage key of a message: `<chat_id>_<msg_id>`
pub fn row_id(chat_id: i64, msg_id: i64) -> String {
    format!("{}_{}", chat_id, msg_id)
}

/// Convert stored unix seconds into a UTC timestamp
pub fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// An indexed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub chat_id: i64,
    pub msg_id: i64,
    pub from_id: i64,
    pub text: String,
    /// Unix seconds of the original send time
    pub timestamp: i64,
    pub deleted: bool,
}

impl Message {
    pub fn sent_at(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.timestamp)
    }
}

/// A message observed on the wire, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub chat_id: i64,
    pub from_id: i64,
    pub msg_id: i64,
    pub text: String,
    pub timestamp: i64,
    /// Set when this is an edit of an already-sent message
    #[serde(default)]
    pub edited_at: Option<i64>,
}

impl NewMessage {
    pub fn new(chat_id: i64, from_id: i64, msg_id: i64, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            chat_id,
            from_id,
            msg_id,
            text: text.into(),
            timestamp,
            edited_at: None,
        }
    }

    pub fn edited(mut self, edited_at: i64) -> Self {
        self.edited_at = Some(edited_at);
        self
    }
}

/// Outcome of a store upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Stored,
    /// The edit arrived after the acceptance window and was dropped
    EditIgnored,
}

/// Conjunctive search predicate compiled from a query line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPredicate {
    /// Chats the requester may see; empty means nothing matches
    pub chat_ids: Vec<i64>,
    pub username: Option<String>,
    pub from_id: Option<i64>,
    /// One entry per text token; the token matches if the text contains any variant
    pub token_variants: Vec<Vec<String>>,
}

/// A matching message joined with its author and chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHit {
    pub chat_id: i64,
    pub msg_id: i64,
    pub from_id: i64,
    pub text: String,
    pub timestamp: i64,
    pub full_name: String,
    pub chat_title: String,
}

impl MessageHit {
    pub fn sent_at(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.timestamp)
    }
}

/// One page of hits plus the total number of matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub hits: Vec<MessageHit>,
    pub total: i64,
}

impl SearchPage {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
