//! Chat entity

use serde::{Deserialize, Serialize};

/// A tracked group conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: i64,
    pub title: String,
    /// Gates ingestion and search visibility for this chat
    pub enabled: bool,
}

impl Chat {
    pub fn new(id: i64, title: impl Into<String>, enabled: bool) -> Self {
        Self {
            id,
            title: title.into(),
            enabled,
        }
    }
}

/// Kind of conversation an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private)
    }
}
