//! Chatsift Core Library
//!
//! This crate provides the core functionality for chatsift, including:
//! - Storage (SQLite with versioned migrations and a bulk-import profile)
//! - Message store with soft delete and an edit-acceptance window
//! - Membership registry driving per-requester search scope
//! - Query compiler with Han simplified/traditional expansion
//! - Result formatting (MarkdownV2 cards, deep links)
//! - Deletion guard backed by an admin cache
//! - Event dispatcher and Telegram Desktop export import

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod import;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dispatcher::{Dispatcher, Transport};
    pub use crate::domain::format::{Card, SearchResponse};
    pub use crate::domain::moderation::{DeleteOutcome, DeleteRequest, PrivilegeFetcher};
    pub use crate::domain::search::SearchOutcome;
    pub use crate::engine::{Engine, IngestOutcome};
    pub use crate::error::{Error, Result};
    pub use crate::events::{ChatRef, Event, IncomingMessage, MemberUpdate, SearchRequest};
    pub use crate::storage::{Database, DatabaseConfig};
}
