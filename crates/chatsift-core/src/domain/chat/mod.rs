//! Tracked chats

pub mod entity;
pub mod repository;

pub use entity::{Chat, ChatKind};
pub use repository::{ChatRepository, ToggleOutcome};
