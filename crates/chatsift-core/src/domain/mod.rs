//! Domain layer
//!
//! Contains the core business logic and domain models.

pub mod chat;
pub mod format;
pub mod membership;
pub mod message;
pub mod moderation;
pub mod search;
