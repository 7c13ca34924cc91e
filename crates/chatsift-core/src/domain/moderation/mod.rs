//! Moderation: admin privileges and message deletion

pub mod admin_cache;
pub mod guard;

pub use admin_cache::{AdminCache, PrivilegeFetcher, StaticPrivileges};
pub use guard::{DeleteOutcome, DeleteRequest, DeletionGuard, IgnoreReason};
