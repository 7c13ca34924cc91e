//! Indexed messages and their store

pub mod entity;
pub mod store;

pub use entity::{
    Message, MessageHit, NewMessage, SearchPage, SearchPredicate, UpsertOutcome, row_id,
};
pub use store::{DEFAULT_EDIT_WINDOW, MessageStore, like_pattern};
