//! Result formatting
//!
//! Renders hits into bounded, MarkdownV2-escaped cards with message deep links.

pub mod card;
pub mod link;
pub mod text;

pub use card::{Card, ResultFormatter, SearchResponse, INFO_CARD_ID};
pub use link::{to_bot_chat_id, to_native_chat_id, DeepLink, LinkCodec};
pub use text::{escape_markdown_v2, expandable_quote, truncate_graphemes, via_line};
