//! Inbound events
//!
//! Transport-neutral shapes of what a chat platform delivers: messages,
//! membership changes and search requests.

use serde::{Deserialize, Serialize};

use crate::domain::chat::ChatKind;
use crate::domain::membership::{MemberStatus, PeerProfile};

/// Characters that may open a command
pub const COMMAND_TRIGGERS: [char; 2] = ['/', '!'];

/// The conversation an event happened in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: i64,
    pub kind: ChatKind,
    #[serde(default)]
    pub title: String,
}

impl ChatRef {
    pub fn new(id: i64, kind: ChatKind, title: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            title: title.into(),
        }
    }
}

/// A new or edited message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat: ChatRef,
    pub sender: PeerProfile,
    pub message_id: i64,
    #[serde(default)]
    pub text: String,
    /// Unix seconds of the original send
    pub date: i64,
    #[serde(default)]
    pub edit_date: Option<i64>,
    /// Id of the inline bot the message was sent through
    #[serde(default)]
    pub via_bot: Option<i64>,
}

impl IncomingMessage {
    pub fn new(chat: ChatRef, sender: PeerProfile, message_id: i64, text: impl Into<String>, date: i64) -> Self {
        Self {
            chat,
            sender,
            message_id,
            text: text.into(),
            date,
            edit_date: None,
            via_bot: None,
        }
    }

    pub fn edited_at(mut self, edit_date: i64) -> Self {
        self.edit_date = Some(edit_date);
        self
    }

    pub fn via(mut self, bot_id: i64) -> Self {
        self.via_bot = Some(bot_id);
        self
    }

    pub fn command(&self) -> Option<Command> {
        Command::parse(&self.text)
    }
}

/// A participant's status changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    pub chat: ChatRef,
    pub user: PeerProfile,
    pub old: MemberStatus,
    pub new: MemberStatus,
}

/// A search request from a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Transport handle used to answer this request
    pub query_id: String,
    pub from: PeerProfile,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message(IncomingMessage),
    MemberUpdate(MemberUpdate),
    Search(SearchRequest),
}

/// Chat commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Remove a linked message from search
    Delete,
    /// Enable tracking of the chat
    Start,
    /// Disable tracking of the chat
    Stop,
}

impl Command {
    /// Recognize `/name`, `!name` and `/name@botname` at the start of a message
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(COMMAND_TRIGGERS)?;
        let word = rest.split_whitespace().next()?;
        let name = word.split('@').next()?;
        match name {
            "dlog" => Some(Self::Delete),
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}
