//! Error types for chatsift

use thiserror::Error;

/// Result type alias using chatsift's Error
pub type Result<T> = std::result::Result<T, Error>;

/// chatsift error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Chat {0} is not tracked. Enable it with `chatsift chats enable {0}`.")]
    ChatNotFound(i64),

    // Input errors (E100-E199)
    #[error("Message text must not be empty")]
    EmptyText,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Transport errors (E200-E299)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Privilege lookup for chat {0} failed: {1}")]
    PrivilegeFetch(i64, String),

    // Normalization errors (E300-E399)
    #[error("Script conversion failed for '{0}': {1}")]
    Normalization(String, String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Import errors (E500-E599)
    #[error("Export parse error: {0}")]
    ExportParse(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChatNotFound(_) => "E001",
            Self::EmptyText => "E100",
            Self::InvalidInput(_) => "E101",
            Self::Transport(_) => "E200",
            Self::PrivilegeFetch(..) => "E201",
            Self::Normalization(..) => "E300",
            Self::DatabaseError(_) => "E400",
            Self::ExportParse(_) => "E500",
            Self::ConfigError(_) => "E600",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ChatNotFound(id) => Some(format!("chatsift chats enable {}", id)),
            Self::DatabaseError(_) => Some("chatsift doctor".to_string()),
            Self::ConfigError(_) => Some("chatsift config list".to_string()),
            _ => None,
        }
    }

    /// Whether this failure only affects the interaction that raised it
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::Transport(_) | Self::PrivilegeFetch(..) | Self::Io(_)
        )
    }
}
