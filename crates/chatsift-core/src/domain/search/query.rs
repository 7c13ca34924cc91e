//! Query-line parsing
//!
//! ```text
//! 2                 -> page 2 of everything
//! text              -> messages containing "text"
//! @alice text 3     -> page 3 of alice's messages containing "text"
//! @114514 text      -> messages by peer 114514 containing "text"
//! ```

use serde::{Deserialize, Serialize};

/// Marker that opens an author selector
pub const SELECTOR_MARKER: char = '@';

/// Author restriction taken from the first token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    PeerId(i64),
    Username(String),
}

impl Selector {
    /// Parse the text after `@`. Zero or empty means no selector.
    fn parse(raw: &str) -> Option<Self> {
        match raw.parse::<i64>() {
            Ok(0) => None,
            Ok(id) => Some(Self::PeerId(id)),
            Err(_) if raw.is_empty() => None,
            Err(_) => Some(Self::Username(raw.to_string())),
        }
    }
}

/// A query line split into selector, text tokens and page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub selector: Option<Selector>,
    pub tokens: Vec<String>,
    /// 1-based page number
    pub page: u32,
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self {
            selector: None,
            tokens: Vec::new(),
            page: 1,
        }
    }
}

impl ParsedQuery {
    /// Parse a raw query line. Never fails; malformed parts degrade to defaults.
    pub fn parse(line: &str) -> Self {
        let mut parts: Vec<&str> = line.split(' ').collect();

        let selector = match parts.first() {
            Some(first) if first.starts_with(SELECTOR_MARKER) => {
                let selector = Selector::parse(&first[SELECTOR_MARKER.len_utf8()..]);
                parts.remove(0);
                selector
            }
            _ => None,
        };

        // A lone number is a page, not a search term.
        let page = match parts.last().and_then(|last| last.trim().parse::<u32>().ok()) {
            Some(n) if n > 1 => {
                parts.pop();
                n
            }
            _ => 1,
        };

        let mut tokens: Vec<String> = Vec::new();
        for part in parts {
            let token = part.trim();
            if token.is_empty() || tokens.iter().any(|t| t == token) {
                continue;
            }
            tokens.push(token.to_string());
        }

        Self {
            selector,
            tokens,
            page,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.selector {
            Some(Selector::Username(name)) => Some(name),
            _ => None,
        }
    }

    pub fn peer_id(&self) -> Option<i64> {
        match &self.selector {
            Some(Selector::PeerId(id)) => Some(*id),
            _ => None,
        }
    }

    /// Row offset of the first hit on this page
    pub fn offset(&self, page_size: u32) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(page_size)
    }
}
