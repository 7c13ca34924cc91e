//! Message deep links
//!
//! Supergroup ids carry a `-100` prefix that the public link form drops:
//! chat `-1001234` message `56` links to `<base>/c/1234/56`.

use regex::Regex;

use crate::error::{Error, Result};

const BOT_CHAT_PREFIX: &str = "-100";

/// Strip the `-100` prefix from a chat id for use in a link
pub fn to_native_chat_id(chat_id: i64) -> String {
    let text = chat_id.to_string();
    match text.strip_prefix(BOT_CHAT_PREFIX) {
        Some(native) => native.to_string(),
        None => text,
    }
}

/// Restore the `-100` prefix on a link chat id. Falls back to the input on overflow.
pub fn to_bot_chat_id(native: i64) -> i64 {
    format!("{}{}", BOT_CHAT_PREFIX, native)
        .parse()
        .unwrap_or(native)
}

/// A (chat, message) pair extracted from a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepLink {
    pub chat_id: i64,
    pub msg_id: i64,
}

/// Builds and recognizes message links under one base URL
#[derive(Debug, Clone)]
pub struct LinkCodec {
    base: String,
    pattern: Regex,
}

impl LinkCodec {
    pub fn new(base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(Error::InvalidInput("link base must not be empty".into()));
        }
        let pattern = Regex::new(&format!(r"{}/c/(\d+)/(\d+)", regex::escape(&base)))
            .map_err(|e| Error::InvalidInput(format!("link base '{}': {}", base, e)))?;
        Ok(Self { base, pattern })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn build(&self, chat_id: i64, msg_id: i64) -> String {
        format!("{}/c/{}/{}", self.base, to_native_chat_id(chat_id), msg_id)
    }

    /// Find the first message link in free text
    pub fn parse(&self, text: &str) -> Option<DeepLink> {
        let captures = self.pattern.captures(text)?;
        let native: i64 = captures.get(1)?.as_str().parse().ok()?;
        let msg_id: i64 = captures.get(2)?.as_str().parse().ok()?;
        Some(DeepLink {
            chat_id: to_bot_chat_id(native),
            msg_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_chat_id() {
        assert_eq!(to_native_chat_id(-1001234567890), "1234567890");
        assert_eq!(to_native_chat_id(-4567), "-4567");
        assert_eq!(to_bot_chat_id(1234567890), -1001234567890);
        assert_eq!(to_bot_chat_id(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_build_link() {
        let codec = LinkCodec::new("https://t.me/").unwrap();
        assert_eq!(codec.build(-1001234, 56), "https://t.me/c/1234/56");
    }

    #[test]
    fn test_parse_link_in_command() {
        let codec = LinkCodec::new("https://t.me").unwrap();
        assert_eq!(
            codec.parse("/dlog https://t.me/c/1234/56"),
            Some(DeepLink {
                chat_id: -1001234,
                msg_id: 56
            })
        );
        assert_eq!(codec.parse("/dlog https://example.com/c/1234/56"), None);
        assert_eq!(codec.parse("/dlog"), None);
        assert_eq!(codec.parse("https://t.me/c/99999999999999999999/1"), None);
    }

    #[test]
    fn test_build_parse_inverse() {
        let codec = LinkCodec::new("https://t.me").unwrap();
        let link = codec.build(-1009876, 42);
        let parsed = codec.parse(&link).unwrap();
        assert_eq!((parsed.chat_id, parsed.msg_id), (-1009876, 42));
    }

    #[test]
    fn test_empty_base_rejected() {
        assert!(LinkCodec::new("/").is_err());
    }
}
