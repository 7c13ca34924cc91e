//! Han-script variant expansion
//!
//! A token such as `学习` is searched as itself plus its simplified and
//! traditional renderings, so a query in either script finds text in the other.

use std::sync::Arc;

use tracing::warn;
use zhconv::{zhconv, Variant};

use crate::error::Result;

/// Converts text between Han script variants
pub trait ScriptConverter: Send + Sync {
    fn to_simplified(&self, text: &str) -> Result<String>;
    fn to_traditional(&self, text: &str) -> Result<String>;
}

/// Converter backed by the `zhconv` rule tables
#[derive(Debug, Clone, Copy, Default)]
pub struct ZhConverter;

impl ScriptConverter for ZhConverter {
    fn to_simplified(&self, text: &str) -> Result<String> {
        Ok(zhconv(text, Variant::ZhHans))
    }

    fn to_traditional(&self, text: &str) -> Result<String> {
        Ok(zhconv(text, Variant::ZhHant))
    }
}

/// Expands tokens into their distinct script variants
#[derive(Clone)]
pub struct ScriptNormalizer {
    converter: Arc<dyn ScriptConverter>,
}

impl std::fmt::Debug for ScriptNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptNormalizer").finish_non_exhaustive()
    }
}

impl Default for ScriptNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(ZhConverter))
    }
}

impl ScriptNormalizer {
    pub fn new(converter: Arc<dyn ScriptConverter>) -> Self {
        Self { converter }
    }

    /// Original, simplified and traditional forms; duplicates removed, order kept.
    ///
    /// A failed conversion is logged and skipped, so the result always holds at
    /// least the original token.
    pub fn variants(&self, token: &str) -> Vec<String> {
        let mut variants = vec![token.to_string()];

        let conversions = [
            ("simplified", self.converter.to_simplified(token)),
            ("traditional", self.converter.to_traditional(token)),
        ];

        for (target, converted) in conversions {
            match converted {
                Ok(text) => {
                    if !text.is_empty() && !variants.contains(&text) {
                        variants.push(text);
                    }
                }
                Err(e) => {
                    warn!(token, target, error = %e, "Script conversion failed, using original token");
                }
            }
        }

        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct BrokenConverter;

    impl ScriptConverter for BrokenConverter {
        fn to_simplified(&self, text: &str) -> Result<String> {
            Err(Error::Normalization(text.to_string(), "table missing".into()))
        }

        fn to_traditional(&self, text: &str) -> Result<String> {
            Ok(format!("{text}!"))
        }
    }

    #[test]
    fn test_ascii_has_one_variant() {
        let normalizer = ScriptNormalizer::default();
        assert_eq!(normalizer.variants("hello"), vec!["hello"]);
    }

    #[test]
    fn test_simplified_expands_to_traditional() {
        let normalizer = ScriptNormalizer::default();
        let variants = normalizer.variants("学习");
        assert_eq!(variants[0], "学习");
        assert!(variants.contains(&"學習".to_string()));
        assert!(variants.len() <= 3);
    }

    #[test]
    fn test_traditional_expands_to_simplified() {
        let normalizer = ScriptNormalizer::default();
        let variants = normalizer.variants("學習");
        assert_eq!(variants[0], "學習");
        assert!(variants.contains(&"学习".to_string()));
    }

    #[test]
    fn test_failure_degrades() {
        let normalizer = ScriptNormalizer::new(Arc::new(BrokenConverter));
        assert_eq!(normalizer.variants("abc"), vec!["abc", "abc!"]);
    }
}
