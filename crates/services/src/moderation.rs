//! Admission checks for new fish.
//!
//! The policy is a pure function of the submitted fields: it never touches
//! the store. Content screening is delegated to a `ContentFilter`, which by
//! default is a keyword deny-list and nothing more.

use std::sync::Arc;

use domains::{ContentFilter, DomainError, FishDraft, NewFish};

/// Lowest accepted confidence. Slightly below the advertised 1% so a client
/// rounding its own percentage is not rejected at the boundary.
pub const MIN_CONFIDENCE: f64 = 0.009;

pub const MAX_LABEL_CHARS: usize = 20;

pub const DEFAULT_DENY_LIST: &[&str] = &["inappropriate", "offensive", "nsfw"];

/// Case-insensitive substring match against a small deny-list.
///
/// This is a placeholder, not a moderation system.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_LIST.iter().copied())
    }
}

impl ContentFilter for KeywordFilter {
    fn is_appropriate(&self, content: &str) -> bool {
        let haystack = content.to_lowercase();
        !self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub min_confidence: f64,
    pub max_label_chars: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_confidence: MIN_CONFIDENCE,
            max_label_chars: MAX_LABEL_CHARS,
        }
    }
}

#[derive(Clone)]
pub struct ModerationPolicy {
    config: PolicyConfig,
    filter: Arc<dyn ContentFilter>,
}

impl ModerationPolicy {
    pub fn new(config: PolicyConfig, filter: Arc<dyn ContentFilter>) -> Self {
        Self { config, filter }
    }

    /// Validates a submission and normalizes it into a draft.
    ///
    /// Checks run in a fixed order: field presence and range, confidence
    /// threshold, then the content filter. The label is truncated last.
    pub fn admit(&self, candidate: NewFish) -> Result<FishDraft, DomainError> {
        let label = candidate
            .label
            .filter(|l| !l.is_empty())
            .ok_or_else(|| DomainError::InvalidInput("label is required".into()))?;
        let content = candidate
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DomainError::InvalidInput("content is required".into()))?;
        let confidence = candidate
            .confidence
            .filter(|c| c.is_finite() && (0.0..=1.0).contains(c))
            .ok_or_else(|| {
                DomainError::InvalidInput("confidence must be a number between 0 and 1".into())
            })?;

        if confidence < self.config.min_confidence {
            return Err(DomainError::low_confidence(confidence));
        }

        if !self.filter.is_appropriate(&content) {
            return Err(DomainError::InappropriateContent);
        }

        Ok(FishDraft {
            label: label.chars().take(self.config.max_label_chars).collect(),
            content,
            confidence,
        })
    }
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default(), Arc::new(KeywordFilter::default()))
    }
}
