//! # DomainError
//!
//! Centralized error handling for the fish tank.
//! Maps registry and moderation failures to actionable error types.

use thiserror::Error;

use crate::models::FishId;

/// The primary error type for all registry operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Missing or malformed submission fields
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Confidence below the admission threshold; `percent` is confidence × 100
    #[error("fish probability too low: {percent:.2}% (minimum: 1%)")]
    LowConfidence { percent: f64 },

    /// The content check flagged the payload
    #[error("inappropriate content detected")]
    InappropriateContent,

    #[error("fish not found with ID {0}")]
    NotFound(FishId),

    #[error("too many submissions, slow down")]
    RateLimited,

    /// Infrastructure failure (e.g., poisoned state, closed channel)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn low_confidence(confidence: f64) -> Self {
        Self::LowConfidence {
            percent: confidence * 100.0,
        }
    }

    /// Stable machine-readable kind, used on the wire and in metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::LowConfidence { .. } => "low_confidence",
            Self::InappropriateContent => "inappropriate_content",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }

    /// True for the three kinds produced by the admission check.
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::LowConfidence { .. } | Self::InappropriateContent
        )
    }
}

/// A specialized Result type for registry logic.
pub type Result<T> = std::result::Result<T, DomainError>;
