//! Error types for the dialog runtime

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by signal construction, decoding and dispatch
#[derive(Debug, Error)]
pub enum BotError {
    /// Missing required field or unsatisfied alternative group
    #[error("<{variant}> schema violation: {reason}")]
    Schema { variant: String, reason: String },

    /// A persisted tag that names no registered variant
    #[error("unknown variant tag: {0}")]
    UnknownVariant(String),

    /// Variant tags are globally unique
    #[error("variant already registered: {0}")]
    DuplicateVariant(String),

    /// Persisted state with a shape the decoder cannot use
    #[error("malformed state: {0}")]
    Decode(String),

    /// Invalid regular expression in an options spec
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// JSON (de)serialization failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An area failed while processing a signal
    #[error("area {area} failed on <{variant}>: {reason}")]
    Area {
        area: String,
        variant: String,
        reason: String,
    },
}

/// Result alias used across the crate
pub type BotResult<T> = Result<T, BotError>;

impl BotError {
    pub(crate) fn schema(variant: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            variant: variant.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }
}

/// Non-fatal finding from structural validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Variant the warning belongs to
    pub variant: String,
    /// Offending field
    pub field: String,
    /// Human readable description
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>.{}: {}", self.variant, self.field, self.message)
    }
}
