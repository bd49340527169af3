//! Error taxonomy shared by every layer of the pipeline.

use std::fmt;

use thiserror::Error;

use crate::conversation::ConversationState;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// The store backend could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Retrieval produced no matches for the query.
    #[error("no relevant information in the store")]
    NoRelevantData,

    /// A source item was malformed and has been skipped.
    #[error("extraction failed for '{source_id}': {reason}")]
    ExtractionFailure { source_id: String, reason: String },

    /// The chat model call failed. The message is the model client's own.
    #[error("model failure: {0}")]
    ModelFailure(String),

    #[error("invalid conversation state: expected {expected}, found {found}")]
    InvalidState {
        expected: ConversationState,
        found: ConversationState,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RagError {
    pub fn store<E: fmt::Display>(err: E) -> Self {
        RagError::StoreUnavailable(err.to_string())
    }

    pub fn model<E: fmt::Display>(err: E) -> Self {
        RagError::ModelFailure(err.to_string())
    }

    pub fn extraction(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RagError::ExtractionFailure {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can carry on with the session or batch.
    ///
    /// `NoRelevantData` skips one turn and `ExtractionFailure` skips one
    /// item. Everything else aborts the operation in progress.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::NoRelevantData | RagError::ExtractionFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        assert!(RagError::NoRelevantData.is_recoverable());
        assert!(RagError::extraction("faq[3]", "missing answer").is_recoverable());
        assert!(!RagError::store("connection refused").is_recoverable());
        assert!(!RagError::model("HTTP 500").is_recoverable());
    }

    #[test]
    fn messages_carry_source_detail() {
        let err = RagError::extraction("abc123", "bad timestamp");
        assert_eq!(
            err.to_string(),
            "extraction failed for 'abc123': bad timestamp"
        );
        assert_eq!(
            RagError::store("disk I/O error").to_string(),
            "store unavailable: disk I/O error"
        );
    }
}
