//! Caller-facing error taxonomy.
//!
//! Internal plumbing returns [`anyhow::Result`]; anything a caller needs to
//! tell apart is raised as a [`StudyError`] so it survives as the root of an
//! `anyhow::Error` and can be recovered with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    /// The requested document does not exist in the documents directory.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Empty query, missing selection, or a chapter operation before indexing.
    #[error("{0}")]
    InvalidInput(String),

    /// A document (or a page, when not recovered locally) could not be read.
    #[error("Extraction failed for {target}: {reason}")]
    ExtractionFailure { target: String, reason: String },

    /// The durable formula store was unreadable or malformed.
    #[error("Corrupt formula store {path}: {reason}")]
    CorruptPersistentState { path: String, reason: String },

    /// The generation backend failed on every attempt.
    #[error("Generation failed after {attempts} attempt(s): {source}")]
    GenerationFailure {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The first pages of a document produced no native text.
    #[error("The document is empty or unreadable: {0}")]
    EmptyDocument(String),

    /// The local model file is missing.
    #[error("Model file not found: {0}")]
    ModelUnavailable(String),
}

impl StudyError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        StudyError::InvalidInput(msg.into())
    }
}

/// Returns the [`StudyError`] at the root of `err`, if there is one.
pub fn classify(err: &anyhow::Error) -> Option<&StudyError> {
    err.downcast_ref::<StudyError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recovers_typed_error_through_context() {
        use anyhow::Context;
        let res: anyhow::Result<()> =
            Err(StudyError::NotFound("ch1.pdf".into())).context("indexing chapter");
        let err = res.unwrap_err();
        assert!(matches!(classify(&err), Some(StudyError::NotFound(f)) if f == "ch1.pdf"));
    }

    #[test]
    fn generation_failure_keeps_source_message() {
        let err = StudyError::GenerationFailure {
            attempts: 3,
            source: anyhow::anyhow!("backend down"),
        };
        assert_eq!(
            err.to_string(),
            "Generation failed after 3 attempt(s): backend down"
        );
    }
}
