//! Error taxonomy for the ingestion and answering pipeline.
//!
//! Every stage returns [`Result<T>`]. Callers that need to react by
//! category (show a warning vs. an error, offer a retry) use
//! [`RagError::kind`] rather than matching individual variants.

use std::path::PathBuf;

/// Broad category of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input: empty archive, no readable files, empty query.
    Input,
    /// Missing or malformed configuration, including API credentials.
    Configuration,
    /// Problems building, persisting, or querying a project index.
    Index,
    /// Retrieval produced nothing usable.
    Retrieval,
    /// An embedding or completion provider failed.
    ExternalService,
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("failed to read archive: {0}")]
    Archive(String),

    #[error("uploaded archive is empty")]
    EmptyArchive,

    #[error("no readable files found under {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("index not ready: index a codebase or select a project first")]
    IndexNotReady,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("embedding model mismatch: index built with '{index}', provider is '{provider}'")]
    ModelMismatch { index: String, provider: String },

    #[error("no relevant content found for the query")]
    NoRelevantContent,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("answer generation failed: {0}")]
    AnswerGeneration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Archive(_)
            | RagError::EmptyArchive
            | RagError::NoDocuments(_)
            | RagError::InvalidInput(_)
            | RagError::IndexNotReady => ErrorKind::Input,
            RagError::Config(_) => ErrorKind::Configuration,
            RagError::Index(_) | RagError::ModelMismatch { .. } | RagError::Io(_) => {
                ErrorKind::Index
            }
            RagError::NoRelevantContent => ErrorKind::Retrieval,
            RagError::Embedding(_) | RagError::AnswerGeneration(_) => ErrorKind::ExternalService,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(RagError::EmptyArchive.kind(), ErrorKind::Input);
        assert_eq!(
            RagError::Config("missing key".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(RagError::NoRelevantContent.kind(), ErrorKind::Retrieval);
        assert_eq!(
            RagError::AnswerGeneration("503".into()).kind(),
            ErrorKind::ExternalService
        );
        assert_eq!(
            RagError::ModelMismatch {
                index: "a".into(),
                provider: "b".into()
            }
            .kind(),
            ErrorKind::Index
        );
    }

    #[test]
    fn test_display_no_documents() {
        let err = RagError::NoDocuments(PathBuf::from("/tmp/code"));
        assert_eq!(err.to_string(), "no readable files found under /tmp/code");
    }
}
