//! Error types for the `docqa-rag` crate.

use docqa_model::ModelError;
use thiserror::Error;

/// Errors that can occur while indexing or retrieving documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// No complete persisted index exists for the document set.
    #[error("no index found for document set '{document_set}'")]
    NotFound {
        /// The requested document set.
        document_set: String,
    },

    /// The persisted index exists but could not be decoded.
    #[error("index for document set '{document_set}' is corrupt: {message}")]
    CorruptIndex {
        /// The requested document set.
        document_set: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the blob store backend.
    #[error("storage error ({key}): {message}")]
    Storage {
        /// The key being accessed.
        key: String,
        /// A description of the failure.
        message: String,
    },

    /// A blob key was rejected before reaching the store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A query vector does not match the dimensions of the index.
    #[error("query has {actual} dimensions, index has {expected}")]
    DimensionMismatch {
        /// Dimensions of the indexed embeddings.
        expected: usize,
        /// Dimensions of the query embedding.
        actual: usize,
    },

    /// An uploaded archive could not be expanded.
    #[error("archive error: {0}")]
    Archive(String),

    /// An embedding provider failed.
    #[error(transparent)]
    Provider(#[from] ModelError),

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error in indexing orchestration.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
