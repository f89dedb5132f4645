//! Data types for documents, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A source document loaded from a document set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The file name the document was uploaded under.
    pub id: String,
    /// The text content of the document.
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A segment of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Ordinal of the chunk within its indexing run, as a decimal string.
    ///
    /// Models cite chunks by this id, so it must stay stable for the
    /// lifetime of the index.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The vector embedding for this chunk's text. Persisted separately
    /// from the chunk sidecar.
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}
