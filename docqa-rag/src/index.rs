//! Flat cosine-similarity index persisted as three blobs per document set.
//!
//! | artifact            | content                                  |
//! |---------------------|------------------------------------------|
//! | `index.chunks.json` | chunk texts and ids, in ordinal order    |
//! | `index.vectors`     | row-major little-endian `f32` matrix     |
//! | `index.json`        | [`IndexMetadata`], written last          |
//!
//! An index is complete only when all three exist.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::store::{BlobStore, index_key};

pub const INDEX_METADATA: &str = "index.json";
pub const INDEX_VECTORS: &str = "index.vectors";
pub const INDEX_CHUNKS: &str = "index.chunks.json";

/// All artifacts in write order. Metadata comes last so a reader never
/// sees it before the data it describes.
pub const INDEX_ARTIFACTS: [&str; 3] = [INDEX_CHUNKS, INDEX_VECTORS, INDEX_METADATA];

const FORMAT_VERSION: u32 = 1;

/// Describes a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMetadata {
    pub format_version: u32,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

/// An exhaustive nearest-neighbour index over embedded chunks.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    metadata: IndexMetadata,
    chunks: Vec<Chunk>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn corrupt(document_set: &str, message: impl Into<String>) -> RagError {
    RagError::CorruptIndex { document_set: document_set.to_string(), message: message.into() }
}

impl FlatIndex {
    /// Build an index from embedded chunks. Every chunk must carry an
    /// embedding of the same length.
    pub fn build(chunks: Vec<Chunk>, embedding_model: impl Into<String>) -> Result<Self> {
        let dimensions = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimensions) {
            return Err(RagError::Pipeline(format!(
                "chunk {} has {} dimensions, expected {dimensions}",
                bad.id,
                bad.embedding.len()
            )));
        }
        Ok(Self {
            metadata: IndexMetadata {
                format_version: FORMAT_VERSION,
                dimensions,
                chunk_count: chunks.len(),
                embedding_model: embedding_model.into(),
                created_at: Utc::now(),
            },
            chunks,
        })
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Return at most `k` chunks by descending similarity to `query`.
    /// Equal scores keep chunk ordinal order.
    ///
    /// # Errors
    ///
    /// [`RagError::DimensionMismatch`] if `query` and the indexed
    /// embeddings differ in length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if !self.chunks.is_empty() && query.len() != self.metadata.dimensions {
            error!(
                expected = self.metadata.dimensions,
                actual = query.len(),
                "query embedding does not match index"
            );
            return Err(RagError::DimensionMismatch {
                expected: self.metadata.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(ordinal, chunk)| {
                let score = cosine_similarity(&chunk.embedding, query);
                (ordinal, if score.is_nan() { 0.0 } else { score })
            })
            .collect();

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(ordinal, score)| SearchResult { chunk: self.chunks[ordinal].clone(), score })
            .collect())
    }

    /// Encode the index as `(artifact, bytes)` pairs in [`INDEX_ARTIFACTS`] order.
    pub fn to_artifacts(&self) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let chunks = serde_json::to_vec(&self.chunks)
            .map_err(|e| RagError::Pipeline(format!("failed to encode chunks: {e}")))?;

        let mut vectors = Vec::with_capacity(self.chunks.len() * self.metadata.dimensions * 4);
        for chunk in &self.chunks {
            for value in &chunk.embedding {
                vectors.extend_from_slice(&value.to_le_bytes());
            }
        }

        let metadata = serde_json::to_vec_pretty(&self.metadata)
            .map_err(|e| RagError::Pipeline(format!("failed to encode metadata: {e}")))?;

        Ok(vec![(INDEX_CHUNKS, chunks), (INDEX_VECTORS, vectors), (INDEX_METADATA, metadata)])
    }

    /// Decode an index from its three artifacts.
    pub fn from_artifacts(
        document_set: &str,
        metadata: &[u8],
        vectors: &[u8],
        chunks: &[u8],
    ) -> Result<Self> {
        let metadata: IndexMetadata = serde_json::from_slice(metadata)
            .map_err(|e| corrupt(document_set, format!("metadata: {e}")))?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(corrupt(
                document_set,
                format!("unsupported format version {}", metadata.format_version),
            ));
        }

        let mut chunks: Vec<Chunk> = serde_json::from_slice(chunks)
            .map_err(|e| corrupt(document_set, format!("chunks: {e}")))?;
        if chunks.len() != metadata.chunk_count {
            return Err(corrupt(
                document_set,
                format!("expected {} chunks, found {}", metadata.chunk_count, chunks.len()),
            ));
        }

        let expected_bytes = metadata.chunk_count * metadata.dimensions * 4;
        if vectors.len() != expected_bytes {
            return Err(corrupt(
                document_set,
                format!("expected {expected_bytes} vector bytes, found {}", vectors.len()),
            ));
        }

        if metadata.dimensions > 0 {
            let row_bytes = metadata.dimensions * 4;
            for (chunk, row) in chunks.iter_mut().zip(vectors.chunks_exact(row_bytes)) {
                chunk.embedding = row
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
            }
        }

        Ok(Self { metadata, chunks })
    }

    /// Persist the index under `{document_set}/index/`.
    ///
    /// If a write fails, artifacts already written by this call are
    /// removed again. A failed removal is logged only.
    pub async fn persist(&self, store: &dyn BlobStore, document_set: &str) -> Result<()> {
        let artifacts = self.to_artifacts()?;
        let mut written: Vec<String> = Vec::with_capacity(artifacts.len());

        for (artifact, bytes) in artifacts {
            let key = index_key(document_set, artifact);
            if let Err(e) = store.put(&key, bytes).await {
                error!(document_set, artifact, error = %e, "failed to persist index artifact");
                for key in written.iter().rev() {
                    if let Err(cleanup) = store.delete(key).await {
                        warn!(key = %key, error = %cleanup, "failed to roll back index artifact");
                    }
                }
                return Err(e);
            }
            written.push(key);
        }

        debug!(document_set, chunk_count = self.len(), "persisted index");
        Ok(())
    }

    /// Load the persisted index of `document_set`.
    ///
    /// # Errors
    ///
    /// [`RagError::NotFound`] if any artifact is missing and
    /// [`RagError::CorruptIndex`] if they cannot be decoded.
    pub async fn load(store: &dyn BlobStore, document_set: &str) -> Result<Self> {
        let mut blobs = Vec::with_capacity(INDEX_ARTIFACTS.len());
        for artifact in [INDEX_METADATA, INDEX_VECTORS, INDEX_CHUNKS] {
            match store.get(&index_key(document_set, artifact)).await? {
                Some(bytes) => blobs.push(bytes),
                None => {
                    debug!(document_set, artifact, "index artifact missing");
                    return Err(RagError::NotFound { document_set: document_set.to_string() });
                }
            }
        }
        Self::from_artifacts(document_set, &blobs[0], &blobs[1], &blobs[2])
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::InMemoryBlobStore;

    /// Delegates to an in-memory store but refuses writes to one artifact.
    #[derive(Default)]
    struct RefusingStore {
        inner: InMemoryBlobStore,
        refused: &'static str,
    }

    #[async_trait]
    impl BlobStore for RefusingStore {
        async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
            if key.ends_with(self.refused) {
                return Err(RagError::Storage { key: key.to_string(), message: "disk full".into() });
            }
            self.inner.put(key, data).await
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text {id}"),
            document_id: "doc.txt".to_string(),
            embedding,
        }
    }

    #[test]
    fn search_orders_by_similarity_then_ordinal() {
        let index = FlatIndex::build(
            vec![
                chunk("0", vec![0.0, 1.0]),
                chunk("1", vec![1.0, 0.0]),
                chunk("2", vec![2.0, 0.0]),
                chunk("3", vec![1.0, 1.0]),
            ],
            "test-model",
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(results[0].score >= results[2].score);
    }

    #[test]
    fn build_rejects_mixed_dimensions() {
        let err = FlatIndex::build(vec![chunk("0", vec![1.0]), chunk("1", vec![1.0, 2.0])], "m")
            .unwrap_err();
        assert!(matches!(err, RagError::Pipeline(_)));
    }

    #[tokio::test]
    async fn persist_then_load_restores_embeddings() {
        let store = InMemoryBlobStore::new();
        let index = FlatIndex::build(
            vec![chunk("0", vec![0.5, -1.25]), chunk("1", vec![3.0, 0.0])],
            "test-model",
        )
        .unwrap();
        index.persist(&store, "set").await.unwrap();

        let loaded = FlatIndex::load(&store, "set").await.unwrap();
        assert_eq!(loaded.metadata().dimensions, 2);
        assert_eq!(loaded.metadata().embedding_model, "test-model");
        assert_eq!(loaded.chunks()[0].embedding, vec![0.5, -1.25]);
        assert_eq!(loaded.chunks()[1].text, "text 1");
    }

    #[tokio::test]
    async fn missing_metadata_is_not_found() {
        let store = InMemoryBlobStore::new();
        let index = FlatIndex::build(vec![chunk("0", vec![1.0])], "m").unwrap();
        index.persist(&store, "set").await.unwrap();
        store.delete(&index_key("set", INDEX_METADATA)).await.unwrap();

        let err = FlatIndex::load(&store, "set").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound { .. }));
    }

    #[tokio::test]
    async fn truncated_vectors_are_corrupt() {
        let store = InMemoryBlobStore::new();
        let index = FlatIndex::build(vec![chunk("0", vec![1.0, 2.0])], "m").unwrap();
        index.persist(&store, "set").await.unwrap();
        store.put(&index_key("set", INDEX_VECTORS), vec![0, 0, 0]).await.unwrap();

        let err = FlatIndex::load(&store, "set").await.unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { .. }));
    }

    #[test]
    fn search_rejects_query_of_wrong_length() {
        let index = FlatIndex::build(vec![chunk("0", vec![1.0, 0.0, 0.0])], "m").unwrap();
        let err = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn failed_persist_leaves_no_partial_index() {
        let store = RefusingStore { refused: INDEX_VECTORS, ..Default::default() };
        let index = FlatIndex::build(vec![chunk("0", vec![1.0, 2.0])], "m").unwrap();

        let err = index.persist(&store, "set").await.unwrap_err();
        assert!(matches!(err, RagError::Storage { .. }));
        assert!(store.list("set/index/").await.unwrap().is_empty());
        assert!(store.get(&index_key("set", INDEX_METADATA)).await.unwrap().is_none());

        let err = FlatIndex::load(&store, "set").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound { .. }));
    }
}
