//! Top-k retrieval over a persisted document set index.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::FlatIndex;
use crate::store::BlobStore;

/// Loads a document set's index and ranks its chunks against a query.
///
/// The index is read from the [`BlobStore`] on every call and dropped when
/// the call returns, so concurrent queries never share mutable state.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn BlobStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn BlobStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Load the persisted index of `document_set`.
    pub async fn load_index(&self, document_set: &str) -> Result<FlatIndex> {
        FlatIndex::load(self.store.as_ref(), document_set).await
    }

    /// Embed `query` and search an already loaded index.
    pub async fn search_index(
        &self,
        index: &FlatIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;
        index.search(&query_embedding, k)
    }

    /// Return at most `k` chunks of `document_set` most similar to `query`,
    /// best first.
    ///
    /// # Errors
    ///
    /// [`RagError::NotFound`](crate::RagError::NotFound) when the document
    /// set has no complete index.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(
        &self,
        document_set: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let index = self.load_index(document_set).await?;
        let results = self.search_index(&index, query, k).await?;
        debug!(result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
