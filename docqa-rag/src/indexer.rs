//! Indexing pipeline: store uploaded documents, chunk, embed and persist.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{Indexer, RagConfig, UploadedFile};
//!
//! let indexer = Indexer::builder()
//!     .config(RagConfig::default())
//!     .store(store)
//!     .embedding_provider(embedder)
//!     .build()?;
//!
//! let outcome = indexer.upload(vec![UploadedFile::new("faq.zip", bytes)]).await?;
//! println!("indexed {} as {}", outcome.documents.len(), outcome.document_set_id);
//! ```

use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::archive::{UploadedFile, expand_upload};
use crate::chunking::{Chunker, RecursiveChunker, chunk_documents};
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::FlatIndex;
use crate::store::{BlobStore, document_key, documents_prefix};

/// Result of [`Indexer::upload`].
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// Id of the newly created document set.
    pub document_set_id: String,
    /// Stored document names, in upload order.
    pub documents: Vec<String>,
    /// Number of chunks in the persisted index.
    pub chunk_count: usize,
}

/// Turns uploaded files into a persisted, queryable document set.
///
/// Construct one via [`Indexer::builder()`].
pub struct Indexer {
    config: RagConfig,
    store: Arc<dyn BlobStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
}

impl Indexer {
    /// Create a new [`IndexerBuilder`].
    pub fn builder() -> IndexerBuilder {
        IndexerBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Store every document contained in `files` under `document_set`.
    ///
    /// Returns the stored document names.
    pub async fn store_documents(
        &self,
        document_set: &str,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for file in files {
            for document in expand_upload(file)? {
                let key = document_key(document_set, &document.name);
                self.store.put(&key, document.data).await.map_err(|e| {
                    error!(document_set, document = %document.name, error = %e, "failed to store document");
                    e
                })?;
                names.push(document.name);
            }
        }
        Ok(names)
    }

    /// Load the stored documents of `document_set`, ordered by name.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    pub async fn load_documents(&self, document_set: &str) -> Result<Vec<Document>> {
        let prefix = documents_prefix(document_set);
        let mut documents = Vec::new();
        for key in self.store.list(&prefix).await? {
            let Some(bytes) = self.store.get(&key).await? else { continue };
            let name = key.strip_prefix(&prefix).unwrap_or(&key);
            documents.push(Document::new(name, String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(documents)
    }

    /// Chunk, embed and persist the index of an already stored document set.
    #[instrument(skip(self))]
    pub async fn build_index(&self, document_set: &str) -> Result<FlatIndex> {
        let documents = self.load_documents(document_set).await?;
        let mut chunks = chunk_documents(self.chunker.as_ref(), &documents);
        if chunks.is_empty() {
            error!(document_count = documents.len(), "uploaded documents contain no text");
            return Err(RagError::Pipeline(format!(
                "document set '{document_set}' contains no indexable text"
            )));
        }

        for batch in chunks.chunks_mut(self.config.embedding_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(error = %e, "embedding failed during indexing");
                e
            })?;
            if embeddings.len() != batch.len() {
                return Err(RagError::Pipeline(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        let index = FlatIndex::build(chunks, self.embedding_provider.model())?;
        index.persist(self.store.as_ref(), document_set).await?;
        info!(
            document_count = documents.len(),
            chunk_count = index.len(),
            dimensions = index.metadata().dimensions,
            "index built"
        );
        Ok(index)
    }

    /// Create a new document set from `files` and index it.
    pub async fn upload(&self, files: Vec<UploadedFile>) -> Result<UploadOutcome> {
        let document_set_id = Uuid::new_v4().to_string();
        let documents = self.store_documents(&document_set_id, files).await?;
        if documents.is_empty() {
            return Err(RagError::Pipeline("upload contains no documents".to_string()));
        }
        let index = self.build_index(&document_set_id).await?;
        Ok(UploadOutcome { document_set_id, documents, chunk_count: index.len() })
    }
}

/// Builder for constructing an [`Indexer`].
///
/// `store` and `embedding_provider` are required. Without an explicit
/// chunker a [`RecursiveChunker`] sized by the config is used.
#[derive(Default)]
pub struct IndexerBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn BlobStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IndexerBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`Indexer`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing.
    pub fn build(self) -> Result<Indexer> {
        let config = self.config.unwrap_or_default();
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        Ok(Indexer { config, store, embedding_provider, chunker })
    }
}
