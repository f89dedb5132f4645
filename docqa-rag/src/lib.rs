//! # docqa-rag
//!
//! Retrieval-augmented question answering over uploaded document sets.
//!
//! A document set is identified by an opaque id. Uploading stores the raw
//! documents in a [`BlobStore`], splits them into overlapping chunks,
//! embeds them and persists a [`FlatIndex`] next to them. Queries load that
//! index, pick the top-k chunks and hand them to a chat model through one
//! of the [`PromptMode`]s.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Indexer, InMemoryBlobStore, QaEngine, RagConfig, UploadedFile};
//!
//! let store = Arc::new(InMemoryBlobStore::new());
//! let indexer = Indexer::builder()
//!     .config(RagConfig::default())
//!     .store(store.clone())
//!     .embedding_provider(embedder.clone())
//!     .build()?;
//! let outcome = indexer.upload(vec![UploadedFile::new("faq.txt", bytes)]).await?;
//!
//! let engine = QaEngine::builder()
//!     .store(store)
//!     .embedding_provider(embedder)
//!     .answer_model(model)
//!     .build()?;
//! let answer = engine.answer_with_context(&outcome.document_set_id, "why QuML").await?;
//! ```

pub mod archive;
pub mod chunking;
pub mod citations;
pub mod config;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod openai;
pub mod prompt;
pub mod qa;
pub mod retrieval;
pub mod store;

pub use archive::{UploadedFile, expand_upload};
pub use chunking::{Chunker, RecursiveChunker, chunk_documents};
pub use citations::{Citations, parse_citations, resolve_source_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use conversation::ConversationContext;
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::{FlatIndex, INDEX_ARTIFACTS, IndexMetadata};
pub use indexer::{Indexer, IndexerBuilder, UploadOutcome};
pub use openai::OpenAIEmbeddingProvider;
pub use prompt::{Prompt, PromptAssembler, PromptMode, Topic};
pub use qa::{Answer, QaEngine, QaEngineBuilder, QaError};
pub use retrieval::Retriever;
pub use store::{BlobStore, InMemoryBlobStore, LocalBlobStore};
