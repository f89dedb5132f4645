//! Retrieval-augmented answering.
//!
//! [`QaEngine`] ties retrieval, prompt assembly and the chat models
//! together for each answering mode and classifies every failure into a
//! [`QaError`] that callers can report directly.

use std::sync::Arc;

use docqa_model::{Llm, ModelError, TextStream};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::citations::{parse_citations, resolve_source_text};
use crate::config::RagConfig;
use crate::conversation::ConversationContext;
use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::prompt::{PromptAssembler, PromptMode, Topic};
use crate::retrieval::Retriever;
use crate::store::BlobStore;

/// Document set answered from the story-telling rules without retrieval.
pub const STORYBOT_DOCUMENT_SET: &str = "storybot";

/// Document set selecting the technical question bank without retrieval.
pub const TECH_DOCUMENT_SET: &str = "tech";

/// Failures surfaced to clients of the answering operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QaError {
    /// The document set has no complete index.
    #[error("The UUID number is incorrect")]
    InvalidDocumentSet,

    /// The model provider rate-limited the request.
    #[error("OpenAI API request exceeded rate limit: {0}")]
    RateLimited(String),

    /// The model provider is overloaded or down.
    #[error(
        "Server is overloaded or unable to answer your request at the moment. Please try again later"
    )]
    ServiceUnavailable,

    /// Any other failure.
    #[error("{0}")]
    Unknown(String),
}

impl QaError {
    /// HTTP status code reported for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidDocumentSet => 422,
            Self::RateLimited(_) => 500,
            Self::ServiceUnavailable => 503,
            Self::Unknown(_) => 500,
        }
    }
}

impl From<ModelError> for QaError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::RateLimited { message, .. } => Self::RateLimited(message),
            ModelError::ServiceUnavailable { .. } => Self::ServiceUnavailable,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<RagError> for QaError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::NotFound { .. } | RagError::InvalidKey(_) => Self::InvalidDocumentSet,
            RagError::Provider(model) => model.into(),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Result of an answering operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Answer {
    pub answer: String,
    /// The rephrased query, when the mode rephrases before retrieval.
    pub paraphrased_query: Option<String>,
    /// Chunk ids cited by the model.
    pub cited_ids: Vec<String>,
    /// Texts of the cited chunks, each followed by a blank line.
    pub source_text: String,
}

impl Answer {
    fn plain(answer: String) -> Self {
        Self { answer, ..Self::default() }
    }
}

/// Answers queries against indexed document sets.
///
/// Construct one via [`QaEngine::builder()`].
pub struct QaEngine {
    config: RagConfig,
    retriever: Retriever,
    assembler: PromptAssembler,
    answer_model: Arc<dyn Llm>,
    completion_model: Arc<dyn Llm>,
    conversation_model: Arc<dyn Llm>,
}

impl QaEngine {
    /// Create a new [`QaEngineBuilder`].
    pub fn builder() -> QaEngineBuilder {
        QaEngineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Restate `query` more descriptively without changing its meaning.
    pub async fn rephrase(&self, query: &str) -> Result<String, QaError> {
        let prompt = self.assembler.rephrase(query);
        let rephrased = self.completion_model.complete(&prompt.messages).await.map_err(|e| {
            error!(model = self.completion_model.name(), error = %e, "rephrase failed");
            e
        })?;
        Ok(rephrased.trim().to_string())
    }

    /// Rephrase, retrieve with the rephrased query and answer with citations.
    ///
    /// An unknown document set fails before any model is called.
    #[instrument(skip(self, query))]
    pub async fn answer_with_sources(
        &self,
        document_set: &str,
        query: &str,
    ) -> Result<Answer, QaError> {
        let index = self.retriever.load_index(document_set).await?;
        let paraphrased = self.rephrase(query).await?;
        let results = self.retriever.search_index(&index, &paraphrased, self.config.top_k).await?;

        let prompt = self.assembler.assemble(PromptMode::SourceAttributed, &results, &paraphrased);
        let output = self.completion_model.complete(&prompt.messages).await.map_err(|e| {
            error!(model = self.completion_model.name(), error = %e, "answer generation failed");
            e
        })?;

        let citations = parse_citations(&output);
        let source_text = resolve_source_text(&results, &citations.ids);
        info!(
            retrieved = results.len(),
            cited = citations.ids.len(),
            "answered with sources"
        );
        Ok(Answer {
            answer: citations.answer,
            paraphrased_query: Some(paraphrased),
            cited_ids: citations.ids,
            source_text,
        })
    }

    /// Answer from retrieved context placed directly in the prompt.
    #[instrument(skip(self, query))]
    pub async fn answer_with_context(
        &self,
        document_set: &str,
        query: &str,
    ) -> Result<Answer, QaError> {
        let prompt = if is_storybot(document_set) {
            self.assembler.storybot(query)
        } else {
            let results = self.retriever.retrieve(document_set, query, self.config.top_k).await?;
            self.assembler.assemble(PromptMode::RawContext, &results, query)
        };

        let answer = self.answer_model.complete(&prompt.messages).await.map_err(|e| {
            error!(model = self.answer_model.name(), error = %e, "answer generation failed");
            e
        })?;
        Ok(Answer::plain(answer))
    }

    /// Like [`answer_with_context`](Self::answer_with_context) but streamed.
    ///
    /// The first fragment is awaited before returning, so provider failures
    /// at the start of the answer surface as an `Err` rather than inside
    /// the stream.
    #[instrument(skip(self, query))]
    pub async fn stream_with_context(
        &self,
        document_set: &str,
        query: &str,
    ) -> Result<TextStream, QaError> {
        let prompt = if is_storybot(document_set) {
            self.assembler.storybot(query)
        } else {
            let results = self.retriever.retrieve(document_set, query, self.config.top_k).await?;
            self.assembler.assemble(PromptMode::RawContext, &results, query)
        };

        let mut stream = self.answer_model.stream(&prompt.messages).await.map_err(|e| {
            error!(model = self.answer_model.name(), error = %e, "failed to open answer stream");
            e
        })?;

        match stream.next().await {
            None => Ok(Box::pin(futures::stream::empty())),
            Some(Err(e)) => {
                error!(model = self.answer_model.name(), error = %e, "answer stream failed");
                Err(e.into())
            }
            Some(Ok(first)) => {
                debug!("answer stream started");
                Ok(Box::pin(futures::stream::once(async move { Ok(first) }).chain(stream)))
            }
        }
    }

    /// Multi-turn question-bank generation.
    ///
    /// The `tech` document set uses the technical rules without retrieval;
    /// any other id must name an indexed document set. When `remember` is
    /// set the exchange and the reply are appended to the topic's history
    /// in `context` and the whole history is sent; the lock is held for the
    /// duration of the model call so concurrent turns do not interleave.
    #[instrument(skip(self, context, query))]
    pub async fn answer_conversational(
        &self,
        context: &Mutex<ConversationContext>,
        document_set: &str,
        query: &str,
        remember: bool,
    ) -> Result<Answer, QaError> {
        let (topic, results) = if document_set.eq_ignore_ascii_case(TECH_DOCUMENT_SET) {
            (Topic::Technical, Vec::new())
        } else {
            let results = self.retriever.retrieve(document_set, query, self.config.top_k).await?;
            (Topic::Domain, results)
        };
        let prompt = self.assembler.assemble(PromptMode::Conversational(topic), &results, query);

        let answer = if remember {
            let mut context = context.lock().await;
            let messages = context.record_exchange(topic, prompt);
            debug!(?topic, history_len = messages.len(), "sending conversation history");
            let reply = self.conversation_model.complete(&messages).await.map_err(|e| {
                error!(model = self.conversation_model.name(), error = %e, "conversation turn failed");
                e
            })?;
            context.record_reply(topic, reply.clone());
            reply
        } else {
            self.conversation_model.complete(&prompt.messages).await.map_err(|e| {
                error!(model = self.conversation_model.name(), error = %e, "conversation turn failed");
                e
            })?
        };
        Ok(Answer::plain(answer))
    }
}

fn is_storybot(document_set: &str) -> bool {
    document_set.eq_ignore_ascii_case(STORYBOT_DOCUMENT_SET)
}

/// Builder for constructing a [`QaEngine`].
///
/// `store`, `embedding_provider` and `answer_model` are required. The
/// completion and conversation models default to the answer model.
#[derive(Default)]
pub struct QaEngineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn BlobStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    answer_model: Option<Arc<dyn Llm>>,
    completion_model: Option<Arc<dyn Llm>>,
    conversation_model: Option<Arc<dyn Llm>>,
}

impl QaEngineBuilder {
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

    /// Model for raw-context and streamed answers.
    pub fn answer_model(mut self, model: Arc<dyn Llm>) -> Self {
        self.answer_model = Some(model);
        self
    }

    /// Model for rephrasing and source-attributed answers.
    pub fn completion_model(mut self, model: Arc<dyn Llm>) -> Self {
        self.completion_model = Some(model);
        self
    }

    /// Model for multi-turn question-bank conversations.
    pub fn conversation_model(mut self, model: Arc<dyn Llm>) -> Self {
        self.conversation_model = Some(model);
        self
    }

    /// Build the [`QaEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing.
    pub fn build(self) -> crate::error::Result<QaEngine> {
        let config = self.config.unwrap_or_default();
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let answer_model = self
            .answer_model
            .ok_or_else(|| RagError::Config("answer_model is required".to_string()))?;
        let completion_model = self.completion_model.unwrap_or_else(|| answer_model.clone());
        let conversation_model = self.conversation_model.unwrap_or_else(|| answer_model.clone());

        Ok(QaEngine {
            assembler: PromptAssembler::new(config.max_context_chars),
            retriever: Retriever::new(store, embedding_provider),
            config,
            answer_model,
            completion_model,
            conversation_model,
        })
    }
}
