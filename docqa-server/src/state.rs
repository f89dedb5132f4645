//! Shared application state.

use std::sync::Arc;

use anyhow::Context;
use docqa_model::{Llm, OpenAIChatClient, OpenAIConfig};
use docqa_rag::{
    BlobStore, ConversationContext, EmbeddingProvider, Indexer, LocalBlobStore,
    OpenAIEmbeddingProvider, QaEngine, RagConfig,
};
use docqa_voice::VoiceBridge;
use tokio::sync::Mutex;

use crate::cache::ResponseCache;
use crate::config::ServerConfig;
use crate::interactions::{InteractionLog, TracingInteractionLog};

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub indexer: Arc<Indexer>,
    pub engine: Arc<QaEngine>,
    pub bridge: Arc<VoiceBridge>,
    pub cache: Arc<ResponseCache>,
    pub conversation: Arc<Mutex<ConversationContext>>,
    pub interactions: Arc<dyn InteractionLog>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State with default cache and conversation limits and tracing-based
    /// interaction logs.
    pub fn new(
        store: Arc<dyn BlobStore>,
        indexer: Indexer,
        engine: QaEngine,
        bridge: VoiceBridge,
    ) -> Self {
        Self {
            store,
            indexer: Arc::new(indexer),
            engine: Arc::new(engine),
            bridge: Arc::new(bridge),
            cache: Arc::new(ResponseCache::default()),
            conversation: Arc::new(Mutex::new(ConversationContext::default())),
            interactions: Arc::new(TracingInteractionLog),
            max_upload_bytes: ServerConfig::default().max_upload_bytes,
        }
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    pub fn with_conversation(mut self, conversation: ConversationContext) -> Self {
        self.conversation = Arc::new(Mutex::new(conversation));
        self
    }

    pub fn with_interactions(mut self, interactions: Arc<dyn InteractionLog>) -> Self {
        self.interactions = interactions;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Wire the OpenAI-backed models, the local blob store and the voice
    /// providers described by `config`.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn BlobStore> = Arc::new(
            LocalBlobStore::new(&config.storage_dir)
                .with_public_base_url(config.public_base_url.clone()),
        );

        let mut embedder = OpenAIEmbeddingProvider::new(config.openai_api_key.clone())
            .context("failed to configure the embedding provider")?
            .with_model(config.embedding_model.clone());
        if let Some(base_url) = &config.openai_base_url {
            embedder = embedder.with_base_url(base_url.clone());
        }
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(embedder);

        let chat = |chat_config: OpenAIConfig| -> anyhow::Result<Arc<dyn Llm>> {
            let model = chat_config.model.clone();
            let client = OpenAIChatClient::new(chat_config)
                .with_context(|| format!("failed to configure chat model '{model}'"))?;
            Ok(Arc::new(client))
        };

        let rag_config = RagConfig::default();
        let indexer = Indexer::builder()
            .config(rag_config.clone())
            .store(store.clone())
            .embedding_provider(embedder.clone())
            .build()?;
        let engine = QaEngine::builder()
            .config(rag_config)
            .store(store.clone())
            .embedding_provider(embedder)
            .answer_model(chat(chat_config(config, &config.answer_model))?)
            .completion_model(chat(completion_config(config))?)
            .conversation_model(chat(chat_config(config, &config.conversation_model))?)
            .build()?;
        let bridge = VoiceBridge::from_config(&config.voice);

        Ok(Self::new(store, indexer, engine, bridge)
            .with_cache(ResponseCache::new(config.cache_capacity, config.cache_ttl))
            .with_conversation(ConversationContext::new(config.conversation_max_messages))
            .with_max_upload_bytes(config.max_upload_bytes))
    }
}

fn chat_config(config: &ServerConfig, model: &str) -> OpenAIConfig {
    let mut chat_config = OpenAIConfig::new(config.openai_api_key.clone(), model)
        .with_stream_idle_timeout(config.stream_idle_timeout);
    if let Some(base_url) = &config.openai_base_url {
        chat_config = chat_config.with_base_url(base_url.clone());
    }
    chat_config
}

/// Rephrasing and source-attributed answers run deterministically.
fn completion_config(config: &ServerConfig) -> OpenAIConfig {
    chat_config(config, &config.completion_model).with_temperature(0.0)
}
