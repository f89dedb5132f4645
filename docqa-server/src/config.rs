//! Server configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use docqa_voice::VoiceConfig;
use docqa_voice::ai4bharat::{DEFAULT_ASR_URL, DEFAULT_NMT_URL, DEFAULT_TTS_URL};

/// Everything needed to start the HTTP service.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root directory of the local blob store.
    pub storage_dir: PathBuf,
    /// Base of the public URLs handed out for stored audio.
    pub public_base_url: String,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    /// Upper bound on the body of an upload request.
    pub max_upload_bytes: usize,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    /// Model for raw-context and streamed answers.
    pub answer_model: String,
    /// Model for rephrasing and source-attributed answers.
    pub completion_model: String,
    /// Model for multi-turn question-bank conversations.
    pub conversation_model: String,
    pub embedding_model: String,
    pub stream_idle_timeout: Option<Duration>,
    pub conversation_max_messages: usize,
    pub voice: VoiceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            storage_dir: PathBuf::from("./data"),
            public_base_url: "http://127.0.0.1:8000".to_string(),
            cache_ttl: Duration::from_secs(86_400),
            cache_capacity: 100,
            max_upload_bytes: 50 * 1024 * 1024,
            openai_api_key: String::new(),
            openai_base_url: None,
            answer_model: "gpt-4".to_string(),
            completion_model: "gpt-3.5-turbo".to_string(),
            conversation_model: "gpt-3.5-turbo-16k".to_string(),
            embedding_model: docqa_rag::openai::DEFAULT_EMBEDDING_MODEL.to_string(),
            stream_idle_timeout: None,
            conversation_max_messages: docqa_rag::conversation::DEFAULT_MAX_MESSAGES,
            voice: VoiceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unset or empty
    /// variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let host = var("DOCQA_HOST").unwrap_or(defaults.host);
        let port = parse_var(&var, "DOCQA_PORT")?.unwrap_or(defaults.port);
        let public_base_url = var("DOCQA_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let voice = VoiceConfig {
            google_api_key: var("GOOGLE_API_KEY").unwrap_or_default(),
            asr_url: var("AI4BHARAT_ASR_URL").unwrap_or_else(|| DEFAULT_ASR_URL.to_string()),
            nmt_url: var("AI4BHARAT_NMT_URL").unwrap_or_else(|| DEFAULT_NMT_URL.to_string()),
            tts_url: var("AI4BHARAT_TTS_URL").unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            provider_timeout: parse_var(&var, "DOCQA_PROVIDER_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.voice.provider_timeout),
            audio_root: var("DOCQA_AUDIO_ROOT").map(PathBuf::from),
        };

        Ok(Self {
            host,
            port,
            storage_dir: var("DOCQA_STORAGE_DIR").map(PathBuf::from).unwrap_or(defaults.storage_dir),
            public_base_url,
            cache_ttl: parse_var(&var, "CACHE_TTL")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_capacity: parse_var(&var, "DOCQA_CACHE_CAPACITY")?
                .unwrap_or(defaults.cache_capacity),
            max_upload_bytes: parse_var(&var, "DOCQA_MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            openai_api_key: var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: var("OPENAI_BASE_URL"),
            answer_model: var("DOCQA_ANSWER_MODEL").unwrap_or(defaults.answer_model),
            completion_model: var("DOCQA_COMPLETION_MODEL").unwrap_or(defaults.completion_model),
            conversation_model: var("DOCQA_CONVERSATION_MODEL")
                .unwrap_or(defaults.conversation_model),
            embedding_model: var("DOCQA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            stream_idle_timeout: parse_var(&var, "DOCQA_STREAM_IDLE_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            conversation_max_messages: parse_var(&var, "DOCQA_CONVERSATION_MAX_MESSAGES")?
                .unwrap_or(defaults.conversation_max_messages),
            voice,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|value| value.trim().parse::<T>().with_context(|| format!("invalid value for {key}: '{value}'")))
        .transpose()
}
