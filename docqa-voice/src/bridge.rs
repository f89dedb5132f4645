//! The translation and voice bridge around the English answering pipeline.
//!
//! A voice query moves through these states:
//!
//! ```text
//! raw input -> normalized English text -> (answering) -> regional answer -> audio
//! ```
//!
//! The last step only runs when voice output is required.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::ai4bharat::{
    Ai4BharatAsr, Ai4BharatTranslator, Ai4BharatTts, DEFAULT_ASR_URL, DEFAULT_NMT_URL,
    DEFAULT_TTS_URL,
};
use crate::audio::AudioLoader;
use crate::error::{Result, VoiceError};
use crate::fallback::{
    DEFAULT_PROVIDER_TIMEOUT, FallbackSpeechToText, FallbackTextToSpeech, FallbackTranslator,
};
use crate::google::{GoogleCloud, GoogleSpeech, GoogleTranslate, GoogleTts};
use crate::language::{InputLanguage, OutputFormat};
use crate::provider::{SpeechToText, TextToSpeech, Translator};

/// Provider endpoints and credentials for [`VoiceBridge::from_config`].
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub google_api_key: String,
    pub asr_url: String,
    pub nmt_url: String,
    pub tts_url: String,
    pub provider_timeout: Duration,
    /// Directory that local query audio may be read from. `None` accepts
    /// only audio URLs.
    pub audio_root: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            google_api_key: String::new(),
            asr_url: DEFAULT_ASR_URL.to_string(),
            nmt_url: DEFAULT_NMT_URL.to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            audio_root: None,
        }
    }
}

/// A query after it has been brought into English.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    /// The query in the user's language, typed or transcribed.
    pub query: String,
    /// The query translated to English.
    pub query_in_english: String,
    /// Whether the query was spoken.
    pub from_audio: bool,
}

impl NormalizedQuery {
    /// Spoken queries are always answered with audio.
    pub fn wants_voice(&self, requested: OutputFormat) -> bool {
        self.from_audio || requested == OutputFormat::Voice
    }
}

/// Converts regional text or speech to English and answers back.
pub struct VoiceBridge {
    speech_to_text: Arc<dyn SpeechToText>,
    translator: Arc<dyn Translator>,
    text_to_speech: Arc<dyn TextToSpeech>,
    audio_loader: AudioLoader,
}

impl VoiceBridge {
    pub fn new(
        speech_to_text: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
        text_to_speech: Arc<dyn TextToSpeech>,
    ) -> Self {
        Self { speech_to_text, translator, text_to_speech, audio_loader: AudioLoader::default() }
    }

    /// Wire the standard chains: Google then AI4Bharat for recognition,
    /// AI4Bharat then Google for translation and synthesis.
    pub fn from_config(config: &VoiceConfig) -> Self {
        let client = reqwest::Client::new();
        let google = GoogleCloud::new(client.clone(), config.google_api_key.clone());

        let speech_to_text = FallbackSpeechToText::new(
            Arc::new(GoogleSpeech(google.clone())),
            Arc::new(Ai4BharatAsr::new(client.clone(), config.asr_url.clone())),
        )
        .with_timeout(config.provider_timeout);
        let translator = FallbackTranslator::new(
            Arc::new(Ai4BharatTranslator::new(client.clone(), config.nmt_url.clone())),
            Arc::new(GoogleTranslate(google.clone())),
        )
        .with_timeout(config.provider_timeout);
        let text_to_speech = FallbackTextToSpeech::new(
            Arc::new(Ai4BharatTts::new(client.clone(), config.tts_url.clone())),
            Arc::new(GoogleTts(google)),
        )
        .with_timeout(config.provider_timeout);

        let mut audio_loader = AudioLoader::new(client);
        if let Some(root) = &config.audio_root {
            audio_loader = audio_loader.with_local_root(root.clone());
        }
        Self::new(Arc::new(speech_to_text), Arc::new(translator), Arc::new(text_to_speech))
            .with_audio_loader(audio_loader)
    }

    pub fn with_audio_loader(mut self, audio_loader: AudioLoader) -> Self {
        self.audio_loader = audio_loader;
        self
    }

    /// Bring a typed or spoken query into English.
    ///
    /// Typed text wins when both are given.
    ///
    /// # Errors
    ///
    /// [`VoiceError::MissingInput`] when both inputs are empty.
    #[instrument(skip(self, query_text, audio_reference))]
    pub async fn normalize_input(
        &self,
        language: InputLanguage,
        query_text: &str,
        audio_reference: &str,
    ) -> Result<NormalizedQuery> {
        if query_text.is_empty() && audio_reference.is_empty() {
            return Err(VoiceError::MissingInput);
        }

        let (query, from_audio) = if !query_text.is_empty() {
            (query_text.to_string(), false)
        } else {
            let audio = self.audio_loader.load(audio_reference).await?;
            let transcript = self.speech_to_text.transcribe(&audio, language).await?;
            debug!(transcript_len = transcript.len(), "transcribed query audio");
            (transcript, true)
        };

        let query_in_english = self.translate(&query, language, InputLanguage::English).await?;
        Ok(NormalizedQuery { query, query_in_english, from_audio })
    }

    /// Translate an English answer into `language`.
    pub async fn localize_answer(&self, language: InputLanguage, answer: &str) -> Result<String> {
        self.translate(answer, InputLanguage::English, language).await
    }

    /// Render `text` in `language` as audio.
    pub async fn synthesize(&self, language: InputLanguage, text: &str) -> Result<Vec<u8>> {
        self.text_to_speech.synthesize(text, language).await
    }

    async fn translate(
        &self,
        text: &str,
        source: InputLanguage,
        target: InputLanguage,
    ) -> Result<String> {
        if source == target {
            return Ok(text.to_string());
        }
        self.translator.translate(text, source, target).await
    }
}
