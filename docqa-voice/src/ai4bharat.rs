//! AI4Bharat ASR, NMT and TTS REST providers.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{Result, VoiceError};
use crate::language::InputLanguage;
use crate::provider::{SpeechToText, TextToSpeech, Translator, post_json};

pub const DEFAULT_ASR_URL: &str = "https://asr-api.ai4bharat.org/asr/v1/recognize";
pub const DEFAULT_NMT_URL: &str = "https://nmt-api.ai4bharat.org/translate_sentence";
pub const DEFAULT_TTS_URL: &str = "https://tts-api.ai4bharat.org/";

/// Speech recognition via `{base}/{language code}`.
#[derive(Debug, Clone)]
pub struct Ai4BharatAsr {
    client: reqwest::Client,
    base_url: String,
}

impl Ai4BharatAsr {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[derive(Deserialize)]
struct AsrResponse {
    output: Vec<AsrOutput>,
}

#[derive(Deserialize)]
struct AsrOutput {
    source: String,
}

#[async_trait]
impl SpeechToText for Ai4BharatAsr {
    fn name(&self) -> &str {
        "ai4bharat-asr"
    }

    async fn transcribe(&self, audio: &[u8], language: InputLanguage) -> Result<String> {
        let body = json!({
            "config": {
                "language": {"sourceLanguage": language.code()},
                "transcriptionFormat": {"value": "transcript"},
                "audioFormat": "wav",
                "samplingRate": "16000",
                "postProcessors": null,
            },
            "audio": [{"audioContent": STANDARD.encode(audio)}],
        });
        let url = format!("{}/{}", self.base_url, language.code());
        let response: AsrResponse = post_json(self.client.post(&url), self.name(), &body).await?;
        response
            .output
            .into_iter()
            .next()
            .map(|o| o.source)
            .ok_or_else(|| VoiceError::provider(self.name(), "no transcript returned"))
    }
}

/// Neural machine translation.
#[derive(Debug, Clone)]
pub struct Ai4BharatTranslator {
    client: reqwest::Client,
    url: String,
}

impl Ai4BharatTranslator {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[derive(Deserialize)]
struct NmtResponse {
    text: String,
}

#[async_trait]
impl Translator for Ai4BharatTranslator {
    fn name(&self) -> &str {
        "ai4bharat-nmt"
    }

    async fn translate(
        &self,
        text: &str,
        source: InputLanguage,
        target: InputLanguage,
    ) -> Result<String> {
        let body = json!({
            "source_language": source.code(),
            "target_language": target.code(),
            "text": text,
        });
        let response: NmtResponse = post_json(self.client.post(&self.url), self.name(), &body).await?;
        debug!(source = source.code(), target = target.code(), "translated text");
        Ok(response.text)
    }
}

/// Speech synthesis with a female voice.
#[derive(Debug, Clone)]
pub struct Ai4BharatTts {
    client: reqwest::Client,
    url: String,
    gender: String,
}

impl Ai4BharatTts {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into(), gender: "female".to_string() }
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }
}

#[derive(Deserialize)]
struct TtsResponse {
    audio: Vec<TtsAudio>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsAudio {
    audio_content: String,
}

#[async_trait]
impl TextToSpeech for Ai4BharatTts {
    fn name(&self) -> &str {
        "ai4bharat-tts"
    }

    async fn synthesize(&self, text: &str, language: InputLanguage) -> Result<Vec<u8>> {
        let body = json!({
            "input": [{"source": text}],
            "config": {"gender": self.gender, "language": {"sourceLanguage": language.code()}},
        });
        let response: TtsResponse = post_json(self.client.post(&self.url), self.name(), &body).await?;
        let encoded = response
            .audio
            .into_iter()
            .next()
            .ok_or_else(|| VoiceError::provider(self.name(), "no audio returned"))?;
        STANDARD
            .decode(encoded.audio_content)
            .map_err(|e| VoiceError::provider(self.name(), format!("invalid audio encoding: {e}")))
    }
}
