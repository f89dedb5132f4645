//! Google Cloud Speech-to-Text, Translation and Text-to-Speech over REST,
//! authenticated with an API key.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;

use crate::audio::AudioFormat;
use crate::error::{Result, VoiceError};
use crate::language::InputLanguage;
use crate::provider::{SpeechToText, TextToSpeech, Translator, post_json};

const SPEECH_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";
const TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";
const TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Shared credentials for the Google REST providers.
#[derive(Debug, Clone)]
pub struct GoogleCloud {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleCloud {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self { client, api_key: api_key.into() }
    }

    /// A POST to `endpoint` carrying the key in a header, so it never
    /// appears in URLs or the errors that echo them.
    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.client.post(endpoint).header(API_KEY_HEADER, &self.api_key)
    }
}

/// Recognizes LINEAR16 audio at 16kHz in the `{code}-IN` locale.
#[derive(Debug, Clone)]
pub struct GoogleSpeech(pub GoogleCloud);

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Deserialize)]
struct RecognitionAlternative {
    transcript: String,
}

#[async_trait]
impl SpeechToText for GoogleSpeech {
    fn name(&self) -> &str {
        "google-speech"
    }

    async fn transcribe(&self, audio: &[u8], language: InputLanguage) -> Result<String> {
        let body = json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": AudioFormat::pcm16_16khz().sample_rate,
                "languageCode": language.indian_locale(),
            },
            "audio": {"content": STANDARD.encode(audio)},
        });
        let response: RecognizeResponse =
            post_json(self.0.post(SPEECH_URL), self.name(), &body).await?;
        response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .ok_or_else(|| VoiceError::provider(self.name(), "no transcript returned"))
    }
}

/// Google Translate v2.
#[derive(Debug, Clone)]
pub struct GoogleTranslate(pub GoogleCloud);

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[async_trait]
impl Translator for GoogleTranslate {
    fn name(&self) -> &str {
        "google-translate"
    }

    async fn translate(
        &self,
        text: &str,
        source: InputLanguage,
        target: InputLanguage,
    ) -> Result<String> {
        let body = json!({
            "q": [text],
            "source": source.code(),
            "target": target.code(),
            "format": "text",
        });
        let response: TranslateResponse =
            post_json(self.0.post(TRANSLATE_URL), self.name(), &body).await?;
        response
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| VoiceError::provider(self.name(), "no translation returned"))
    }
}

/// Female-voice MP3 synthesis.
#[derive(Debug, Clone)]
pub struct GoogleTts(pub GoogleCloud);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[async_trait]
impl TextToSpeech for GoogleTts {
    fn name(&self) -> &str {
        "google-tts"
    }

    async fn synthesize(&self, text: &str, language: InputLanguage) -> Result<Vec<u8>> {
        let body = json!({
            "input": {"text": text},
            "voice": {"languageCode": language.indian_locale(), "ssmlGender": "FEMALE"},
            "audioConfig": {"audioEncoding": "MP3"},
        });
        let response: SynthesizeResponse =
            post_json(self.0.post(TTS_URL), self.name(), &body).await?;
        STANDARD
            .decode(response.audio_content)
            .map_err(|e| VoiceError::provider(self.name(), format!("invalid audio encoding: {e}")))
    }
}
