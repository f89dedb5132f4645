//! Capability traits implemented by speech and translation providers.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{Result, VoiceError};
use crate::language::InputLanguage;

/// Converts recorded speech into text in the spoken language.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Provider identifier, used in logs.
    fn name(&self) -> &str;

    /// Transcribe `audio` spoken in `language`.
    async fn transcribe(&self, audio: &[u8], language: InputLanguage) -> Result<String>;
}

/// Translates text between supported languages.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Provider identifier, used in logs.
    fn name(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        source: InputLanguage,
        target: InputLanguage,
    ) -> Result<String>;
}

/// Renders text as speech.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Provider identifier, used in logs.
    fn name(&self) -> &str;

    /// Synthesize `text` in `language`, returning encoded audio bytes.
    async fn synthesize(&self, text: &str, language: InputLanguage) -> Result<Vec<u8>>;
}

/// Send `request` with `body` as JSON and decode a JSON response, mapping
/// every failure to [`VoiceError::Provider`].
///
/// Transport errors are stripped of their URL, which may carry credentials.
pub(crate) async fn post_json<B, T>(
    request: reqwest::RequestBuilder,
    provider: &str,
    body: &B,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let response = request.json(body).send().await.map_err(|e| {
        let e = e.without_url();
        error!(provider, error = %e, "request failed");
        VoiceError::provider(provider, e.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(provider, %status, "API error");
        return Err(VoiceError::provider(provider, format!("API returned {status}: {body}")));
    }

    response.json().await.map_err(|e| {
        let e = e.without_url();
        error!(provider, error = %e, "failed to parse response");
        VoiceError::provider(provider, format!("failed to parse response: {e}"))
    })
}
