//! Two-tier provider chains.
//!
//! Every tier runs under the same timeout. A primary failure or timeout is
//! logged and the secondary is tried; if it fails too the capability is
//! reported as [`VoiceError::ServiceUnavailable`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Result, VoiceError};
use crate::language::InputLanguage;
use crate::provider::{SpeechToText, TextToSpeech, Translator};

/// Default per-provider timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

async fn attempt<T>(
    provider: &str,
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(VoiceError::Timeout { provider: provider.to_string(), timeout }),
    }
}

async fn with_fallback<T>(
    capability: &'static str,
    timeout: Duration,
    primary: (&str, impl Future<Output = Result<T>>),
    secondary: (&str, impl Future<Output = Result<T>>),
) -> Result<T> {
    let (primary_name, primary_call) = primary;
    let (secondary_name, secondary_call) = secondary;

    match attempt(primary_name, timeout, primary_call).await {
        Ok(value) => return Ok(value),
        Err(e) => {
            warn!(capability, provider = primary_name, error = %e, "primary provider failed, falling back");
        }
    }
    match attempt(secondary_name, timeout, secondary_call).await {
        Ok(value) => {
            info!(capability, provider = secondary_name, "served by fallback provider");
            Ok(value)
        }
        Err(e) => {
            warn!(capability, provider = secondary_name, error = %e, "fallback provider failed");
            Err(VoiceError::ServiceUnavailable { capability })
        }
    }
}

/// Speech recognition with a fallback provider.
pub struct FallbackSpeechToText {
    primary: Arc<dyn SpeechToText>,
    secondary: Arc<dyn SpeechToText>,
    timeout: Duration,
}

impl FallbackSpeechToText {
    pub fn new(primary: Arc<dyn SpeechToText>, secondary: Arc<dyn SpeechToText>) -> Self {
        Self { primary, secondary, timeout: DEFAULT_PROVIDER_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SpeechToText for FallbackSpeechToText {
    fn name(&self) -> &str {
        "speech-to-text"
    }

    async fn transcribe(&self, audio: &[u8], language: InputLanguage) -> Result<String> {
        with_fallback(
            "speech recognition",
            self.timeout,
            (self.primary.name(), self.primary.transcribe(audio, language)),
            (self.secondary.name(), self.secondary.transcribe(audio, language)),
        )
        .await
    }
}

/// Translation with a fallback provider.
pub struct FallbackTranslator {
    primary: Arc<dyn Translator>,
    secondary: Arc<dyn Translator>,
    timeout: Duration,
}

impl FallbackTranslator {
    pub fn new(primary: Arc<dyn Translator>, secondary: Arc<dyn Translator>) -> Self {
        Self { primary, secondary, timeout: DEFAULT_PROVIDER_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Translator for FallbackTranslator {
    fn name(&self) -> &str {
        "translation"
    }

    async fn translate(
        &self,
        text: &str,
        source: InputLanguage,
        target: InputLanguage,
    ) -> Result<String> {
        with_fallback(
            "translation",
            self.timeout,
            (self.primary.name(), self.primary.translate(text, source, target)),
            (self.secondary.name(), self.secondary.translate(text, source, target)),
        )
        .await
    }
}

/// Speech synthesis with a fallback provider.
pub struct FallbackTextToSpeech {
    primary: Arc<dyn TextToSpeech>,
    secondary: Arc<dyn TextToSpeech>,
    timeout: Duration,
}

impl FallbackTextToSpeech {
    pub fn new(primary: Arc<dyn TextToSpeech>, secondary: Arc<dyn TextToSpeech>) -> Self {
        Self { primary, secondary, timeout: DEFAULT_PROVIDER_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TextToSpeech for FallbackTextToSpeech {
    fn name(&self) -> &str {
        "text-to-speech"
    }

    async fn synthesize(&self, text: &str, language: InputLanguage) -> Result<Vec<u8>> {
        with_fallback(
            "speech synthesis",
            self.timeout,
            (self.primary.name(), self.primary.synthesize(text, language)),
            (self.secondary.name(), self.secondary.synthesize(text, language)),
        )
        .await
    }
}
