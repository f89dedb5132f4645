//! # docqa-voice
//!
//! Bridges regional-language text and speech to the English answering
//! pipeline.
//!
//! Each capability (speech-to-text, translation, text-to-speech) sits
//! behind a trait and is wired as a two-tier fallback: a failing or slow
//! primary provider is logged and the secondary is tried. Only when both
//! fail does the caller see [`VoiceError::ServiceUnavailable`].
//!
//! ```rust,ignore
//! use docqa_voice::{InputLanguage, VoiceBridge};
//!
//! let bridge = VoiceBridge::from_config(&config);
//! let query = bridge.normalize_input(InputLanguage::Hindi, "", "https://example.org/q.wav").await?;
//! let regional = bridge.localize_answer(InputLanguage::Hindi, &english_answer).await?;
//! let mp3 = bridge.synthesize(InputLanguage::Hindi, &regional).await?;
//! ```

pub mod ai4bharat;
pub mod audio;
pub mod bridge;
pub mod error;
pub mod fallback;
pub mod google;
pub mod language;
pub mod provider;

pub use audio::{AudioFormat, AudioLoader, AudioSource};
pub use bridge::{NormalizedQuery, VoiceBridge, VoiceConfig};
pub use error::{Result, VoiceError};
pub use fallback::{FallbackSpeechToText, FallbackTextToSpeech, FallbackTranslator};
pub use language::{InputLanguage, OutputFormat};
pub use provider::{SpeechToText, TextToSpeech, Translator};
