//! Request parameters and response bodies of the HTTP API.

use docqa_voice::{InputLanguage, OutputFormat};
use serde::{Deserialize, Serialize};

pub const WELCOME_MESSAGE: &str = "Welcome to Jugalbandi API";
pub const UPLOAD_SUCCESS_MESSAGE: &str = "Files uploading is successful";

#[derive(Debug, Clone, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub uuid_number: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    pub uuid_number: String,
    pub query_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationParams {
    pub uuid_number: String,
    pub query_string: String,
    /// Keep this turn in the conversation history.
    #[serde(default)]
    pub caching: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub source_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceQueryParams {
    pub uuid_number: String,
    pub input_language: InputLanguage,
    pub output_format: OutputFormat,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub audio_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceQueryResponse {
    pub query: String,
    pub query_in_english: String,
    pub answer: String,
    pub answer_in_english: String,
    /// Empty when the answer is delivered as text.
    pub audio_output_url: String,
    pub source_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RephraseParams {
    pub query_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RephraseResponse {
    pub given_query: String,
    pub rephrased_query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_params_accept_language_names() {
        let params: VoiceQueryParams = serde_json::from_value(serde_json::json!({
            "uuid_number": "set",
            "input_language": "Kannada",
            "output_format": "Voice",
        }))
        .unwrap();
        assert_eq!(params.input_language, InputLanguage::Kannada);
        assert_eq!(params.output_format, OutputFormat::Voice);
        assert!(params.query_text.is_empty());
        assert!(params.audio_url.is_empty());
    }
}
