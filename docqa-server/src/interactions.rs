//! Interaction logging for queries and uploads.
//!
//! Every request to a query or upload endpoint produces exactly one record,
//! whether it succeeded or not. Failed requests carry the error detail sent
//! to the client and leave the answer fields empty.

use docqa_voice::{InputLanguage, OutputFormat};
use tracing::{info, warn};

/// A query handled by one of the text endpoints.
#[derive(Debug, Clone, Copy)]
pub struct QueryRecord<'a> {
    pub endpoint: &'static str,
    pub document_set: &'a str,
    pub query: &'a str,
    pub paraphrased_query: Option<&'a str>,
    pub answer: &'a str,
    pub source_text: &'a str,
    pub cached: bool,
    pub error: Option<&'a str>,
}

/// A query handled by the voice endpoint.
#[derive(Debug, Clone, Copy)]
pub struct VoiceQueryRecord<'a> {
    pub document_set: &'a str,
    pub input_language: InputLanguage,
    pub output_format: OutputFormat,
    pub query: &'a str,
    pub query_in_english: &'a str,
    pub answer: &'a str,
    pub answer_in_english: &'a str,
    pub audio_input_url: &'a str,
    pub audio_output_url: &'a str,
    pub error: Option<&'a str>,
}

/// An upload request. `document_set` is `None` when indexing never
/// produced one.
#[derive(Debug, Clone, Copy)]
pub struct UploadRecord<'a> {
    pub document_set: Option<&'a str>,
    pub documents: &'a [String],
    pub description: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Receives a record of every query and upload request.
pub trait InteractionLog: Send + Sync {
    fn record_query(&self, record: QueryRecord<'_>);

    fn record_voice_query(&self, record: VoiceQueryRecord<'_>);

    fn record_upload(&self, record: UploadRecord<'_>);
}

/// Emits interactions as structured events on the `docqa::interactions`
/// target. Failures are emitted at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInteractionLog;

impl InteractionLog for TracingInteractionLog {
    fn record_query(&self, record: QueryRecord<'_>) {
        match record.error {
            None => info!(
                target: "docqa::interactions",
                endpoint = record.endpoint,
                document_set = record.document_set,
                query = record.query,
                paraphrased_query = record.paraphrased_query,
                answer = record.answer,
                source_text = record.source_text,
                cached = record.cached,
                "query answered"
            ),
            Some(error) => warn!(
                target: "docqa::interactions",
                endpoint = record.endpoint,
                document_set = record.document_set,
                query = record.query,
                answer = record.answer,
                error,
                "query failed"
            ),
        }
    }

    fn record_voice_query(&self, record: VoiceQueryRecord<'_>) {
        match record.error {
            None => info!(
                target: "docqa::interactions",
                document_set = record.document_set,
                input_language = %record.input_language,
                output_format = %record.output_format,
                query = record.query,
                query_in_english = record.query_in_english,
                answer = record.answer,
                answer_in_english = record.answer_in_english,
                audio_input_url = record.audio_input_url,
                audio_output_url = record.audio_output_url,
                "voice query answered"
            ),
            Some(error) => warn!(
                target: "docqa::interactions",
                document_set = record.document_set,
                input_language = %record.input_language,
                output_format = %record.output_format,
                query = record.query,
                audio_input_url = record.audio_input_url,
                error,
                "voice query failed"
            ),
        }
    }

    fn record_upload(&self, record: UploadRecord<'_>) {
        match record.error {
            None => info!(
                target: "docqa::interactions",
                document_set = record.document_set,
                documents = ?record.documents,
                description = record.description,
                "document set uploaded"
            ),
            Some(error) => warn!(
                target: "docqa::interactions",
                documents = ?record.documents,
                description = record.description,
                error,
                "upload failed"
            ),
        }
    }
}
