use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_model::MockLlm;
use docqa_rag::{
    BlobStore, EmbeddingProvider, InMemoryBlobStore, Indexer, QaEngine, RagConfig,
};
use docqa_server::{
    AppState, InteractionLog, QueryRecord, UploadRecord, VoiceQueryRecord, app_router,
};
use docqa_voice::{InputLanguage, SpeechToText, TextToSpeech, Translator, VoiceBridge};
use serde_json::Value;

const LETTERS: usize = 26;

/// Letter-frequency embedder; enough to make retrieval deterministic.
struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> docqa_rag::Result<Vec<f32>> {
        let mut vector = vec![0.0; LETTERS];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        LETTERS
    }

    fn model(&self) -> &str {
        "letters"
    }
}

struct TaggingTranslator;

#[async_trait]
impl Translator for TaggingTranslator {
    fn name(&self) -> &str {
        "tagging"
    }

    async fn translate(
        &self,
        text: &str,
        _source: InputLanguage,
        target: InputLanguage,
    ) -> docqa_voice::Result<String> {
        Ok(format!("[{}] {text}", target.code()))
    }
}

struct EchoSpeech;

#[async_trait]
impl SpeechToText for EchoSpeech {
    fn name(&self) -> &str {
        "echo"
    }

    async fn transcribe(&self, audio: &[u8], _language: InputLanguage) -> docqa_voice::Result<String> {
        Ok(String::from_utf8_lossy(audio).into_owned())
    }
}

struct FixedAudio;

#[async_trait]
impl TextToSpeech for FixedAudio {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn synthesize(&self, _text: &str, _language: InputLanguage) -> docqa_voice::Result<Vec<u8>> {
        Ok(b"ID3 fake mp3".to_vec())
    }
}

/// Owned copy of a record, kept by [`RecordingLog`].
#[derive(Debug, Clone, PartialEq)]
struct Logged {
    kind: &'static str,
    document_set: Option<String>,
    answer: String,
    error: Option<String>,
}

#[derive(Default)]
struct RecordingLog(Mutex<Vec<Logged>>);

impl RecordingLog {
    fn entries(&self) -> Vec<Logged> {
        self.0.lock().unwrap().clone()
    }
}

impl InteractionLog for RecordingLog {
    fn record_query(&self, record: QueryRecord<'_>) {
        self.0.lock().unwrap().push(Logged {
            kind: record.endpoint,
            document_set: Some(record.document_set.to_string()),
            answer: record.answer.to_string(),
            error: record.error.map(str::to_string),
        });
    }

    fn record_voice_query(&self, record: VoiceQueryRecord<'_>) {
        self.0.lock().unwrap().push(Logged {
            kind: "voice",
            document_set: Some(record.document_set.to_string()),
            answer: record.answer.to_string(),
            error: record.error.map(str::to_string),
        });
    }

    fn record_upload(&self, record: UploadRecord<'_>) {
        self.0.lock().unwrap().push(Logged {
            kind: "upload",
            document_set: record.document_set.map(str::to_string),
            answer: String::new(),
            error: record.error.map(str::to_string),
        });
    }
}

fn test_state(model: Arc<MockLlm>) -> AppState {
    let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LetterEmbedder);
    let config = RagConfig::builder().chunk_size(200).chunk_overlap(20).top_k(2).build().unwrap();

    let indexer = Indexer::builder()
        .config(config.clone())
        .store(store.clone())
        .embedding_provider(embedder.clone())
        .build()
        .unwrap();
    let engine = QaEngine::builder()
        .config(config)
        .store(store.clone())
        .embedding_provider(embedder)
        .answer_model(model)
        .build()
        .unwrap();
    let bridge = VoiceBridge::new(Arc::new(EchoSpeech), Arc::new(TaggingTranslator), Arc::new(FixedAudio));

    AppState::new(store, indexer, engine, bridge)
}

async fn spawn_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn upload_sample(client: &reqwest::Client, base: &str) -> String {
    let archive = zip_archive(&[
        ("docs/rivers.txt", "The Ganga flows through the northern plains."),
        ("docs/hills.txt", "The Nilgiri hills are in the south."),
        ("__MACOSX/docs/._rivers.txt", "resource fork"),
    ]);
    let form = reqwest::multipart::Form::new()
        .part("files", reqwest::multipart::Part::bytes(archive).file_name("docs.zip"));

    let response = client
        .post(format!("{}/upload-files", base))
        .query(&[("description", "geography notes")])
        .multipart(form)
        .send()
        .await
        .expect("upload response");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("upload json");
    assert_eq!(body["message"], "Files uploading is successful");
    body["uuid_number"].as_str().expect("uuid_number field").to_string()
}

#[tokio::test]
async fn root_and_health_respond() {
    let (base, handle) = spawn_server(test_state(Arc::new(MockLlm::new("mock")))).await;
    let client = reqwest::Client::new();

    let root: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(root["message"], "Welcome to Jugalbandi API");

    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert!(health.status().is_success());

    handle.abort();
}

#[tokio::test]
async fn unknown_document_set_is_rejected_before_any_model_call() {
    let model = Arc::new(MockLlm::new("mock"));
    let (base, handle) = spawn_server(test_state(model.clone())).await;
    let client = reqwest::Client::new();

    for path in ["query-with-langchain", "query-with-langchain-gpt4"] {
        let response = client
            .get(format!("{}/{}", base, path))
            .query(&[("uuid_number", "no-such-set"), ("query_string", "anything")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["detail"], "The UUID number is incorrect");
    }
    assert_eq!(model.call_count(), 0);

    handle.abort();
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let model = Arc::new(MockLlm::new("mock").with_default_reply("The Ganga is in the north."));
    let (base, handle) = spawn_server(test_state(model.clone())).await;
    let client = reqwest::Client::new();
    let set = upload_sample(&client, &base).await;

    let mut bodies = Vec::new();
    for query in ["Where is the Ganga?", "WHERE IS THE GANGA?"] {
        let response = client
            .get(format!("{}/query-with-langchain-gpt4", base))
            .query(&[("uuid_number", set.as_str()), ("query_string", query)])
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        bodies.push(response.json::<Value>().await.unwrap());
    }

    assert_eq!(model.call_count(), 1);
    assert_eq!(bodies[0]["answer"], "The Ganga is in the north.");
    assert_eq!(bodies[0]["query"], "Where is the Ganga?");
    assert_eq!(bodies[0]["answer"], bodies[1]["answer"]);

    handle.abort();
}

#[tokio::test]
async fn source_attributed_query_returns_cited_text() {
    let model = Arc::new(
        MockLlm::new("mock")
            .with_reply(Ok("Which river flows through the plains?".into()))
            .with_reply(Ok("The Ganga.\nSOURCES: 0".into())),
    );
    let (base, handle) = spawn_server(test_state(model.clone())).await;
    let client = reqwest::Client::new();
    let set = upload_sample(&client, &base).await;

    let body: Value = client
        .get(format!("{}/query-with-langchain", base))
        .query(&[("uuid_number", set.as_str()), ("query_string", "river?")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["query"], "river?");
    assert_eq!(body["answer"], "The Ganga.");
    // Documents are indexed in name order, so chunk 0 is hills.txt.
    assert_eq!(body["source_text"], "The Nilgiri hills are in the south.\n\n");
    assert_eq!(model.call_count(), 2);

    handle.abort();
}

#[tokio::test]
async fn streaming_query_is_sent_as_sse_and_cached_as_text() {
    let model = Arc::new(MockLlm::new("mock").with_default_reply("one two three"));
    let (base, handle) = spawn_server(test_state(model.clone())).await;
    let client = reqwest::Client::new();

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let response = client
            .get(format!("{}/query-with-langchain-gpt4_streaming", base))
            .query(&[("uuid_number", "storybot"), ("query_string", "a story")])
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        let content_type = response.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));
        bodies.push(response.text().await.unwrap());
    }

    assert!(bodies[0].contains("data: one "));
    assert!(bodies[0].contains("data: three"));
    assert!(bodies[1].contains("data: one two three"));
    assert_eq!(model.call_count(), 1);

    handle.abort();
}

#[tokio::test]
async fn streaming_failure_before_first_fragment_is_an_error_response() {
    let model = Arc::new(MockLlm::new("mock").with_reply(Err(docqa_model::ModelError::from_status(
        "OpenAI", 503, "overloaded",
    ))));
    let (base, handle) = spawn_server(test_state(model)).await;

    let response = reqwest::Client::new()
        .get(format!("{}/query-with-langchain-gpt4_streaming", base))
        .query(&[("uuid_number", "storybot"), ("query_string", "a story")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);

    handle.abort();
}

#[tokio::test]
async fn remembered_conversation_sends_history() {
    let model = Arc::new(MockLlm::new("mock").with_default_reply("question,option_a"));
    let (base, handle) = spawn_server(test_state(model.clone())).await;
    let client = reqwest::Client::new();

    for query in ["five java questions", "five more"] {
        let response = client
            .get(format!("{}/query-with-langchain-gpt4-mcq", base))
            .query(&[("uuid_number", "tech"), ("query_string", query), ("caching", "true")])
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let requests = model.requests();
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[1].len(), 5);

    handle.abort();
}

#[tokio::test]
async fn voice_query_without_input_is_rejected() {
    let (base, handle) = spawn_server(test_state(Arc::new(MockLlm::new("mock")))).await;

    let response = reqwest::Client::new()
        .get(format!("{}/query-using-voice", base))
        .query(&[("uuid_number", "storybot"), ("input_language", "Hindi"), ("output_format", "Text")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Either 'Query Text' or 'Audio URL' should be present");

    handle.abort();
}

#[tokio::test]
async fn voice_query_translates_and_serves_synthesized_audio() {
    let model = Arc::new(MockLlm::new("mock").with_default_reply("Once upon a time"));
    let (base, handle) = spawn_server(test_state(model.clone())).await;
    let client = reqwest::Client::new();

    let text: Value = client
        .get(format!("{}/query-using-voice", base))
        .query(&[
            ("uuid_number", "storybot"),
            ("input_language", "Hindi"),
            ("output_format", "Text"),
            ("query_text", "kahani"),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(text["query"], "kahani");
    assert_eq!(text["query_in_english"], "[en] kahani");
    assert_eq!(text["answer_in_english"], "Once upon a time");
    assert_eq!(text["answer"], "[hi] Once upon a time");
    assert_eq!(text["audio_output_url"], "");

    let voice: Value = client
        .get(format!("{}/query-using-voice", base))
        .query(&[
            ("uuid_number", "storybot"),
            ("input_language", "Hindi"),
            ("output_format", "Voice"),
            ("query_text", "kahani"),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let url = voice["audio_output_url"].as_str().unwrap();
    assert!(url.starts_with("/files/output_audio_files/"));
    assert!(url.ends_with(".mp3"));
    assert_eq!(model.requests()[1].last().unwrap().content, "[en] kahani");

    let audio = client.get(format!("{}{}", base, url)).send().await.unwrap();
    assert!(audio.status().is_success());
    assert_eq!(audio.bytes().await.unwrap().as_ref(), b"ID3 fake mp3");

    handle.abort();
}

#[tokio::test]
async fn upload_without_files_is_a_bad_request() {
    let (base, handle) = spawn_server(test_state(Arc::new(MockLlm::new("mock")))).await;

    let form = reqwest::multipart::Form::new().text("note", "nothing here");
    let response = reqwest::Client::new()
        .post(format!("{}/upload-files", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    handle.abort();
}

#[tokio::test]
async fn rephrased_query_echoes_the_given_query() {
    let model = Arc::new(MockLlm::new("mock").with_default_reply("  What does QuML stand for?  "));
    let (base, handle) = spawn_server(test_state(model)).await;

    let body: Value = reqwest::Client::new()
        .get(format!("{}/rephrased-query", base))
        .query(&[("query_string", "quml?")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["given_query"], "quml?");
    assert_eq!(body["rephrased_query"], "What does QuML stand for?");

    handle.abort();
}

#[tokio::test]
async fn failed_queries_are_logged_with_their_error() {
    let model = Arc::new(
        MockLlm::new("mock")
            .with_reply(Err(docqa_model::ModelError::from_status("OpenAI", 503, "overloaded")))
            .with_default_reply("Once upon a time"),
    );
    let log = Arc::new(RecordingLog::default());
    let state = test_state(model).with_interactions(log.clone());
    let (base, handle) = spawn_server(state).await;
    let client = reqwest::Client::new();

    let unknown = client
        .get(format!("{}/query-with-langchain", base))
        .query(&[("uuid_number", "no-such-set"), ("query_string", "anything")])
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 422);

    for expected in [503, 200] {
        let response = client
            .get(format!("{}/query-with-langchain-gpt4", base))
            .query(&[("uuid_number", "storybot"), ("query_string", "a story")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }

    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].kind, "query-with-langchain");
    assert_eq!(entries[0].document_set.as_deref(), Some("no-such-set"));
    assert_eq!(entries[0].error.as_deref(), Some("The UUID number is incorrect"));
    assert_eq!(entries[1].kind, "query-with-langchain-gpt4");
    assert!(entries[1].error.is_some());
    assert_eq!(entries[1].answer, "");
    assert_eq!(entries[2].error, None);
    assert_eq!(entries[2].answer, "Once upon a time");

    handle.abort();
}

#[tokio::test]
async fn rejected_voice_query_and_upload_are_logged() {
    let log = Arc::new(RecordingLog::default());
    let state = test_state(Arc::new(MockLlm::new("mock"))).with_interactions(log.clone());
    let (base, handle) = spawn_server(state).await;
    let client = reqwest::Client::new();

    let voice = client
        .get(format!("{}/query-using-voice", base))
        .query(&[("uuid_number", "storybot"), ("input_language", "Hindi"), ("output_format", "Text")])
        .send()
        .await
        .unwrap();
    assert_eq!(voice.status(), 422);

    let form = reqwest::multipart::Form::new().text("note", "nothing here");
    let upload = client.post(format!("{}/upload-files", base)).multipart(form).send().await.unwrap();
    assert_eq!(upload.status(), 400);

    let entries = log.entries();
    assert_eq!(
        entries,
        vec![
            Logged {
                kind: "voice",
                document_set: Some("storybot".to_string()),
                answer: String::new(),
                error: Some("Either 'Query Text' or 'Audio URL' should be present".to_string()),
            },
            Logged {
                kind: "upload",
                document_set: None,
                answer: String::new(),
                error: Some("No files were uploaded".to_string()),
            },
        ]
    );

    handle.abort();
}
