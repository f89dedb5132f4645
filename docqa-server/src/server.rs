use std::{convert::Infallible, net::SocketAddr, time::Duration};

use anyhow::Context;
use async_stream::stream;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use docqa_model::TextStream;
use docqa_rag::{Answer, UploadOutcome, UploadedFile};
use futures::StreamExt;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    cache::{CachedResponse, query_key, streaming_key},
    config::ServerConfig,
    error::ApiError,
    interactions::{QueryRecord, UploadRecord, VoiceQueryRecord},
    protocol::{
        ConversationParams, QueryParams, QueryResponse, RephraseParams, RephraseResponse,
        UPLOAD_SUCCESS_MESSAGE, UploadParams, UploadResponse, VoiceQueryParams,
        VoiceQueryResponse, WELCOME_MESSAGE,
    },
    state::AppState,
};

/// Prefix of the blob keys holding synthesized answers.
pub const AUDIO_OUTPUT_PREFIX: &str = "output_audio_files";

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload-files", post(upload_files).layer(upload_limit))
        .route("/query-with-langchain", get(query_with_sources))
        .route("/query-with-langchain-gpt4", get(query_with_context))
        .route("/query-with-langchain-gpt4_streaming", get(query_with_context_streaming))
        .route("/query-with-langchain-gpt4-mcq", get(query_conversational))
        .route("/query-using-voice", get(query_using_voice))
        .route("/rephrased-query", get(rephrased_query))
        .route("/files/output_audio_files/{name}", get(audio_file))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        storage_dir = %config.storage_dir.display(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "docqa listening on http://{}",
        addr
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa"}))
}

async fn upload_files(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut received = Vec::new();
    let outcome = receive_upload(&state, multipart, &mut received).await;
    let description = params.description.as_deref();
    match &outcome {
        Ok(outcome) => state.interactions.record_upload(UploadRecord {
            document_set: Some(&outcome.document_set_id),
            documents: &outcome.documents,
            description,
            error: None,
        }),
        Err(e) => state.interactions.record_upload(UploadRecord {
            document_set: None,
            documents: &received,
            description,
            error: Some(&e.detail),
        }),
    }

    let outcome = outcome?;
    Ok(Json(UploadResponse {
        uuid_number: outcome.document_set_id,
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
    }))
}

/// Reads the `files` fields and indexes them. Names of the files read so
/// far are pushed to `received`.
async fn receive_upload(
    state: &AppState,
    mut multipart: Multipart,
    received: &mut Vec<String>,
) -> Result<UploadOutcome, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        if name.is_empty() {
            warn!(bytes = data.len(), "skipping uploaded file without a name");
            continue;
        }
        received.push(name.clone());
        files.push(UploadedFile::new(name, data.to_vec()));
    }
    if files.is_empty() {
        return Err(ApiError::bad_request("No files were uploaded"));
    }

    state.indexer.upload(files).await.map_err(|e| {
        error!(error = %e, "upload failed");
        ApiError::from(e)
    })
}

/// A text answer plus what the interaction log needs to know about it.
struct Answered {
    response: QueryResponse,
    paraphrased_query: Option<String>,
    cached: bool,
}

impl Answered {
    fn fresh(query: &str, answer: Answer) -> Self {
        Self {
            response: QueryResponse {
                query: query.to_string(),
                answer: answer.answer,
                source_text: answer.source_text,
            },
            paraphrased_query: answer.paraphrased_query,
            cached: false,
        }
    }

    fn cached(response: QueryResponse) -> Self {
        Self { response, paraphrased_query: None, cached: true }
    }
}

async fn query_with_sources(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    const ENDPOINT: &str = "query-with-langchain";
    let key = query_key(&params.query_string, &params.uuid_number);
    let outcome = match state.cache.get(&key) {
        Some(CachedResponse::Answer(response)) => Ok(Answered::cached(response)),
        _ => state
            .engine
            .answer_with_sources(&params.uuid_number, &params.query_string)
            .await
            .map(|answer| Answered::fresh(&params.query_string, answer))
            .map_err(ApiError::from),
    };
    if let Ok(Answered { response, cached: false, .. }) = &outcome {
        state.cache.insert(key, CachedResponse::Answer(response.clone()));
    }
    finish_query(&state, ENDPOINT, &params, outcome)
}

async fn query_with_context(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    const ENDPOINT: &str = "query-with-langchain-gpt4";
    let key = query_key(&params.query_string, &params.uuid_number);
    let outcome = match state.cache.get(&key) {
        Some(CachedResponse::Answer(response)) => Ok(Answered::cached(response)),
        _ => state
            .engine
            .answer_with_context(&params.uuid_number, &params.query_string)
            .await
            .map(|answer| Answered::fresh(&params.query_string, answer))
            .map_err(ApiError::from),
    };
    if let Ok(Answered { response, cached: false, .. }) = &outcome {
        state.cache.insert(key, CachedResponse::Answer(response.clone()));
    }
    finish_query(&state, ENDPOINT, &params, outcome)
}

/// Streams answer fragments as SSE `data` events.
///
/// A completed stream is cached as its full text and replayed as a single
/// event. A provider failure after the first fragment ends the stream
/// with an `error` event and nothing is cached.
async fn query_with_context_streaming(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let key = streaming_key(&params.query_string, &params.uuid_number);

    let (mut upstream, cached): (TextStream, bool) = match state.cache.get(&key) {
        Some(CachedResponse::StreamText(text)) => {
            (Box::pin(futures::stream::once(async move { Ok(text) })), true)
        }
        _ => match state.engine.stream_with_context(&params.uuid_number, &params.query_string).await
        {
            Ok(upstream) => (upstream, false),
            Err(e) => {
                let e = ApiError::from(e);
                record_stream(&state, &params, "", false, Some(&e.detail));
                return Err(e);
            }
        },
    };

    let stream = stream! {
        let mut full_text = String::new();
        let mut failure = None;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(fragment) => {
                    full_text.push_str(&fragment);
                    yield Ok(Event::default().data(fragment));
                }
                Err(e) => {
                    error!(document_set = %params.uuid_number, error = %e, "answer stream failed");
                    let detail = docqa_rag::QaError::from(e).to_string();
                    yield Ok(Event::default().event("error").data(detail.clone()));
                    failure = Some(detail);
                    break;
                }
            }
        }
        record_stream(&state, &params, &full_text, cached, failure.as_deref());
        if failure.is_none() && !cached {
            state.cache.insert(key, CachedResponse::StreamText(full_text));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive")))
}

const STREAMING_ENDPOINT: &str = "query-with-langchain-gpt4_streaming";

fn record_stream(
    state: &AppState,
    params: &QueryParams,
    answer: &str,
    cached: bool,
    error: Option<&str>,
) {
    state.interactions.record_query(QueryRecord {
        endpoint: STREAMING_ENDPOINT,
        document_set: &params.uuid_number,
        query: &params.query_string,
        paraphrased_query: None,
        answer,
        source_text: "",
        cached,
        error,
    });
}

async fn query_conversational(
    State(state): State<AppState>,
    Query(params): Query<ConversationParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    const ENDPOINT: &str = "query-with-langchain-gpt4-mcq";
    let outcome = state
        .engine
        .answer_conversational(
            &state.conversation,
            &params.uuid_number,
            &params.query_string,
            params.caching,
        )
        .await
        .map(|answer| Answered::fresh(&params.query_string, answer))
        .map_err(ApiError::from);
    record_query(&state, ENDPOINT, &params.uuid_number, &params.query_string, &outcome);
    outcome.map(|answered| Json(answered.response))
}

async fn query_using_voice(
    State(state): State<AppState>,
    Query(params): Query<VoiceQueryParams>,
) -> Result<Json<VoiceQueryResponse>, ApiError> {
    let outcome = answer_voice_query(&state, &params).await;
    let record = match &outcome {
        Ok(response) => VoiceQueryRecord {
            document_set: &params.uuid_number,
            input_language: params.input_language,
            output_format: params.output_format,
            query: &response.query,
            query_in_english: &response.query_in_english,
            answer: &response.answer,
            answer_in_english: &response.answer_in_english,
            audio_input_url: &params.audio_url,
            audio_output_url: &response.audio_output_url,
            error: None,
        },
        Err(e) => VoiceQueryRecord {
            document_set: &params.uuid_number,
            input_language: params.input_language,
            output_format: params.output_format,
            query: &params.query_text,
            query_in_english: "",
            answer: "",
            answer_in_english: "",
            audio_input_url: &params.audio_url,
            audio_output_url: "",
            error: Some(&e.detail),
        },
    };
    state.interactions.record_voice_query(record);
    outcome.map(Json)
}

async fn answer_voice_query(
    state: &AppState,
    params: &VoiceQueryParams,
) -> Result<VoiceQueryResponse, ApiError> {
    let language = params.input_language;
    let normalized = state
        .bridge
        .normalize_input(language, &params.query_text, &params.audio_url)
        .await?;
    let answer = state
        .engine
        .answer_with_context(&params.uuid_number, &normalized.query_in_english)
        .await?;
    let localized = state.bridge.localize_answer(language, &answer.answer).await?;

    let audio_output_url = if normalized.wants_voice(params.output_format) {
        let audio = state.bridge.synthesize(language, &localized).await?;
        let key = format!("{AUDIO_OUTPUT_PREFIX}/{}.mp3", Uuid::new_v4());
        state.store.put(&key, audio).await.map_err(|e| {
            error!(key = %key, error = %e, "failed to store synthesized answer");
            ApiError::internal(e.to_string())
        })?;
        state.store.public_url(&key).unwrap_or_else(|| format!("/files/{key}"))
    } else {
        String::new()
    };

    Ok(VoiceQueryResponse {
        query: normalized.query,
        query_in_english: normalized.query_in_english,
        answer: localized,
        answer_in_english: answer.answer,
        audio_output_url,
        source_text: answer.source_text,
    })
}

async fn rephrased_query(
    State(state): State<AppState>,
    Query(params): Query<RephraseParams>,
) -> Result<Json<RephraseResponse>, ApiError> {
    let rephrased_query = state.engine.rephrase(&params.query_string).await?;
    Ok(Json(RephraseResponse { given_query: params.query_string, rephrased_query }))
}

async fn audio_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = format!("{AUDIO_OUTPUT_PREFIX}/{name}");
    let audio = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no audio file named '{name}'")))?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

fn finish_query(
    state: &AppState,
    endpoint: &'static str,
    params: &QueryParams,
    outcome: Result<Answered, ApiError>,
) -> Result<Json<QueryResponse>, ApiError> {
    record_query(state, endpoint, &params.uuid_number, &params.query_string, &outcome);
    outcome.map(|answered| Json(answered.response))
}

fn record_query(
    state: &AppState,
    endpoint: &'static str,
    document_set: &str,
    query: &str,
    outcome: &Result<Answered, ApiError>,
) {
    let record = match outcome {
        Ok(answered) => QueryRecord {
            endpoint,
            document_set,
            query,
            paraphrased_query: answered.paraphrased_query.as_deref(),
            answer: &answered.response.answer,
            source_text: &answered.response.source_text,
            cached: answered.cached,
            error: None,
        },
        Err(e) => QueryRecord {
            endpoint,
            document_set,
            query,
            paraphrased_query: None,
            answer: "",
            source_text: "",
            cached: false,
            error: Some(&e.detail),
        },
    };
    state.interactions.record_query(record);
}
