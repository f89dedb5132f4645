//! `docqa-server` exposes document question answering over HTTP.
//! Answers stream over SSE; regional-language and spoken queries go
//! through the voice bridge.

pub mod cache;
pub mod config;
pub mod error;
pub mod interactions;
pub mod protocol;
pub mod server;
pub mod state;
pub mod telemetry;

pub use cache::{CachedResponse, ResponseCache, TtlCache};
pub use config::ServerConfig;
pub use error::ApiError;
pub use interactions::{
    InteractionLog, QueryRecord, TracingInteractionLog, UploadRecord, VoiceQueryRecord,
};
pub use server::{app_router, run_server};
pub use state::AppState;
