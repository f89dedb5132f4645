//! # docqa-model
//!
//! Chat-completion model integrations for the docqa service.
//!
//! ## Overview
//!
//! - [`Llm`] - the capability every provider implements: a single
//!   round-trip completion or an ordered stream of text fragments
//! - [`OpenAIChatClient`] - OpenAI `/v1/chat/completions` (and compatible APIs)
//! - [`MockLlm`] - scripted model for tests
//!
//! Provider failures are reported as [`ModelError`], which keeps the
//! distinction between rate limiting, temporary unavailability and
//! everything else so callers can map them to user-facing status codes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docqa_model::{ChatMessage, Llm, OpenAIChatClient, OpenAIConfig};
//!
//! let model = OpenAIChatClient::new(OpenAIConfig::new(
//!     std::env::var("OPENAI_API_KEY")?,
//!     "gpt-4",
//! ))?;
//! let answer = model.complete(&[ChatMessage::user("Why QuML?")]).await?;
//! ```

pub mod error;
pub mod llm;
pub mod message;
pub mod mock;
pub mod openai;

pub use error::{ModelError, Result};
pub use llm::{Llm, TextStream};
pub use message::{ChatMessage, Role};
pub use mock::MockLlm;
pub use openai::{OpenAIChatClient, OpenAIConfig};
