//! Tool-calling protocol adapter for Parley
//!
//! Exposes an OpenAI-compatible chat completion surface over a generation
//! backend that only understands a single prompt plus a flat tool list.
//! Tool schemas and tool choice are translated on the way in; tool intent
//! is inferred from the backend's text, synthesized into tool calls and
//! checked against the caller's tool choice on the way out.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod backend;
pub mod convert;
pub mod error;
#[cfg(feature = "http")]
mod handler;
pub mod prompt;
pub mod protocol;
pub mod state;
pub mod streaming;
pub mod tools;
pub mod types;

pub use backend::{FragmentStream, GenerationBackend, HttpBackend};
pub use error::{ErrorKind, LlmError};
#[cfg(feature = "http")]
pub use handler::llm_router;
pub use state::{LlmState, StreamingCompletion};
pub use streaming::{FrameStream, StreamingAssembler};
pub use tools::ToolCallingPass;
pub use types::{CompletionRequest, CompletionResponse, StreamFrame};
