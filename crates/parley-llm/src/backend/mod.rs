//! Generation backend channel
//!
//! A backend takes one [`BackendRequest`] and answers with a stream of
//! cumulative [`BackendFragment`]s.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use parley_core::RequestContext;

pub use self::http::HttpBackend;
use crate::error::LlmError;
use crate::protocol::backend::{BackendFragment, BackendRequest};

/// Fragments produced by a backend for one request
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<BackendFragment, LlmError>> + Send>>;

/// Trait implemented by every generation backend
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Start a generation
    ///
    /// Errors returned here happen before the first fragment; faults after
    /// that arrive as stream items.
    async fn generate(&self, request: &BackendRequest, context: &RequestContext) -> Result<FragmentStream, LlmError>;
}
