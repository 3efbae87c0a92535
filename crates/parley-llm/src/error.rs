use http::StatusCode;
use parley_core::HttpError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an [`LlmError`]
///
/// Carried alongside every error so the transport boundary can dispatch on
/// a single tag instead of matching each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed tool schema or tool-choice shape
    Conversion,
    /// A synthesized tool call failed structural validation
    Generation,
    /// Internal fault while enforcing the tool choice
    Enforcement,
    /// Backend channel fault mid-stream
    Streaming,
    /// Enforcement exceeded its time budget
    Timeout,
    /// Caller sent a request the adapter cannot serve
    InvalidRequest,
    /// Backend returned an error or could not be reached
    Upstream,
    /// Anything unexpected
    Internal,
}

impl ErrorKind {
    /// `OpenAI`-style error type reported to clients
    pub const fn error_type(self) -> &'static str {
        match self {
            Self::Conversion | Self::InvalidRequest => "invalid_request_error",
            Self::Upstream => "upstream_error",
            Self::Streaming => "streaming_error",
            Self::Timeout => "timeout_error",
            Self::Generation | Self::Enforcement | Self::Internal => "internal_error",
        }
    }
}

/// Errors produced by the completion pipeline
#[derive(Debug, Error)]
pub enum LlmError {
    /// Tool schema or tool choice could not be translated
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A synthesized tool call was rejected
    #[error("generation error: {0}")]
    Generation(String),

    /// Choice enforcement failed internally
    #[error("enforcement error: {0}")]
    Enforcement(String),

    /// Error during streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Enforcement ran past its budget
    #[error("enforcement timed out after {elapsed_ms}ms (budget {budget_ms}ms)")]
    Timeout {
        /// Time actually spent
        elapsed_ms: u128,
        /// Configured budget
        budget_ms: u128,
    },

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Classification tag for this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Enforcement(_) => ErrorKind::Enforcement,
            Self::Streaming(_) => ErrorKind::Streaming,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Conversion | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Generation | ErrorKind::Enforcement | ErrorKind::Streaming | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &str {
        self.kind().error_type()
    }

    fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Generation | ErrorKind::Enforcement | ErrorKind::Internal => {
                "an internal error occurred".to_owned()
            }
            _ => self.to_string(),
        }
    }

    fn error_code(&self) -> Option<&str> {
        Some(self.kind().into())
    }
}
