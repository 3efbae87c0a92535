use parley_core::HttpError;
use serde::Serialize;

use super::message::ToolCall;
use super::response::FinishReason;
use crate::error::{ErrorKind, LlmError};
use crate::tools::choice::{ActionKind, ChoiceViolation};

/// One frame emitted by the streaming assembler
///
/// `content` is everything emitted so far; `delta` is the suffix that is
/// new in this frame. The last frame of a stream has `finished = true` and
/// an empty delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamFrame {
    /// Accumulated content up to and including this frame
    pub content: String,
    /// Newly arrived suffix
    pub delta: String,
    /// Whether this is the terminal frame
    pub finished: bool,
    /// Finish reason, terminal frames only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Tool calls resolved for the whole response, terminal frames only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Summary of detection and enforcement, terminal frames only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FrameMetadata>,
    /// Fault that ended the stream, terminal error frames only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

/// Client-safe description of the fault behind an error frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameError {
    /// Classification of the underlying error
    pub kind: ErrorKind,
    /// Message safe to show the caller
    pub message: String,
}

impl From<&LlmError> for FrameError {
    fn from(error: &LlmError) -> Self {
        Self {
            kind: error.kind(),
            message: error.client_message(),
        }
    }
}

impl StreamFrame {
    /// Non-terminal frame carrying a delta
    pub fn delta(content: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            delta: delta.into(),
            finished: false,
            finish_reason: None,
            tool_calls: None,
            metadata: None,
            error: None,
        }
    }

    /// Terminal frame reporting the fault that ended the stream
    pub fn error(content: impl Into<String>, error: &LlmError) -> Self {
        Self {
            finished: true,
            error: Some(error.into()),
            ..Self::delta(content, String::new())
        }
    }

    /// Whether this frame reports a fault
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregated per-response metadata attached to the terminal frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameMetadata {
    /// Fragments received from the backend channel
    pub fragments: usize,
    /// Declared tools the detector matched, in order
    pub detected_tools: Vec<String>,
    /// Corrective action taken by the choice enforcer
    pub action: ActionKind,
    /// Whether the final response complies with the choice constraint
    pub compliant: bool,
    /// Violations found before correction
    pub violations: Vec<ChoiceViolation>,
}
