//! Generation backend wire format types
//!
//! The backend takes one prompt, an optional system prompt and a flat tool
//! list, and answers with a stream of cumulative `{content, finished}`
//! fragments.

use serde::{Deserialize, Serialize};

use crate::types::CompletionParams;

/// Tool definition in the backend's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendToolDefinition {
    /// Tool name
    pub name: String,
    /// Description, omitted when the caller gave none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the input object, `{}` when the caller gave none
    pub input_schema: serde_json::Value,
    /// Whether the caller supplied `input_schema` rather than getting `{}`
    #[serde(skip)]
    pub schema_declared: bool,
}

/// Tool choice in the backend's shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendToolChoice {
    /// `"allowed"` or `"disabled"`
    Mode(BackendToolMode),
    /// `{"name": "..."}`
    Named {
        /// Function the backend must use
        name: String,
    },
}

/// Whether the backend may use tools at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendToolMode {
    /// Backend may decide
    Allowed,
    /// Backend must answer in text
    Disabled,
}

/// Tool invocation in the backend's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendToolUse {
    /// Call identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// Parsed input object
    pub input: serde_json::Value,
}

/// One single-shot generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
    /// Backend model name
    pub model: String,
    /// Folded conversation
    pub prompt: String,
    /// System prompt, when the conversation carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Tools available to the backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<BackendToolDefinition>,
    /// Tool choice, omitted when no tools are declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<BackendToolChoice>,
    /// Generation parameters
    #[serde(flatten)]
    pub params: CompletionParams,
}

/// One fragment of backend output
///
/// `content` is cumulative: every fragment repeats what came before.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFragment {
    /// Everything generated so far
    #[serde(default)]
    pub content: String,
    /// Set on the last fragment
    #[serde(default)]
    pub finished: bool,
}

impl BackendFragment {
    /// Intermediate fragment
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finished: false,
        }
    }

    /// Final fragment
    pub fn last(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finished: true,
        }
    }
}
