use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::{ToolChoiceConstraint, ToolDefinition};

/// Parameters controlling text generation, forwarded to the backend as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Internal canonical completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Generation parameters
    pub params: CompletionParams,
    /// Tool definitions available to the model
    pub tools: Vec<ToolDefinition>,
    /// Choice constraint governing enforcement for the whole request
    pub tool_choice: ToolChoiceConstraint,
    /// Whether to stream the response
    pub stream: bool,
}

impl CompletionRequest {
    /// Request with no tools and default parameters
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            params: CompletionParams::default(),
            tools: Vec::new(),
            tool_choice: ToolChoiceConstraint::Auto,
            stream: false,
        }
    }

    /// Attach tool definitions and a choice constraint
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, tool_choice: ToolChoiceConstraint) -> Self {
        self.tools = tools;
        self.tool_choice = tool_choice;
        self
    }
}
