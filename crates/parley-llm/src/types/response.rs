use serde::{Deserialize, Serialize};

use super::message::ToolCall;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Wire representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion)
    pub total_tokens: u32,
}

impl Usage {
    /// Rough estimate from character counts (about four characters per token)
    ///
    /// The backend channel does not report token counts.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        let count = |text: &str| u32::try_from(text.chars().count().div_ceil(4)).unwrap_or(u32::MAX);
        let prompt_tokens = count(prompt);
        let completion_tokens = count(completion);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// The assistant's side of a completed exchange
///
/// This is what detection produces and what the choice enforcer
/// validates and modifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantTurn {
    /// Text content
    pub content: Option<String>,
    /// Tool calls, in order
    pub tool_calls: Vec<ToolCall>,
    /// Why generation stopped
    pub finish_reason: FinishReason,
}

impl AssistantTurn {
    /// Text-only turn
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// Turn carrying tool calls
    pub fn with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        Self {
            content,
            tool_calls,
            finish_reason,
        }
    }

    /// Names of called functions, in call order
    pub fn called_functions(&self) -> Vec<&str> {
        self.tool_calls.iter().map(ToolCall::name).collect()
    }

    /// Whether the turn has no visible text
    pub fn content_is_empty(&self) -> bool {
        self.content.as_deref().is_none_or(|c| c.trim().is_empty())
    }
}

/// A single completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice
    pub index: u32,
    /// Generated message
    pub message: ChoiceMessage,
    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Message content within a response choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Role is always assistant for completions
    pub role: String,
    /// Text content
    pub content: Option<String>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl From<AssistantTurn> for ChoiceMessage {
    fn from(turn: AssistantTurn) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: turn.content,
            tool_calls: if turn.tool_calls.is_empty() {
                None
            } else {
                Some(turn.tool_calls)
            },
        }
    }
}

/// Internal canonical completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique response identifier
    pub id: String,
    /// Object type (e.g. "chat.completion")
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for generation
    pub model: String,
    /// Generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Single-choice response wrapping an assistant turn
    pub fn from_turn(id: String, model: String, created: u64, turn: AssistantTurn, usage: Option<Usage>) -> Self {
        let finish_reason = Some(turn.finish_reason);
        Self {
            id,
            object: "chat.completion".to_owned(),
            created,
            model,
            choices: vec![Choice {
                index: 0,
                message: turn.into(),
                finish_reason,
            }],
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_turn_finishes_with_tool_calls() {
        let turn = AssistantTurn::with_tool_calls(None, vec![ToolCall::new("call_1", "get_weather", "{}")]);
        assert_eq!(turn.finish_reason, FinishReason::ToolCalls);
        assert_eq!(turn.called_functions(), ["get_weather"]);
        assert!(turn.content_is_empty());
    }

    #[test]
    fn empty_tool_list_is_omitted_from_message() {
        let message: ChoiceMessage = AssistantTurn::text("hi").into();
        assert!(message.tool_calls.is_none());
        assert_eq!(message.content.as_deref(), Some("hi"));
    }

    #[test]
    fn usage_estimate_rounds_up() {
        let usage = Usage::estimate("abcde", "");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(usage.total_tokens, 2);
    }
}
