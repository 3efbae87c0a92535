//! Folds a chat conversation into the backend's single-shot prompt
//!
//! The backend has no notion of turns, so the conversation is rendered as
//! labelled blocks separated by a blank line:
//!
//! ```text
//! Human: What's the weather in Paris?
//!
//! Assistant: Tool call get_weather (id=call_1): {"location":"Paris"}
//!
//! System: Tool execution result (id=call_1): 18C and sunny
//!
//! Human: Please continue.
//! ```

use std::fmt;

use crate::error::LlmError;
use crate::tools::is_valid_call_id;
use crate::types::{Message, Role};

const CONTINUATION: &str = "Human: Please continue.";

/// Prompt and optional system prompt for one backend request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptParts {
    /// Rendered conversation
    pub prompt: String,
    /// Content of the last system message, if any
    pub system_prompt: Option<String>,
}

/// Render `messages` into a backend prompt
///
/// Pure and deterministic: the same conversation always yields the same
/// prompt.
pub fn to_prompt(messages: &[Message]) -> PromptParts {
    let mut system_prompt = None;
    let mut blocks = Vec::with_capacity(messages.len() + 1);
    let mut last_rendered = None;

    for message in messages {
        let text = message.content.as_text();

        match message.role {
            Role::System => {
                system_prompt = Some(text);
                continue;
            }
            Role::User => blocks.push(format!("Human: {text}")),
            Role::Assistant => {
                if !text.trim().is_empty() {
                    blocks.push(format!("Assistant: {text}"));
                }
                for call in message.tool_calls.iter().flatten() {
                    blocks.push(format!(
                        "Assistant: Tool call {} (id={}): {}",
                        call.function.name, call.id, call.function.arguments
                    ));
                }
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or("unknown");
                blocks.push(format!("System: Tool execution result (id={id}): {text}"));
            }
        }

        last_rendered = Some(message.role);
    }

    if last_rendered.is_some_and(|role| role != Role::User) {
        blocks.push(CONTINUATION.to_owned());
    }

    PromptParts {
        prompt: blocks.join("\n\n"),
        system_prompt,
    }
}

/// Defect found in a tool-result message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolMessageProblem {
    /// No `tool_call_id` at all
    MissingCallId,
    /// `tool_call_id` does not look like a call id
    MalformedCallId(String),
    /// Result text is empty
    EmptyContent,
}

/// A tool-result message that cannot be forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMessageIssue {
    /// Position in the conversation
    pub index: usize,
    /// What is wrong with it
    pub problem: ToolMessageProblem,
}

impl fmt::Display for ToolMessageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            ToolMessageProblem::MissingCallId => {
                write!(f, "messages[{}]: tool message is missing tool_call_id", self.index)
            }
            ToolMessageProblem::MalformedCallId(id) => {
                write!(f, "messages[{}]: malformed tool_call_id '{id}'", self.index)
            }
            ToolMessageProblem::EmptyContent => {
                write!(f, "messages[{}]: tool message content is empty", self.index)
            }
        }
    }
}

/// Check every tool-result message in the conversation
///
/// A message can produce more than one issue.
pub fn validate_tool_messages(messages: &[Message]) -> Vec<ToolMessageIssue> {
    let mut issues = Vec::new();

    for (index, message) in messages.iter().enumerate().filter(|(_, m)| m.role == Role::Tool) {
        match message.tool_call_id.as_deref() {
            None | Some("") => issues.push(ToolMessageIssue {
                index,
                problem: ToolMessageProblem::MissingCallId,
            }),
            Some(id) if !is_valid_call_id(id) => issues.push(ToolMessageIssue {
                index,
                problem: ToolMessageProblem::MalformedCallId(id.to_owned()),
            }),
            Some(_) => {}
        }

        if message.content.as_text().trim().is_empty() {
            issues.push(ToolMessageIssue {
                index,
                problem: ToolMessageProblem::EmptyContent,
            });
        }
    }

    issues
}

/// Fold issues into a single invalid-request error, `Ok` when there are none
///
/// # Errors
///
/// Returns `LlmError::InvalidRequest` listing every issue
pub fn ensure_valid_tool_messages(messages: &[Message]) -> Result<(), LlmError> {
    let issues = validate_tool_messages(messages);
    if issues.is_empty() {
        return Ok(());
    }

    let detail = issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
    Err(LlmError::InvalidRequest(detail))
}
