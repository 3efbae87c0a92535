//! Conversion between internal types and `OpenAI` wire format

use crate::convert::backend::parse_tool_choice;
use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiFunctionCall, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta, OpenAiStreamToolCall,
    OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    Choice, CompletionParams, CompletionRequest, CompletionResponse, Content, ContentPart, FinishReason,
    FunctionDefinition, Message, Role, ToolCall, ToolChoiceConstraint, ToolDefinition, Usage,
};

// -- Inbound: OpenAI wire format -> internal types --

impl TryFrom<OpenAiRequest> for CompletionRequest {
    type Error = LlmError;

    fn try_from(req: OpenAiRequest) -> Result<Self, Self::Error> {
        if req.messages.is_empty() {
            return Err(LlmError::InvalidRequest("messages must not be empty".to_owned()));
        }

        let messages = req
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let tool_choice = match &req.tool_choice {
            Some(value) => parse_tool_choice(value)?,
            None => ToolChoiceConstraint::Auto,
        };

        Ok(Self {
            model: req.model,
            messages,
            params: CompletionParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_completion_tokens.or(req.max_tokens),
                stop: req.stop.map(crate::protocol::openai::OpenAiStop::into_vec),
            },
            tools: req
                .tools
                .map(|tools| tools.into_iter().map(Into::into).collect())
                .unwrap_or_default(),
            tool_choice,
            stream: req.stream.unwrap_or(false),
        })
    }
}

impl TryFrom<OpenAiMessage> for Message {
    type Error = LlmError;

    fn try_from(msg: OpenAiMessage) -> Result<Self, Self::Error> {
        let role = match msg.role.as_str() {
            "system" | "developer" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => return Err(LlmError::InvalidRequest(format!("unsupported message role: {other}"))),
        };

        let content = match msg.content {
            Some(OpenAiContent::Text(text)) => Content::Text(text),
            Some(OpenAiContent::Parts(parts)) => Content::Parts(parts.into_iter().map(Into::into).collect()),
            None => Content::Text(String::new()),
        };

        let tool_calls = msg.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                .collect()
        });

        Ok(Self {
            role,
            content,
            name: msg.name,
            tool_calls,
            tool_call_id: msg.tool_call_id,
        })
    }
}

impl From<OpenAiContentPart> for ContentPart {
    fn from(part: OpenAiContentPart) -> Self {
        match part {
            OpenAiContentPart::Text { text } => Self::Text { text },
            OpenAiContentPart::ImageUrl { image_url } => Self::Image {
                url: image_url.url,
                detail: image_url.detail,
            },
        }
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            tool_type: tool.tool_type,
            function: FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

// -- Outbound: internal types -> OpenAI wire format --

impl From<CompletionResponse> for OpenAiResponse {
    fn from(resp: CompletionResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp.choices.into_iter().map(Into::into).collect(),
            usage: resp.usage.map(Into::into),
        }
    }
}

impl From<Choice> for OpenAiChoice {
    fn from(choice: Choice) -> Self {
        Self {
            index: choice.index,
            message: OpenAiChoiceMessage {
                role: choice.message.role,
                content: choice.message.content,
                tool_calls: choice
                    .message
                    .tool_calls
                    .map(|calls| calls.into_iter().map(Into::into).collect()),
            },
            finish_reason: choice.finish_reason.map(|fr| fr.as_str().to_owned()),
        }
    }
}

impl From<ToolCall> for OpenAiToolCall {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            tool_type: "function".to_owned(),
            function: OpenAiFunctionCall {
                name: call.function.name,
                arguments: call.function.arguments,
            },
        }
    }
}

impl From<Usage> for OpenAiUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

// -- Stream conversion --

/// Builds the `chat.completion.chunk` objects of one streamed response
///
/// Every chunk shares the same id, model and creation time.
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    id: String,
    model: String,
    created: u64,
}

impl ChunkBuilder {
    /// Builder for a single response
    pub fn new(id: impl Into<String>, model: impl Into<String>, created: u64) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created,
        }
    }

    /// Opening chunk announcing the assistant role
    pub fn role(&self) -> OpenAiStreamChunk {
        self.chunk(
            OpenAiStreamDelta {
                role: Some("assistant".to_owned()),
                ..OpenAiStreamDelta::default()
            },
            None,
        )
    }

    /// Chunk carrying a content delta
    pub fn content(&self, delta: &str) -> OpenAiStreamChunk {
        self.chunk(
            OpenAiStreamDelta {
                content: Some(delta.to_owned()),
                ..OpenAiStreamDelta::default()
            },
            None,
        )
    }

    /// Chunk carrying every resolved tool call, each one whole
    pub fn tool_calls(&self, calls: &[ToolCall]) -> OpenAiStreamChunk {
        let tool_calls = calls
            .iter()
            .zip(0u32..)
            .map(|(call, index)| OpenAiStreamToolCall {
                index,
                id: call.id.clone(),
                tool_type: "function".to_owned(),
                function: OpenAiFunctionCall {
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                },
            })
            .collect();

        self.chunk(
            OpenAiStreamDelta {
                tool_calls: Some(tool_calls),
                ..OpenAiStreamDelta::default()
            },
            None,
        )
    }

    /// Closing chunk with an empty delta and the finish reason
    pub fn finish(&self, reason: FinishReason) -> OpenAiStreamChunk {
        self.chunk(OpenAiStreamDelta::default(), Some(reason))
    }

    /// Usage-only chunk with no choices
    pub fn usage(&self, usage: Usage) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![],
            usage: Some(usage.into()),
        }
    }

    fn chunk(&self, delta: OpenAiStreamDelta, finish_reason: Option<FinishReason>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(|fr| fr.as_str().to_owned()),
            }],
            usage: None,
        }
    }
}
