//! Internal canonical types for the completion pipeline
//!
//! These are the normalized representation every wire format converts to
//! and from. Nothing in here outlives a single request.

pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use message::{Content, ContentPart, FunctionCall, Message, Role, ToolCall};
pub use request::{CompletionParams, CompletionRequest};
pub use response::{AssistantTurn, Choice, ChoiceMessage, CompletionResponse, FinishReason, Usage};
pub use stream::{FrameError, FrameMetadata, StreamFrame};
pub use tool::{FunctionDefinition, ToolChoiceConstraint, ToolDefinition};
