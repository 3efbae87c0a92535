//! Shared completion state and the per-request pipeline
//!
//! Both paths prepare the backend request the same way: validate tool
//! messages, convert tools and tool choice, fold the conversation into a
//! prompt. They differ only in how the fragment stream is consumed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parley_config::{BackendConfig, Config};
use parley_core::RequestContext;

use crate::backend::{GenerationBackend, HttpBackend};
use crate::convert::FormatConverter;
use crate::error::LlmError;
use crate::prompt::{ensure_valid_tool_messages, to_prompt};
use crate::protocol::backend::BackendRequest;
use crate::streaming::{FrameStream, StreamingAssembler, drain};
use crate::tools::ToolCallingPass;
use crate::types::{CompletionRequest, CompletionResponse, ToolChoiceConstraint, ToolDefinition, Usage};

/// Shared state for completion handlers
#[derive(Clone)]
pub struct LlmState {
    pub(crate) inner: Arc<LlmStateInner>,
}

pub(crate) struct LlmStateInner {
    pub(crate) backend: Arc<dyn GenerationBackend>,
    pub(crate) pass: Arc<ToolCallingPass>,
    pub(crate) converter: FormatConverter,
    pub(crate) backend_config: BackendConfig,
}

/// A streamed completion ready to be framed for the caller
pub struct StreamingCompletion {
    /// Response id shared by every chunk
    pub id: String,
    /// Model the backend ran
    pub model: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Rendered prompt, used for usage estimates
    pub prompt: String,
    /// Frames produced by the assembler
    pub frames: FrameStream,
}

/// Everything needed to call the backend and post-process its output
struct Prepared {
    backend_request: BackendRequest,
    declared: Vec<ToolDefinition>,
    constraint: ToolChoiceConstraint,
}

impl LlmState {
    /// State from explicit parts
    pub fn new(backend: Arc<dyn GenerationBackend>, pass: ToolCallingPass, backend_config: BackendConfig) -> Self {
        Self {
            inner: Arc::new(LlmStateInner {
                backend,
                pass: Arc::new(pass),
                converter: FormatConverter,
                backend_config,
            }),
        }
    }

    /// Build state from configuration with the HTTP backend
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let backend = HttpBackend::new(&config.backend)?;
        let pass = ToolCallingPass::from_config(&config.tools);

        tracing::info!(
            backend = backend.name(),
            base_url = %config.backend.base_url,
            models = ?config.backend.models,
            "completion backend configured"
        );

        Ok(Self::new(Arc::new(backend), pass, config.backend.clone()))
    }

    /// Advertised model names
    pub fn models(&self) -> &[String] {
        &self.inner.backend_config.models
    }

    /// Run a non-streaming completion
    ///
    /// The backend channel is drained to completion before the
    /// tool-calling pass runs.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid requests, backend failures and rejected
    /// responses
    pub async fn complete(
        &self,
        request: CompletionRequest,
        context: RequestContext,
    ) -> Result<CompletionResponse, LlmError> {
        let prepared = self.prepare(&request)?;

        let fragments = self.inner.backend.generate(&prepared.backend_request, &context).await?;
        let drained = drain(fragments).await?;

        let outcome = self
            .inner
            .pass
            .run(&drained.content, &prepared.declared, &prepared.constraint)?;

        tracing::info!(
            request_id = %context.request_id,
            model = %prepared.backend_request.model,
            fragments = drained.fragments,
            tools = ?outcome.detected_tools,
            action = %outcome.action,
            compliant = outcome.compliant,
            "completion finished"
        );

        let usage = Usage::estimate(&prepared.backend_request.prompt, &drained.content);

        Ok(CompletionResponse::from_turn(
            response_id(&context),
            prepared.backend_request.model,
            unix_now(),
            outcome.turn,
            Some(usage),
        ))
    }

    /// Start a streaming completion
    ///
    /// # Errors
    ///
    /// Returns an error for invalid requests and for backend failures that
    /// happen before the first fragment
    pub async fn complete_stream(
        &self,
        request: CompletionRequest,
        context: RequestContext,
    ) -> Result<StreamingCompletion, LlmError> {
        let prepared = self.prepare(&request)?;

        let fragments = self.inner.backend.generate(&prepared.backend_request, &context).await?;

        tracing::debug!(
            request_id = %context.request_id,
            model = %prepared.backend_request.model,
            "streaming completion started"
        );

        let frames = StreamingAssembler::new(Arc::clone(&self.inner.pass), prepared.declared, prepared.constraint)
            .assemble(fragments);

        Ok(StreamingCompletion {
            id: response_id(&context),
            model: prepared.backend_request.model,
            created: unix_now(),
            prompt: prepared.backend_request.prompt,
            frames,
        })
    }

    fn prepare(&self, request: &CompletionRequest) -> Result<Prepared, LlmError> {
        ensure_valid_tool_messages(&request.messages)?;

        let converter = self.inner.converter;
        let report = converter.to_backend_format(&request.tools);
        for error in &report.errors {
            tracing::warn!(
                index = error.index,
                tool = %error.name,
                error = %error.message,
                "dropping tool that failed conversion"
            );
        }

        let declared = converter.from_backend_format(&report.tools);

        if let Some(name) = request.tool_choice.required_function()
            && declared.iter().all(|t| t.name() != name)
        {
            return Err(LlmError::InvalidRequest(format!(
                "tool_choice names function '{name}' which is not among the declared tools"
            )));
        }

        let parts = to_prompt(&request.messages);
        if parts.prompt.is_empty() {
            return Err(LlmError::InvalidRequest(
                "conversation has no user, assistant or tool messages".to_owned(),
            ));
        }

        let tool_choice = (!report.tools.is_empty()).then(|| converter.choice_to_backend(&request.tool_choice));
        let model = self.inner.backend_config.resolve_model(&request.model).to_owned();

        Ok(Prepared {
            backend_request: BackendRequest {
                model,
                prompt: parts.prompt,
                system_prompt: parts.system_prompt,
                tools: report.tools,
                tool_choice,
                params: request.params.clone(),
            },
            declared,
            constraint: request.tool_choice.clone(),
        })
    }
}

fn response_id(context: &RequestContext) -> String {
    format!("chatcmpl-{}", context.request_id)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
