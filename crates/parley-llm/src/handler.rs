//! Axum route handlers for the OpenAI-compatible endpoints

use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt, stream};
use parley_core::{HttpError, RequestContext};
use serde::Serialize;

use crate::convert::ChunkBuilder;
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest, OpenAiResponse};
use crate::state::{LlmState, StreamingCompletion};
use crate::types::{CompletionRequest, FinishReason, FrameError, StreamFrame, Usage};

/// Build the completion router
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(
    State(state): State<LlmState>,
    headers: HeaderMap,
    Json(wire_request): Json<OpenAiRequest>,
) -> Response {
    let context = RequestContext::from_headers(headers);
    let include_usage = wire_request
        .stream_options
        .as_ref()
        .is_some_and(|options| options.include_usage);

    if let Some(user) = &wire_request.user {
        tracing::debug!(request_id = %context.request_id, user = %user, "completion requested");
    }

    let request = match CompletionRequest::try_from(wire_request) {
        Ok(request) => request,
        Err(e) => return error_response(&context.request_id, e),
    };

    let request_id = context.request_id.clone();

    if request.stream {
        match state.complete_stream(request, context).await {
            Ok(completion) => stream_response(completion, include_usage).into_response(),
            Err(e) => error_response(&request_id, e),
        }
    } else {
        match state.complete(request, context).await {
            Ok(response) => Json(OpenAiResponse::from(response)).into_response(),
            Err(e) => error_response(&request_id, e),
        }
    }
}

/// Handle `GET /v1/models`
async fn list_models(State(state): State<LlmState>) -> Response {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let data = state
        .models()
        .iter()
        .map(|id| OpenAiModel {
            id: id.clone(),
            object: "model".to_owned(),
            created: now,
            owned_by: "parley".to_owned(),
        })
        .collect();

    Json(OpenAiModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

/// Frame a streamed completion as `chat.completion.chunk` SSE events
///
/// The terminal frame expands into an optional tool-call chunk, the finish
/// chunk, an optional usage chunk and `[DONE]`.
fn stream_response(
    completion: StreamingCompletion,
    include_usage: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let StreamingCompletion {
        id,
        model,
        created,
        prompt,
        frames,
    } = completion;

    let chunks = ChunkBuilder::new(id, model, created);
    let opening = stream::once(futures_util::future::ready(data_event(&chunks.role())));

    let body = frames.flat_map(move |frame| stream::iter(frame_events(&chunks, &frame, &prompt, include_usage)));

    Sse::new(opening.chain(body).map(Ok)).keep_alive(KeepAlive::default())
}

fn frame_events(chunks: &ChunkBuilder, frame: &StreamFrame, prompt: &str, include_usage: bool) -> Vec<Event> {
    if let Some(error) = &frame.error {
        return vec![Event::default().data(error_event_body(error).to_string()), done_event()];
    }

    if !frame.finished {
        return vec![data_event(&chunks.content(&frame.delta))];
    }

    let mut events = Vec::with_capacity(4);
    if let Some(calls) = &frame.tool_calls {
        events.push(data_event(&chunks.tool_calls(calls)));
    }
    events.push(data_event(&chunks.finish(frame.finish_reason.unwrap_or(FinishReason::Stop))));
    if include_usage {
        events.push(data_event(&chunks.usage(Usage::estimate(prompt, &frame.content))));
    }
    events.push(done_event());
    events
}

/// Error envelope sent in-band when a stream ends in a fault
fn error_event_body(error: &FrameError) -> serde_json::Value {
    let code: &'static str = error.kind.into();
    serde_json::json!({
        "error": {
            "message": error.message,
            "type": error.kind.error_type(),
            "code": code,
        }
    })
}

fn data_event(chunk: &impl Serialize) -> Event {
    Event::default().data(serde_json::to_string(chunk).unwrap_or_default())
}

fn done_event() -> Event {
    Event::default().data("[DONE]")
}

/// Convert an error to an `OpenAI`-style JSON error response
#[allow(clippy::needless_pass_by_value)]
fn error_response(request_id: &str, error: LlmError) -> Response {
    let status = error.status_code();

    if status.is_server_error() {
        tracing::error!(request_id = %request_id, kind = %error.kind(), error = %error, "completion failed");
    } else {
        tracing::debug!(request_id = %request_id, kind = %error.kind(), error = %error, "completion rejected");
    }

    (status, Json(error.to_error_body())).into_response()
}
