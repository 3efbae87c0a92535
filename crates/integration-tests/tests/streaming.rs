mod harness;

use harness::config::ConfigBuilder;
use harness::mock_backend::MockBackend;
use harness::server::TestServer;

fn streaming_body(include_usage: bool) -> serde_json::Value {
    serde_json::json!({
        "model": "sonnet",
        "messages": [{"role": "user", "content": "Hello"}],
        "stream": true,
        "stream_options": {"include_usage": include_usage}
    })
}

fn streaming_body_with_tools(tool_choice: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "sonnet",
        "messages": [{"role": "user", "content": "What is the weather?"}],
        "stream": true,
        "tool_choice": tool_choice,
        "tools": [{
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Get current weather",
                "parameters": {
                    "type": "object",
                    "properties": {"location": {"type": "string"}},
                    "required": ["location"]
                }
            }
        }]
    })
}

/// Parse SSE event lines from raw response text
fn parse_sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.starts_with("data: "))
        .map(|line| line.trim_start_matches("data: ").to_owned())
        .collect()
}

/// Decode every JSON event, dropping the `[DONE]` marker
fn json_events(events: &[String]) -> Vec<serde_json::Value> {
    events
        .iter()
        .filter(|e| e.as_str() != "[DONE]")
        .map(|e| serde_json::from_str(e).unwrap())
        .collect()
}

async fn start(reply: &str) -> (MockBackend, TestServer) {
    let mock = MockBackend::start(reply).await.unwrap();
    let config = ConfigBuilder::new().with_backend(&mock.base_url()).build();
    let server = TestServer::start(config).await.unwrap();
    (mock, server)
}

#[tokio::test]
async fn streaming_returns_sse_content_type() {
    let (_mock, server) = start("Hello there").await;

    let resp = server.chat(&streaming_body(false)).await;

    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
    assert!(content_type.starts_with("text/event-stream"), "got {content_type}");
}

#[tokio::test]
async fn streaming_emits_role_deltas_finish_and_done() {
    let (_mock, server) = start("Hello from the streaming backend").await;

    let text = server.chat(&streaming_body(false)).await.text().await.unwrap();
    let events = parse_sse_data(&text);

    assert_eq!(events.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(events.iter().filter(|e| e.as_str() == "[DONE]").count(), 1);

    let chunks = json_events(&events);
    assert!(chunks.iter().all(|c| c["object"] == "chat.completion.chunk"));

    let id = chunks[0]["id"].clone();
    assert!(chunks.iter().all(|c| c["id"] == id));

    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");

    let assembled: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(assembled, "Hello from the streaming backend");

    let finish = chunks.last().unwrap();
    assert_eq!(finish["choices"][0]["finish_reason"], "stop");
    assert!(finish["usage"].is_null());
}

#[tokio::test]
async fn streaming_includes_usage_when_requested() {
    let (_mock, server) = start("Hello there").await;

    let text = server.chat(&streaming_body(true)).await.text().await.unwrap();
    let chunks = json_events(&parse_sse_data(&text));

    let usage_chunk = chunks.last().unwrap();
    assert!(usage_chunk["choices"].as_array().unwrap().is_empty());
    let usage = &usage_chunk["usage"];
    assert_eq!(
        usage["total_tokens"].as_u64().unwrap(),
        usage["prompt_tokens"].as_u64().unwrap() + usage["completion_tokens"].as_u64().unwrap()
    );
}

#[tokio::test]
async fn streaming_emits_tool_calls_before_finish() {
    let (_mock, server) = start("I'll use the get_weather tool to check.").await;

    let text = server
        .chat(&streaming_body_with_tools("auto"))
        .await
        .text()
        .await
        .unwrap();
    let chunks = json_events(&parse_sse_data(&text));

    let tool_chunk = chunks
        .iter()
        .find(|c| c["choices"][0]["delta"]["tool_calls"].is_array())
        .expect("tool call chunk");
    let call = &tool_chunk["choices"][0]["delta"]["tool_calls"][0];
    assert_eq!(call["index"], 0);
    assert_eq!(call["type"], "function");
    assert_eq!(call["function"]["name"], "get_weather");
    assert!(call["id"].as_str().unwrap().starts_with("call_"));
    serde_json::from_str::<serde_json::Value>(call["function"]["arguments"].as_str().unwrap()).unwrap();

    let finish = chunks.last().unwrap();
    assert_eq!(finish["choices"][0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn streaming_with_tool_choice_none_finishes_with_stop() {
    let (_mock, server) = start("I'll use the get_weather tool to check.").await;

    let text = server
        .chat(&streaming_body_with_tools("none"))
        .await
        .text()
        .await
        .unwrap();
    let chunks = json_events(&parse_sse_data(&text));

    assert!(
        chunks
            .iter()
            .all(|c| c["choices"][0]["delta"]["tool_calls"].is_null())
    );
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn streaming_backend_failure_returns_error_before_stream() {
    let mock = MockBackend::start_failing(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
        .await
        .unwrap();
    let config = ConfigBuilder::new().with_backend(&mock.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.chat(&streaming_body(false)).await;

    assert_eq!(resp.status(), 502);
}
