//! Backend reached over HTTP with an SSE response body

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, future};
use parley_config::BackendConfig;
use parley_core::{REQUEST_ID_HEADER, RequestContext};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{FragmentStream, GenerationBackend};
use crate::error::LlmError;
use crate::protocol::backend::{BackendFragment, BackendRequest};

/// One decoded SSE event
enum Line {
    Fragment(Result<BackendFragment, LlmError>),
    Skip,
    Done,
}

/// Backend that POSTs requests to `{base_url}/generate`
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl HttpBackend {
    /// Create from backend configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` if the HTTP client cannot be built
    pub fn new(config: &BackendConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn generate_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/generate")
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: &BackendRequest, context: &RequestContext) -> Result<FragmentStream, LlmError> {
        let mut builder = self
            .client
            .post(self.generate_url())
            .header(REQUEST_ID_HEADER, &context.request_id)
            .json(request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(backend = self.name(), error = %e, "backend request failed");
            LlmError::Upstream(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(backend = self.name(), status = %status, "backend returned error");
            return Err(LlmError::Upstream(format!("backend returned {status}: {body}")));
        }

        let fragments = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data == "[DONE]" {
                        return Line::Done;
                    }

                    match serde_json::from_str::<BackendFragment>(data) {
                        Ok(fragment) => Line::Fragment(Ok(fragment)),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE event");
                            Line::Skip
                        }
                    }
                }
                Err(e) => Line::Fragment(Err(LlmError::Streaming(e.to_string()))),
            })
            .take_while(|line| future::ready(!matches!(line, Line::Done)))
            .filter_map(|line| {
                future::ready(match line {
                    Line::Fragment(fragment) => Some(fragment),
                    Line::Skip | Line::Done => None,
                })
            });

        Ok(Box::pin(fragments))
    }
}
