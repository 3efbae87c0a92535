use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Generation backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend generation service
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Bearer token sent to the backend
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model names advertised on `/v1/models` and accepted in requests
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Model used when a request names one that is not advertised
    #[serde(default)]
    pub default_model: Option<String>,
    /// Upper bound on a single backend exchange, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            models: default_models(),
            default_model: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Resolve the model to run for a requested name
    ///
    /// Advertised names pass through; anything else falls back to
    /// `default_model`, or the first advertised model.
    pub fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        if self.models.iter().any(|m| m == requested) {
            return requested;
        }

        self.default_model
            .as_deref()
            .or_else(|| self.models.first().map(String::as_str))
            .unwrap_or(requested)
    }
}

#[allow(clippy::missing_panics_doc)]
fn default_base_url() -> Url {
    Url::parse("http://127.0.0.1:8787").expect("valid default URL")
}

fn default_models() -> Vec<String> {
    vec!["sonnet".to_owned(), "opus".to_owned(), "haiku".to_owned()]
}

const fn default_request_timeout() -> u64 {
    300
}
