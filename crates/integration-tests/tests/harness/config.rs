//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use parley_config::{BackendConfig, Config, HealthConfig, ServerConfig, ToolsConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        ..HealthConfig::default()
                    },
                },
                backend: BackendConfig::default(),
                tools: ToolsConfig::default(),
                telemetry: None,
            },
        }
    }

    /// Point the generation backend at a mock server
    pub fn with_backend(mut self, base_url: &str) -> Self {
        self.config.backend.base_url = base_url.parse().expect("valid URL");
        self
    }

    /// Replace the advertised model list
    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.config.backend.models = models.iter().map(|m| (*m).to_owned()).collect();
        self
    }

    /// Register a tool alias
    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        self.config.tools.aliases.insert(alias.to_owned(), target.to_owned());
        self
    }

    /// Register default arguments for a tool
    pub fn with_default_arguments(mut self, tool: &str, arguments: serde_json::Value) -> Self {
        self.config.tools.default_arguments.insert(tool.to_owned(), arguments);
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
