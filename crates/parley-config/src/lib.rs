#![allow(clippy::must_use_candidate)]

pub mod backend;
mod env;
pub mod health;
mod loader;
pub mod server;
pub mod telemetry;
pub mod tools;

use serde::Deserialize;

pub use backend::*;
pub use health::*;
pub use server::*;
pub use telemetry::*;
pub use tools::*;

/// Top-level Parley configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Generation backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Tool-calling adapter configuration
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
