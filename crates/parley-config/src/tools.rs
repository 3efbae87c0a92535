use indexmap::IndexMap;
use serde::Deserialize;

/// Tool-calling adapter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Reject enforcement that runs past `enforce_timeout_ms`
    #[serde(default = "default_enforce_timeout")]
    pub enforce_timeout: bool,
    /// Wall-clock budget for choice enforcement, in milliseconds
    #[serde(default = "default_enforce_timeout_ms")]
    pub enforce_timeout_ms: u64,
    /// Accept responses that were modified but still violate the choice
    #[serde(default)]
    pub allow_partial_compliance: bool,
    /// Extra detector aliases: phrase -> declared tool name
    #[serde(default)]
    pub aliases: IndexMap<String, String>,
    /// Extra synthesized arguments: tool name -> JSON object
    #[serde(default)]
    pub default_arguments: IndexMap<String, serde_json::Value>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enforce_timeout: default_enforce_timeout(),
            enforce_timeout_ms: default_enforce_timeout_ms(),
            allow_partial_compliance: false,
            aliases: IndexMap::new(),
            default_arguments: IndexMap::new(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enforce_timeout() -> bool {
    true
}

const fn default_enforce_timeout_ms() -> u64 {
    5_000
}
