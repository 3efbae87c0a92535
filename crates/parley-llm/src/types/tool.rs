use std::fmt;

use serde::{Deserialize, Serialize};

/// Definition of a tool the caller declares available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (only "function" is supported)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Build a function tool
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }

    /// Declared function name
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Specification of a callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Per-request directive restricting whether and which tool may be called
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoiceConstraint {
    /// The backend decides
    #[default]
    Auto,
    /// No tool may be called
    None,
    /// Only the named function may be called
    Function(String),
}

impl ToolChoiceConstraint {
    /// Name of the forced function, if any
    pub fn required_function(&self) -> Option<&str> {
        match self {
            Self::Function(name) => Some(name),
            Self::Auto | Self::None => None,
        }
    }
}

impl fmt::Display for ToolChoiceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::None => f.write_str("none"),
            Self::Function(name) => write!(f, "function:{name}"),
        }
    }
}
