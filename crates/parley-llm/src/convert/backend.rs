//! Format converter between caller tool shapes and backend tool shapes
//!
//! Every operation here is pure. Batch conversion collects per-tool
//! failures instead of failing the whole batch.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::LlmError;
use crate::protocol::backend::{BackendToolChoice, BackendToolDefinition, BackendToolMode, BackendToolUse};
use crate::tools::is_valid_call_id;
use crate::types::{ToolCall, ToolChoiceConstraint, ToolDefinition};

/// Result of converting a batch of caller tools
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    /// Successfully converted tools, in declaration order
    pub tools: Vec<BackendToolDefinition>,
    /// One entry per tool that could not be converted
    pub errors: Vec<ToolConversionError>,
}

impl ConversionReport {
    /// Whether every tool converted
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Conversion failure for a single tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConversionError {
    /// Position in the caller's `tools` array
    pub index: usize,
    /// Declared name, possibly empty
    pub name: String,
    /// What was wrong
    pub message: String,
}

/// Stateless translator between the two tool dialects
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatConverter;

impl FormatConverter {
    /// Convert caller tools to backend tools, one to one and in order
    pub fn to_backend_format(self, tools: &[ToolDefinition]) -> ConversionReport {
        let mut report = ConversionReport::default();

        for (index, tool) in tools.iter().enumerate() {
            match self.tool_to_backend(tool) {
                Ok(converted) => report.tools.push(converted),
                Err(e) => report.errors.push(ToolConversionError {
                    index,
                    name: tool.function.name.clone(),
                    message: e.to_string(),
                }),
            }
        }

        report
    }

    /// Convert a single caller tool
    ///
    /// An absent schema becomes an empty object schema.
    pub fn tool_to_backend(self, tool: &ToolDefinition) -> Result<BackendToolDefinition, LlmError> {
        if tool.tool_type != "function" {
            return Err(LlmError::Conversion(format!("unsupported tool type: {}", tool.tool_type)));
        }

        let name = &tool.function.name;
        if !is_valid_function_name(name) {
            return Err(LlmError::Conversion(format!(
                "invalid function name '{name}': expected 1-64 characters of [A-Za-z0-9_-]"
            )));
        }

        let input_schema = match &tool.function.parameters {
            None => empty_schema(),
            Some(schema @ Value::Object(_)) => schema.clone(),
            Some(other) => {
                return Err(LlmError::Conversion(format!(
                    "parameters for '{name}' must be a JSON object, got {}",
                    json_type_name(other)
                )));
            }
        };

        Ok(BackendToolDefinition {
            name: name.clone(),
            description: tool.function.description.clone(),
            input_schema,
            schema_declared: tool.function.parameters.is_some(),
        })
    }

    /// Convert backend tools back to caller tools
    ///
    /// Fields the caller left out stay absent; an empty object schema from
    /// the wire, where the declaration flag is lost, maps back to absent.
    pub fn from_backend_format(self, tools: &[BackendToolDefinition]) -> Vec<ToolDefinition> {
        tools
            .iter()
            .map(|tool| {
                let parameters = Some(tool.input_schema.clone())
                    .filter(|schema| tool.schema_declared || *schema != empty_schema());
                ToolDefinition::function(tool.name.clone(), tool.description.clone(), parameters)
            })
            .collect()
    }

    /// Translate a caller `tool_choice` value straight to the backend shape
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Conversion` for unknown modes or a named choice
    /// without a function name
    pub fn convert_choice(self, value: &Value) -> Result<BackendToolChoice, LlmError> {
        parse_tool_choice(value).map(|choice| self.choice_to_backend(&choice))
    }

    /// Translate a parsed constraint to the backend shape
    pub fn choice_to_backend(self, choice: &ToolChoiceConstraint) -> BackendToolChoice {
        match choice {
            ToolChoiceConstraint::Auto => BackendToolChoice::Mode(BackendToolMode::Allowed),
            ToolChoiceConstraint::None => BackendToolChoice::Mode(BackendToolMode::Disabled),
            ToolChoiceConstraint::Function(name) => BackendToolChoice::Named { name: name.clone() },
        }
    }

    /// Translate a backend choice back to a constraint
    pub fn from_backend_choice(self, choice: &BackendToolChoice) -> ToolChoiceConstraint {
        match choice {
            BackendToolChoice::Mode(BackendToolMode::Allowed) => ToolChoiceConstraint::Auto,
            BackendToolChoice::Mode(BackendToolMode::Disabled) => ToolChoiceConstraint::None,
            BackendToolChoice::Named { name } => ToolChoiceConstraint::Function(name.clone()),
        }
    }

    /// Validate a synthesized tool call against the backend tool-use shape
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Conversion` when the id is malformed, the name is
    /// empty, or the arguments are not a JSON object
    pub fn call_to_backend(self, call: &ToolCall) -> Result<BackendToolUse, LlmError> {
        if !is_valid_call_id(&call.id) {
            return Err(LlmError::Conversion(format!("malformed tool call id: {}", call.id)));
        }

        if call.function.name.trim().is_empty() {
            return Err(LlmError::Conversion(format!("tool call {} has no function name", call.id)));
        }

        let input: Value = serde_json::from_str(&call.function.arguments).map_err(|e| {
            LlmError::Conversion(format!("arguments of tool call {} are not valid JSON: {e}", call.id))
        })?;

        if !input.is_object() {
            return Err(LlmError::Conversion(format!(
                "arguments of tool call {} must be a JSON object, got {}",
                call.id,
                json_type_name(&input)
            )));
        }

        Ok(BackendToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input,
        })
    }

    /// Translate a backend tool use into a caller tool call
    pub fn call_from_backend(self, tool_use: &BackendToolUse) -> ToolCall {
        ToolCall::new(tool_use.id.clone(), tool_use.name.clone(), tool_use.input.to_string())
    }
}

/// Parse the caller's flexible `tool_choice` value
///
/// Accepts `"auto"`, `"none"` and `{"type": "function", "function": {"name": ...}}`.
///
/// # Errors
///
/// Returns `LlmError::Conversion` naming the defect ("unknown choice type"
/// or "missing function name")
pub fn parse_tool_choice(value: &Value) -> Result<ToolChoiceConstraint, LlmError> {
    match value {
        Value::String(mode) => match mode.as_str() {
            "auto" => Ok(ToolChoiceConstraint::Auto),
            "none" => Ok(ToolChoiceConstraint::None),
            other => Err(LlmError::Conversion(format!("unknown choice type: {other}"))),
        },
        Value::Object(object) => {
            if let Some(kind) = object.get("type")
                && kind.as_str() != Some("function")
            {
                return Err(LlmError::Conversion(format!("unknown choice type: {kind}")));
            }

            object
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| ToolChoiceConstraint::Function(name.to_owned()))
                .ok_or_else(|| LlmError::Conversion("missing function name".to_owned()))
        }
        other => Err(LlmError::Conversion(format!(
            "unknown choice type: {}",
            json_type_name(other)
        ))),
    }
}

fn is_valid_function_name(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("must be valid regex"))
        .is_match(name)
}

fn empty_schema() -> Value {
    Value::Object(serde_json::Map::new())
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
