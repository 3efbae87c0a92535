//! Synthesizes tool-call objects from detected intent

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use uuid::Uuid;

use super::detect::DetectionResult;
use crate::convert::FormatConverter;
use crate::error::LlmError;
use crate::types::{ToolCall, ToolDefinition};

/// Fresh tool-call id of the form `call_<32 hex digits>`
pub fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Fixed argument objects keyed by tool name
#[derive(Debug, Clone, Default)]
pub struct DefaultArguments {
    entries: HashMap<String, Map<String, Value>>,
}

impl DefaultArguments {
    /// Add or replace the arguments for `tool`
    ///
    /// Non-object values are ignored.
    pub fn insert(&mut self, tool: impl Into<String>, arguments: Value) {
        if let Value::Object(object) = arguments {
            self.entries.insert(tool.into(), object);
        }
    }

    /// Arguments registered for `tool`
    pub fn get(&self, tool: &str) -> Option<&Map<String, Value>> {
        self.entries.get(tool)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for DefaultArguments {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut defaults = Self::default();
        for (tool, arguments) in iter {
            defaults.insert(tool, arguments);
        }
        defaults
    }
}

/// Calls produced for one detection result
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    /// Valid calls, in detection order
    pub calls: Vec<ToolCall>,
    /// One entry per dropped call
    pub errors: Vec<LlmError>,
    /// Whether every detected tool produced a call
    pub all_valid: bool,
}

/// Turns detection results into structurally valid tool calls
#[derive(Debug, Clone, Default)]
pub struct ToolCallGenerator {
    defaults: DefaultArguments,
    converter: FormatConverter,
}

impl ToolCallGenerator {
    /// Generator using the given argument table
    pub fn new(defaults: DefaultArguments) -> Self {
        Self {
            defaults,
            converter: FormatConverter,
        }
    }

    /// One call per match, never aborting the batch
    pub fn generate(&self, detection: &DetectionResult, declared: &[ToolDefinition]) -> GenerationOutcome {
        let mut outcome = GenerationOutcome {
            all_valid: true,
            ..GenerationOutcome::default()
        };
        let mut seen_ids = HashSet::new();

        for detected in &detection.matches {
            match self.build_call(&detected.name, declared, &mut seen_ids) {
                Ok(call) => outcome.calls.push(call),
                Err(e) => {
                    tracing::warn!(tool = %detected.name, error = %e, "dropping synthesized tool call");
                    outcome.all_valid = false;
                    outcome.errors.push(e);
                }
            }
        }

        outcome
    }

    fn build_call(
        &self,
        name: &str,
        declared: &[ToolDefinition],
        seen_ids: &mut HashSet<String>,
    ) -> Result<ToolCall, LlmError> {
        let tool = declared
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| LlmError::Generation(format!("tool '{name}' is not declared")))?;

        let arguments = self
            .defaults
            .get(name)
            .cloned()
            .unwrap_or_else(|| arguments_from_schema(tool.function.parameters.as_ref()));

        let mut id = new_call_id();
        while !seen_ids.insert(id.clone()) {
            id = new_call_id();
        }

        let arguments =
            serde_json::to_string(&arguments).map_err(|e| LlmError::Generation(format!("arguments for '{name}': {e}")))?;
        let call = ToolCall::new(id, name, arguments);

        self.converter
            .call_to_backend(&call)
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        Ok(call)
    }
}

/// Object holding every required property of `schema`
///
/// Each value is the property's declared `default`, its first `enum`
/// entry, or a type-neutral value.
fn arguments_from_schema(schema: Option<&Value>) -> Map<String, Value> {
    let Some(schema) = schema else {
        return Map::new();
    };

    let properties = schema.get("properties").and_then(Value::as_object);
    let required = schema.get("required").and_then(Value::as_array);

    required
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(|key| {
            let property = properties.and_then(|p| p.get(key));
            (key.to_owned(), placeholder(property))
        })
        .collect()
}

fn placeholder(property: Option<&Value>) -> Value {
    let Some(property) = property else {
        return Value::Null;
    };

    if let Some(default) = property.get("default") {
        return default.clone();
    }

    if let Some(first) = property.get("enum").and_then(Value::as_array).and_then(|e| e.first()) {
        return first.clone();
    }

    let kind = match property.get("type") {
        Some(Value::String(kind)) => Some(kind.as_str()),
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).find(|k| *k != "null"),
        _ => None,
    };

    match kind {
        Some("string") => Value::String(String::new()),
        Some("integer" | "number") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => Value::Object(Map::new()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::detect::DetectedTool;
    use crate::tools::is_valid_call_id;

    fn detection(names: &[&str]) -> DetectionResult {
        DetectionResult {
            needs_tools: !names.is_empty(),
            matches: names
                .iter()
                .map(|name| DetectedTool {
                    name: (*name).to_owned(),
                    span: 0..0,
                })
                .collect(),
        }
    }

    fn declared() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                "get_weather",
                None,
                Some(json!({
                    "type": "object",
                    "properties": {
                        "location": {"type": "string"},
                        "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]},
                        "days": {"type": "integer", "default": 3},
                        "verbose": {"type": ["null", "boolean"]}
                    },
                    "required": ["location", "unit", "days", "verbose"]
                })),
            ),
            ToolDefinition::function("search_web", None, None),
        ]
    }

    #[test]
    fn ids_are_well_formed_and_unique() {
        let generator = ToolCallGenerator::default();
        let outcome = generator.generate(&detection(&["get_weather", "search_web"]), &declared());

        assert!(outcome.all_valid);
        assert_eq!(outcome.calls.len(), 2);
        assert!(outcome.calls.iter().all(|c| is_valid_call_id(&c.id)));
        assert_ne!(outcome.calls[0].id, outcome.calls[1].id);
        assert_eq!(outcome.calls[0].id.len(), "call_".len() + 32);
    }

    #[test]
    fn schema_required_properties_drive_arguments() {
        let outcome = ToolCallGenerator::default().generate(&detection(&["get_weather"]), &declared());
        let arguments: Value = serde_json::from_str(&outcome.calls[0].function.arguments).unwrap();
        assert_eq!(
            arguments,
            json!({"location": "", "unit": "celsius", "days": 3, "verbose": false})
        );
    }

    #[test]
    fn table_entries_override_schema() {
        let defaults: DefaultArguments = [("get_weather", json!({"location": "Paris"}))].into_iter().collect();
        let outcome = ToolCallGenerator::new(defaults).generate(&detection(&["get_weather"]), &declared());
        assert_eq!(outcome.calls[0].function.arguments, r#"{"location":"Paris"}"#);
    }

    #[test]
    fn schemaless_tool_gets_empty_object() {
        let outcome = ToolCallGenerator::default().generate(&detection(&["search_web"]), &declared());
        assert_eq!(outcome.calls[0].function.arguments, "{}");
    }

    #[test]
    fn undeclared_match_is_dropped_not_fatal() {
        let outcome = ToolCallGenerator::default().generate(&detection(&["get_weather", "send_email"]), &declared());
        assert!(!outcome.all_valid);
        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind(), crate::error::ErrorKind::Generation);
    }

    #[test]
    fn empty_detection_is_trivially_valid() {
        let outcome = ToolCallGenerator::default().generate(&DetectionResult::default(), &declared());
        assert!(outcome.all_valid);
        assert!(outcome.calls.is_empty());
    }
}
