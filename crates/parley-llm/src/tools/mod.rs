//! Tool-calling adapter: detection, synthesis and choice enforcement
//!
//! [`ToolCallingPass`] runs the three stages over one fully accumulated
//! backend response. Both the streaming and the non-streaming path go
//! through it, so the choice constraint is applied identically.

pub mod choice;
pub mod detect;
pub mod generate;

use std::sync::{Arc, LazyLock};

use parley_config::ToolsConfig;
use regex::Regex;

pub use choice::{
    ActionKind, ChoiceEnforcer, ChoiceValidator, ChoiceViolation, ConstraintValidator, EnforcementAction,
    EnforcementOptions, EnforcementResult, Severity, ViolationKind,
};
pub use detect::{AliasTable, DetectedTool, DetectionResult, DetectionRule, LexicalDetector, ToolIntentDetector};
pub use generate::{DefaultArguments, GenerationOutcome, ToolCallGenerator, new_call_id};

use crate::error::LlmError;
use crate::types::{AssistantTurn, FinishReason, FrameMetadata, ToolChoiceConstraint, ToolDefinition};

static CALL_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^call_[A-Za-z0-9_-]+$").unwrap());

/// Whether `id` has the `call_<token>` shape
pub fn is_valid_call_id(id: &str) -> bool {
    CALL_ID_RE.is_match(id)
}

/// Result of one detection, synthesis and enforcement pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Final assistant turn
    pub turn: AssistantTurn,
    /// Declared tools the detector matched, in order
    pub detected_tools: Vec<String>,
    /// Synthesized calls that were dropped as invalid
    pub dropped_calls: usize,
    /// Action the enforcer took
    pub action: ActionKind,
    /// Whether the final turn complies with the constraint
    pub compliant: bool,
    /// Violations found before correction
    pub violations: Vec<ChoiceViolation>,
}

impl PassOutcome {
    /// Terminal-frame metadata for a stream of `fragments` fragments
    pub fn metadata(&self, fragments: usize) -> FrameMetadata {
        FrameMetadata {
            fragments,
            detected_tools: self.detected_tools.clone(),
            action: self.action,
            compliant: self.compliant,
            violations: self.violations.clone(),
        }
    }
}

/// Detector, generator and enforcer wired together
#[derive(Debug, Clone)]
pub struct ToolCallingPass {
    detector: Arc<dyn ToolIntentDetector>,
    generator: ToolCallGenerator,
    enforcer: ChoiceEnforcer,
}

impl Default for ToolCallingPass {
    fn default() -> Self {
        Self::new(
            Arc::new(LexicalDetector::default()),
            ToolCallGenerator::default(),
            ChoiceEnforcer::default(),
        )
    }
}

impl ToolCallingPass {
    /// Pass from explicit parts
    pub fn new(detector: Arc<dyn ToolIntentDetector>, generator: ToolCallGenerator, enforcer: ChoiceEnforcer) -> Self {
        Self {
            detector,
            generator,
            enforcer,
        }
    }

    /// Pass configured from the `[tools]` section
    pub fn from_config(config: &ToolsConfig) -> Self {
        let detector = LexicalDetector::with_aliases(config.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let defaults = config
            .default_arguments
            .iter()
            .map(|(tool, arguments)| (tool.as_str(), arguments.clone()))
            .collect();

        Self::new(
            Arc::new(detector),
            ToolCallGenerator::new(defaults),
            ChoiceEnforcer::new(EnforcementOptions::from(config)),
        )
    }

    /// Run detection, synthesis and enforcement over completed `text`
    ///
    /// Cue sentences are only removed from the content when tool calls
    /// survive enforcement.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Timeout` when enforcement ran over budget and
    /// `LlmError::Enforcement` for any other rejected response
    pub fn run(
        &self,
        text: &str,
        declared: &[ToolDefinition],
        constraint: &ToolChoiceConstraint,
    ) -> Result<PassOutcome, LlmError> {
        let detection = if declared.is_empty() {
            DetectionResult::default()
        } else {
            self.detector.detect(text, declared)
        };

        let generation = self.generator.generate(&detection, declared);
        let raw_content = Some(text.to_owned()).filter(|t| !t.trim().is_empty());
        let turn = AssistantTurn::with_tool_calls(raw_content, generation.calls);

        let enforcement = self.enforcer.enforce(constraint, Some(turn));

        if enforcement.action.kind == ActionKind::RejectResponse {
            if enforcement.timed_out {
                return Err(LlmError::Timeout {
                    elapsed_ms: enforcement.elapsed.as_millis(),
                    budget_ms: self.enforcer.options().timeout.as_millis(),
                });
            }
            return Err(LlmError::Enforcement(enforcement.errors.join("; ")));
        }

        let Some(mut turn) = enforcement.response else {
            return Err(LlmError::Enforcement("enforcement produced no response".to_owned()));
        };

        if turn.tool_calls.is_empty() {
            if turn.finish_reason == FinishReason::ToolCalls {
                turn.finish_reason = FinishReason::Stop;
            }
        } else {
            turn.content = detection.cleaned_content(text);
        }

        Ok(PassOutcome {
            turn,
            detected_tools: detection.tool_names(),
            dropped_calls: generation.errors.len(),
            action: enforcement.action.kind,
            compliant: enforcement.success,
            violations: enforcement.violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn declared() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                "get_weather",
                Some("Get current weather".to_owned()),
                Some(json!({
                    "type": "object",
                    "properties": {"location": {"type": "string"}},
                    "required": ["location"]
                })),
            ),
            ToolDefinition::function("search_web", None, None),
        ]
    }

    #[test]
    fn call_id_shape() {
        assert!(is_valid_call_id("call_abc123"));
        assert!(is_valid_call_id("call_a-b_c"));
        assert!(!is_valid_call_id("call_"));
        assert!(!is_valid_call_id("toolu_123"));
        assert!(!is_valid_call_id("call_a b"));
    }

    #[test]
    fn auto_synthesizes_calls_and_cleans_content() {
        let pass = ToolCallingPass::default();
        let outcome = pass
            .run(
                "Sure. I'll use get_weather for Paris.",
                &declared(),
                &ToolChoiceConstraint::Auto,
            )
            .unwrap();

        assert_eq!(outcome.turn.called_functions(), ["get_weather"]);
        assert_eq!(outcome.turn.finish_reason, FinishReason::ToolCalls);
        assert_eq!(outcome.turn.content.as_deref(), Some("Sure."));
        assert_eq!(outcome.action, ActionKind::None);
        assert!(outcome.compliant);
    }

    #[test]
    fn none_scenario_returns_text_only() {
        let text = "I'll use get_weather to look that up.";
        let outcome = ToolCallingPass::default()
            .run(text, &declared(), &ToolChoiceConstraint::None)
            .unwrap();

        assert!(outcome.turn.tool_calls.is_empty());
        assert_eq!(outcome.turn.finish_reason, FinishReason::Stop);
        assert_eq!(outcome.turn.content.as_deref(), Some(text));
        assert_eq!(outcome.action, ActionKind::ForceTextOnly);
        assert!(outcome.compliant);
        assert_eq!(outcome.detected_tools, ["get_weather"]);
    }

    #[test]
    fn forced_function_scenario_reports_non_compliance() {
        let outcome = ToolCallingPass::default()
            .run(
                "Let me use search_web to find it.",
                &declared(),
                &ToolChoiceConstraint::Function("get_weather".to_owned()),
            )
            .unwrap();

        assert!(outcome.turn.tool_calls.is_empty());
        assert_eq!(outcome.turn.finish_reason, FinishReason::Stop);
        assert_eq!(outcome.turn.content.as_deref(), Some("Let me use search_web to find it."));
        assert_eq!(outcome.action, ActionKind::ForceFunction);
        assert!(!outcome.compliant);
        assert_eq!(outcome.violations.len(), 2);
    }

    #[test]
    fn plain_text_without_tools_passes_through() {
        let outcome = ToolCallingPass::default()
            .run("Hello there!", &[], &ToolChoiceConstraint::Auto)
            .unwrap();
        assert_eq!(outcome.turn, AssistantTurn::text("Hello there!"));
        assert!(outcome.detected_tools.is_empty());
    }

    #[test]
    fn config_feeds_aliases_and_arguments() {
        let mut config = ToolsConfig::default();
        config.aliases.insert("forecast".to_owned(), "get_weather".to_owned());
        config
            .default_arguments
            .insert("get_weather".to_owned(), json!({"location": "Paris"}));

        let outcome = ToolCallingPass::from_config(&config)
            .run("Let me use the forecast tool.", &declared(), &ToolChoiceConstraint::Auto)
            .unwrap();

        assert_eq!(outcome.turn.tool_calls[0].function.arguments, r#"{"location":"Paris"}"#);
        assert_eq!(outcome.turn.content, None);
    }

    #[derive(Debug)]
    struct SlowValidator;

    impl ChoiceValidator for SlowValidator {
        fn validate(
            &self,
            _: &ToolChoiceConstraint,
            _: &AssistantTurn,
        ) -> Result<Vec<ChoiceViolation>, LlmError> {
            std::thread::sleep(Duration::from_millis(10));
            Ok(Vec::new())
        }
    }

    #[test]
    fn timeout_surfaces_as_timeout_error() {
        let enforcer = ChoiceEnforcer::with_validator(
            Arc::new(SlowValidator),
            EnforcementOptions {
                timeout: Duration::from_millis(1),
                ..EnforcementOptions::default()
            },
        );
        let pass = ToolCallingPass::new(Arc::new(LexicalDetector::default()), ToolCallGenerator::default(), enforcer);

        let err = pass.run("hi", &declared(), &ToolChoiceConstraint::Auto).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
    }
}
