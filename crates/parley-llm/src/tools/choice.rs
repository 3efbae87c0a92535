//! Tool-choice enforcement
//!
//! Validates a completed assistant turn against the caller's
//! [`ToolChoiceConstraint`], decides on a corrective action and applies it.
//! Everything here is a pure function of the constraint and the turn; the
//! only state is the substitutable validator and the options.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parley_config::ToolsConfig;
use serde::Serialize;

use crate::error::LlmError;
use crate::types::{AssistantTurn, FinishReason, ToolChoiceConstraint};

/// Text substituted when a `none` constraint strips a turn down to nothing
pub const TEXT_ONLY_FALLBACK: &str = "I can provide a text response. How can I help you?";

/// What a violation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Tool calls present where none, or not these, were allowed
    UnexpectedToolCalls,
    /// A function was forced but nothing was called
    MissingForcedFunction,
    /// A function was forced but only other functions were called
    WrongFunctionCalled,
}

/// How bad a violation is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The turn does not comply
    Error,
    /// The turn complies but carries extras
    Warning,
}

/// A single mismatch between constraint and turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceViolation {
    /// Violation category
    pub kind: ViolationKind,
    /// Error or warning
    pub severity: Severity,
    /// What the constraint asked for
    pub expected_behavior: String,
    /// What the turn actually did
    pub actual_behavior: String,
}

impl ChoiceViolation {
    /// Whether this violation breaks compliance
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Corrective action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    /// Leave the turn alone
    None,
    /// Drop extra tool calls
    FilterTools,
    /// Strip every tool call
    ForceTextOnly,
    /// Keep only calls to the forced function
    ForceFunction,
    /// The turn cannot be served
    RejectResponse,
}

/// Decided action plus a human-readable list of what it changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementAction {
    /// Action category
    pub kind: ActionKind,
    /// Descriptions of the modifications applied
    pub modifications: Vec<String>,
    /// Whether compliance depends on this action
    pub was_required: bool,
}

impl EnforcementAction {
    fn new(kind: ActionKind, was_required: bool, modifications: Vec<String>) -> Self {
        Self {
            kind,
            modifications,
            was_required,
        }
    }

    /// No-op action
    pub fn none() -> Self {
        Self::new(ActionKind::None, false, Vec::new())
    }

    fn reject() -> Self {
        Self::new(ActionKind::RejectResponse, true, Vec::new())
    }
}

/// Enforcement knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcementOptions {
    /// Whether the time budget applies
    pub enforce_timeout: bool,
    /// Time budget for one enforcement pass
    pub timeout: Duration,
    /// Accept a corrected turn that still carries error violations
    pub allow_partial_compliance: bool,
}

impl Default for EnforcementOptions {
    fn default() -> Self {
        Self {
            enforce_timeout: true,
            timeout: Duration::from_millis(5000),
            allow_partial_compliance: false,
        }
    }
}

impl From<&ToolsConfig> for EnforcementOptions {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            enforce_timeout: config.enforce_timeout,
            timeout: Duration::from_millis(config.enforce_timeout_ms),
            allow_partial_compliance: config.allow_partial_compliance,
        }
    }
}

/// Outcome of one enforcement pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementResult {
    /// Whether the final turn may be served as compliant
    pub success: bool,
    /// The turn after modification, `None` when there was nothing to check
    pub response: Option<AssistantTurn>,
    /// Action taken
    pub action: EnforcementAction,
    /// Violations found before modification
    pub violations: Vec<ChoiceViolation>,
    /// Internal failures, including timeouts
    pub errors: Vec<String>,
    /// Whether the time budget was exceeded
    pub timed_out: bool,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

impl EnforcementResult {
    fn rejected(response: Option<AssistantTurn>, violations: Vec<ChoiceViolation>, error: String, elapsed: Duration) -> Self {
        Self {
            success: false,
            response,
            action: EnforcementAction::reject(),
            violations,
            errors: vec![error],
            timed_out: false,
            elapsed,
        }
    }
}

/// Computes the violations of a turn against a constraint
pub trait ChoiceValidator: Send + Sync + fmt::Debug {
    /// Violations of `constraint` found in `response`
    ///
    /// # Errors
    ///
    /// Any error turns the enforcement pass into a rejection
    fn validate(
        &self,
        constraint: &ToolChoiceConstraint,
        response: &AssistantTurn,
    ) -> Result<Vec<ChoiceViolation>, LlmError>;
}

/// Rule-based validator covering `auto`, `none` and forced functions
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl ChoiceValidator for ConstraintValidator {
    fn validate(
        &self,
        constraint: &ToolChoiceConstraint,
        response: &AssistantTurn,
    ) -> Result<Vec<ChoiceViolation>, LlmError> {
        let called = response.called_functions();

        let violations = match constraint {
            ToolChoiceConstraint::Auto => Vec::new(),
            ToolChoiceConstraint::None if called.is_empty() => Vec::new(),
            ToolChoiceConstraint::None => vec![ChoiceViolation {
                kind: ViolationKind::UnexpectedToolCalls,
                severity: Severity::Error,
                expected_behavior: "no tool calls".to_owned(),
                actual_behavior: format!("called {}", called.join(", ")),
            }],
            ToolChoiceConstraint::Function(name) if called.is_empty() => vec![ChoiceViolation {
                kind: ViolationKind::MissingForcedFunction,
                severity: Severity::Error,
                expected_behavior: format!("call function \"{name}\""),
                actual_behavior: "no tool calls".to_owned(),
            }],
            ToolChoiceConstraint::Function(name) => {
                let mut violations = Vec::new();
                if !called.contains(&name.as_str()) {
                    violations.push(ChoiceViolation {
                        kind: ViolationKind::WrongFunctionCalled,
                        severity: Severity::Error,
                        expected_behavior: format!("call function \"{name}\""),
                        actual_behavior: format!("called {}", called.join(", ")),
                    });
                }

                let others: Vec<_> = called.iter().filter(|c| **c != name.as_str()).copied().collect();
                if !others.is_empty() {
                    violations.push(ChoiceViolation {
                        kind: ViolationKind::UnexpectedToolCalls,
                        severity: Severity::Warning,
                        expected_behavior: format!("only \"{name}\" calls"),
                        actual_behavior: format!("also called {}", others.join(", ")),
                    });
                }
                violations
            }
        };

        Ok(violations)
    }
}

/// Applies a choice constraint to completed turns
#[derive(Debug, Clone)]
pub struct ChoiceEnforcer {
    validator: Arc<dyn ChoiceValidator>,
    options: EnforcementOptions,
}

impl Default for ChoiceEnforcer {
    fn default() -> Self {
        Self::new(EnforcementOptions::default())
    }
}

impl ChoiceEnforcer {
    /// Enforcer with the rule-based validator
    pub fn new(options: EnforcementOptions) -> Self {
        Self::with_validator(Arc::new(ConstraintValidator), options)
    }

    /// Enforcer with a custom validator
    pub fn with_validator(validator: Arc<dyn ChoiceValidator>, options: EnforcementOptions) -> Self {
        Self { validator, options }
    }

    /// Active options
    pub const fn options(&self) -> &EnforcementOptions {
        &self.options
    }

    /// Violations of `constraint` in `response`
    ///
    /// # Errors
    ///
    /// Propagates validator failures
    pub fn validate(
        &self,
        constraint: &ToolChoiceConstraint,
        response: &AssistantTurn,
    ) -> Result<Vec<ChoiceViolation>, LlmError> {
        self.validator.validate(constraint, response)
    }

    /// Pick the corrective action for a set of violations
    pub fn decide_action(constraint: &ToolChoiceConstraint, violations: &[ChoiceViolation]) -> EnforcementAction {
        if violations.is_empty() {
            return EnforcementAction::none();
        }

        let has_error = violations.iter().any(ChoiceViolation::is_error);

        match constraint {
            ToolChoiceConstraint::None if has_error => EnforcementAction::new(
                ActionKind::ForceTextOnly,
                true,
                vec!["Removed all tool calls".to_owned(), "Set finish_reason to stop".to_owned()],
            ),
            ToolChoiceConstraint::Function(name) if has_error => EnforcementAction::new(
                ActionKind::ForceFunction,
                true,
                vec![format!("Filtered to only \"{name}\" calls")],
            ),
            _ if !has_error => EnforcementAction::new(ActionKind::FilterTools, false, Vec::new()),
            _ => EnforcementAction::reject(),
        }
    }

    /// Bring `response` in line with `constraint`
    pub fn modify(constraint: &ToolChoiceConstraint, response: &AssistantTurn) -> AssistantTurn {
        match constraint {
            ToolChoiceConstraint::Auto => response.clone(),
            ToolChoiceConstraint::None => {
                let content = if response.content_is_empty() {
                    Some(TEXT_ONLY_FALLBACK.to_owned())
                } else {
                    response.content.clone()
                };
                AssistantTurn {
                    content,
                    tool_calls: Vec::new(),
                    finish_reason: FinishReason::Stop,
                }
            }
            ToolChoiceConstraint::Function(name) => {
                let tool_calls: Vec<_> = response
                    .tool_calls
                    .iter()
                    .filter(|call| call.name() == name)
                    .cloned()
                    .collect();
                let finish_reason = if tool_calls.is_empty() {
                    if response.finish_reason == FinishReason::ToolCalls {
                        FinishReason::Stop
                    } else {
                        response.finish_reason
                    }
                } else {
                    FinishReason::ToolCalls
                };
                AssistantTurn {
                    content: response.content.clone(),
                    tool_calls,
                    finish_reason,
                }
            }
        }
    }

    /// Validate, decide, modify and re-check within the time budget
    ///
    /// Never fails: validator errors and timeouts become a
    /// `reject_response` result.
    pub fn enforce(&self, constraint: &ToolChoiceConstraint, response: Option<AssistantTurn>) -> EnforcementResult {
        let start = Instant::now();

        let Some(response) = response else {
            return EnforcementResult {
                success: true,
                response: None,
                action: EnforcementAction::none(),
                violations: Vec::new(),
                errors: Vec::new(),
                timed_out: false,
                elapsed: start.elapsed(),
            };
        };

        let violations = match self.validator.validate(constraint, &response) {
            Ok(violations) => violations,
            Err(e) => {
                tracing::error!(constraint = %constraint, error = %e, "choice validation failed");
                return EnforcementResult::rejected(Some(response), Vec::new(), e.to_string(), start.elapsed());
            }
        };

        let action = Self::decide_action(constraint, &violations);
        let modified = match action.kind {
            ActionKind::None | ActionKind::RejectResponse => response,
            ActionKind::FilterTools | ActionKind::ForceTextOnly | ActionKind::ForceFunction => {
                Self::modify(constraint, &response)
            }
        };

        let remaining = match self.validator.validate(constraint, &modified) {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::error!(constraint = %constraint, error = %e, "choice re-validation failed");
                return EnforcementResult::rejected(Some(modified), violations, e.to_string(), start.elapsed());
            }
        };

        let elapsed = start.elapsed();
        if self.options.enforce_timeout && elapsed > self.options.timeout {
            let error = LlmError::Timeout {
                elapsed_ms: elapsed.as_millis(),
                budget_ms: self.options.timeout.as_millis(),
            };
            tracing::warn!(constraint = %constraint, error = %error, "choice enforcement over budget");
            return EnforcementResult {
                timed_out: true,
                ..EnforcementResult::rejected(Some(modified), violations, error.to_string(), elapsed)
            };
        }

        let compliant = !remaining.iter().any(ChoiceViolation::is_error);
        let success =
            compliant || (self.options.allow_partial_compliance && action.kind != ActionKind::RejectResponse);

        if action.kind != ActionKind::None {
            tracing::debug!(
                constraint = %constraint,
                action = %action.kind,
                violations = violations.len(),
                success,
                "tool choice enforced"
            );
        }

        EnforcementResult {
            success,
            response: Some(modified),
            action,
            violations,
            errors: Vec::new(),
            timed_out: false,
            elapsed,
        }
    }
}
