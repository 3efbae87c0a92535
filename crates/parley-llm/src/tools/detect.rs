//! Lexical tool-intent detection over completed backend text
//!
//! Detection is a best-effort heuristic. A candidate phrase only becomes a
//! match when it resolves to a declared tool name, so the detector never
//! reports a tool the caller did not offer.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::ToolDefinition;

/// Scans text for implied tool invocations
pub trait ToolIntentDetector: Send + Sync + fmt::Debug {
    /// Detect intent in `text`, matching only against `declared`
    fn detect(&self, text: &str, declared: &[ToolDefinition]) -> DetectionResult;
}

/// One declared tool the text appears to invoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedTool {
    /// Declared tool name
    pub name: String,
    /// Byte range of the sentence the cue was found in
    pub span: Range<usize>,
}

/// Outcome of a detection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
    /// Whether any declared tool was matched
    pub needs_tools: bool,
    /// Matches ordered by first appearance, unique by name
    pub matches: Vec<DetectedTool>,
}

impl DetectionResult {
    /// Matched tool names, in order
    pub fn tool_names(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.name.clone()).collect()
    }

    /// `text` with every sentence that carried a tool cue removed
    ///
    /// Returns `None` when nothing readable is left.
    pub fn cleaned_content(&self, text: &str) -> Option<String> {
        if self.matches.is_empty() {
            return Some(text.to_owned()).filter(|t| !t.trim().is_empty());
        }

        let mut spans: Vec<_> = self.matches.iter().map(|m| m.span.clone()).collect();
        spans.sort_by_key(|s| s.start);

        let mut kept = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in spans {
            if span.start > cursor {
                kept.push_str(&text[cursor..span.start]);
            }
            cursor = cursor.max(span.end);
        }
        kept.push_str(&text[cursor.min(text.len())..]);

        let mut lines: Vec<String> = Vec::new();
        for line in kept.lines() {
            let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if line.is_empty() && lines.last().is_none_or(String::is_empty) {
                continue;
            }
            lines.push(line);
        }
        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }

        Some(lines.join("\n")).filter(|t| !t.is_empty())
    }
}

/// Pulls a candidate tool phrase out of a rule match
pub type Extractor = fn(&Captures<'_>) -> Option<String>;

/// A named lexical pattern plus the function that extracts its candidate
#[derive(Clone)]
pub struct DetectionRule {
    name: String,
    pattern: Regex,
    extractor: Extractor,
}

impl DetectionRule {
    /// Compile a rule
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern
    pub fn new(name: impl Into<String>, pattern: &str, extractor: Extractor) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            extractor,
        })
    }

    /// Rule name, used in trace output
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DetectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Extractor reading the `tool` capture group
pub fn tool_group(captures: &Captures<'_>) -> Option<String> {
    captures
        .name("tool")
        .map(|m| m.as_str().trim_matches('`').to_owned())
        .filter(|s| !s.is_empty())
}

const TOOL: &str = r"`?(?P<tool>[A-Za-z_][A-Za-z0-9_-]*)`?";

static DEFAULT_RULES: LazyLock<Vec<DetectionRule>> = LazyLock::new(|| {
    let rule = |name: &str, pattern: String| DetectionRule::new(name, &pattern, tool_group).unwrap();
    vec![
        rule(
            "explicit_intent",
            format!(
                r"(?i)\bI(?:['’]ll|\s+will|['’]m\s+going\s+to|\s+am\s+going\s+to)\s+(?:use|call|invoke|run)\s+(?:the\s+)?{TOOL}"
            ),
        ),
        rule(
            "let_me",
            format!(r"(?i)\blet\s+me\s+(?:use|call|invoke|run|try)\s+(?:the\s+)?{TOOL}"),
        ),
        rule(
            "using_the",
            format!(r"(?i)\busing\s+(?:the\s+)?{TOOL}\s+(?:tool|function)\b"),
        ),
        rule("call_syntax", r"\b(?P<tool>[A-Za-z_][A-Za-z0-9_]*)\(".to_owned()),
    ]
});

const VERB_PREFIXES: &[&str] = &[
    "get", "fetch", "retrieve", "lookup", "look", "search", "find", "list", "query", "create", "update", "delete",
    "run", "execute", "read", "write", "send", "check",
];

/// Built-in alias entries; no two phrases share a normalized form
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("web_search", "search_web"),
    ("search_the_web", "search_web"),
    ("bash", "run_command"),
    ("shell", "run_command"),
    ("terminal", "run_command"),
    ("calculator", "calculate"),
];

/// Maps candidate phrases to declared tool names
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// Table with the built-in aliases
    pub fn builtin() -> Self {
        BUILTIN_ALIASES.iter().copied().collect()
    }

    /// Add or replace one alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl AsRef<str>, target: impl Into<String>) -> Self {
        self.insert(alias, target);
        self
    }

    /// Add or replace one alias in place
    pub fn insert(&mut self, alias: impl AsRef<str>, target: impl Into<String>) {
        self.aliases.insert(normalize(alias.as_ref()), target.into());
    }

    /// Resolve a candidate phrase to a declared tool name
    ///
    /// Tries, in order: exact name, case and separator insensitive name,
    /// alias entries, then declared names with a leading verb stripped.
    pub fn resolve<'a>(&self, candidate: &str, declared: &'a [ToolDefinition]) -> Option<&'a str> {
        if let Some(tool) = declared.iter().find(|t| t.name() == candidate) {
            return Some(tool.name());
        }

        let normalized = normalize(candidate);
        if normalized.is_empty() {
            return None;
        }

        if let Some(name) = find_normalized(&normalized, declared) {
            return Some(name);
        }

        if let Some(name) = self
            .aliases
            .get(&normalized)
            .and_then(|target| find_normalized(&normalize(target), declared))
        {
            return Some(name);
        }

        let stripped = strip_verb(candidate);
        declared
            .iter()
            .find(|t| {
                let declared_stripped = strip_verb(t.name());
                !declared_stripped.is_empty() && (declared_stripped == stripped || declared_stripped == normalized)
            })
            .map(ToolDefinition::name)
    }
}

impl<A: AsRef<str>, T: Into<String>> FromIterator<(A, T)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (A, T)>>(iter: I) -> Self {
        let mut table = Self::default();
        for (alias, target) in iter {
            table.insert(alias, target);
        }
        table
    }
}

fn find_normalized<'a>(normalized: &str, declared: &'a [ToolDefinition]) -> Option<&'a str> {
    declared
        .iter()
        .find(|t| normalize(t.name()) == normalized)
        .map(ToolDefinition::name)
}

/// Lowercase with every non-alphanumeric character removed
fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Normalized name with a leading verb segment removed
fn strip_verb(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mut segments = lower.split(|c: char| c == '_' || c == '-' || c.is_whitespace());
    match segments.next() {
        Some(first) if VERB_PREFIXES.contains(&first) => segments.collect::<String>(),
        _ => normalize(name),
    }
}

/// Byte ranges of the sentences in `text`
///
/// A sentence ends at a newline, or at `.`, `!` or `?` followed by
/// whitespace or the end of the text.
fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\n' => Some(i),
            '.' | '!' | '?' if chars.peek().is_none_or(|(_, next)| next.is_whitespace()) => Some(i + c.len_utf8()),
            _ => None,
        };

        if let Some(end) = end {
            if !text[start..end].trim().is_empty() {
                spans.push(start..end);
            }
            start = if c == '\n' { i + 1 } else { end };
        }
    }

    if start < text.len() && !text[start..].trim().is_empty() {
        spans.push(start..text.len());
    }

    spans
}

/// Rule-list detector
#[derive(Debug, Clone)]
pub struct LexicalDetector {
    rules: Vec<DetectionRule>,
    aliases: AliasTable,
}

impl Default for LexicalDetector {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.clone(), AliasTable::builtin())
    }
}

impl LexicalDetector {
    /// Detector with explicit rules and aliases
    pub const fn new(rules: Vec<DetectionRule>, aliases: AliasTable) -> Self {
        Self { rules, aliases }
    }

    /// Default rules with extra aliases layered over the built-in ones
    pub fn with_aliases<A, T>(aliases: impl IntoIterator<Item = (A, T)>) -> Self
    where
        A: AsRef<str>,
        T: Into<String>,
    {
        let mut table = AliasTable::builtin();
        for (alias, target) in aliases {
            table.insert(alias, target);
        }
        Self::new(DEFAULT_RULES.clone(), table)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }
}

impl ToolIntentDetector for LexicalDetector {
    fn detect(&self, text: &str, declared: &[ToolDefinition]) -> DetectionResult {
        if text.trim().is_empty() || declared.is_empty() {
            return DetectionResult::default();
        }

        let sentences = sentence_spans(text);
        let mut hits: Vec<(usize, &str, Range<usize>)> = Vec::new();

        for rule in &self.rules {
            for captures in rule.pattern.captures_iter(text) {
                let Some(candidate) = (rule.extractor)(&captures) else {
                    continue;
                };
                let Some(name) = self.aliases.resolve(&candidate, declared) else {
                    tracing::trace!(rule = rule.name(), candidate = %candidate, "candidate did not resolve");
                    continue;
                };

                let Some(whole) = captures.get(0) else { continue };
                let at = whole.start();
                let span = sentences
                    .iter()
                    .find(|s| s.contains(&at))
                    .cloned()
                    .unwrap_or_else(|| whole.range());

                tracing::trace!(rule = rule.name(), tool = name, "tool cue matched");
                hits.push((at, name, span));
            }
        }

        hits.sort_by_key(|(at, ..)| *at);

        let mut matches: Vec<DetectedTool> = Vec::new();
        for (_, name, span) in hits {
            if matches.iter().all(|m| m.name != name) {
                matches.push(DetectedTool {
                    name: name.to_owned(),
                    span,
                });
            }
        }

        DetectionResult {
            needs_tools: !matches.is_empty(),
            matches,
        }
    }
}
