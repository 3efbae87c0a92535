use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` placeholders in raw TOML text
///
/// `{{ env.VAR | default("fallback") }}` substitutes the fallback when the
/// variable is unset. Comment lines are left untouched so commented-out
/// secrets never have to exist in the environment.
pub fn expand_env(input: &str) -> Result<String, String> {
    input
        .split('\n')
        .map(|line| {
            if line.trim_start().starts_with('#') {
                Ok(Cow::Borrowed(line))
            } else {
                expand_line(line)
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|lines| lines.join("\n"))
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Group 1: scoped key, group 2: optional default("...") value
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
    })
}

fn expand_line(line: &str) -> Result<Cow<'_, str>, String> {
    let mut failure: Option<String> = None;

    let expanded = placeholder().replace_all(line, |captures: &Captures<'_>| {
        let fallback = captures.get(2).map(|m| m.as_str());
        resolve(&captures[1], fallback).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            String::new()
        })
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(expanded),
    }
}

fn resolve(key: &str, fallback: Option<&str>) -> Result<String, String> {
    let Some(var_name) = key.strip_prefix("env.").filter(|name| !name.is_empty() && !name.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match (std::env::var(var_name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{var_name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "[backend]\nmodels = [\"sonnet\"]\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn variables_are_substituted() {
        let vars = [("PARLEY_A", Some("alpha")), ("PARLEY_B", Some("beta"))];
        temp_env::with_vars(vars, || {
            let result = expand_env("a = \"{{ env.PARLEY_A }}\"\nb = \"{{env.PARLEY_B}}-{{ env.PARLEY_A }}\"").unwrap();
            assert_eq!(result, "a = \"alpha\"\nb = \"beta-alpha\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("PARLEY_MISSING", || {
            let err = expand_env("key = \"{{ env.PARLEY_MISSING }}\"").unwrap_err();
            assert!(err.contains("PARLEY_MISSING"));
        });
    }

    #[test]
    fn non_env_scope_is_an_error() {
        let err = expand_env("key = \"{{ vault.TOKEN }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comment_lines_are_skipped() {
        temp_env::with_var_unset("PARLEY_MISSING", || {
            let input = "  # api_key = \"{{ env.PARLEY_MISSING }}\"\nkey = 1";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("PARLEY_OPTIONAL", || {
            let result = expand_env("key = \"{{ env.PARLEY_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"fallback\"");
        });

        temp_env::with_var("PARLEY_OPTIONAL", Some("set"), || {
            let result = expand_env("key = \"{{ env.PARLEY_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"set\"");
        });
    }

    #[test]
    fn empty_default_is_allowed() {
        temp_env::with_var_unset("PARLEY_OPTIONAL", || {
            let result = expand_env("key = \"{{ env.PARLEY_OPTIONAL | default(\"\") }}\"").unwrap();
            assert_eq!(result, "key = \"\"");
        });
    }
}
