//! Run-condition evaluation

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::{
    config::EnvLookup,
    error::{HooksError, Result},
    types::{Conditions, Event},
};

/// A `skip_if` expression
///
/// Forms: `VAR` (set and truthy), `!VAR` (unset or falsy), `VAR=value`,
/// `VAR!=value`. A value is truthy unless it is empty, `0` or `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipExpression {
    Truthy(String),
    Falsy(String),
    Equals(String, String),
    NotEquals(String, String),
}

impl SkipExpression {
    /// Parse an expression
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || HooksError::Config(format!("Invalid skip_if expression '{}'", raw));

        let expression = if let Some((var, value)) = raw.split_once("!=") {
            SkipExpression::NotEquals(var.trim().to_string(), value.trim().to_string())
        } else if let Some((var, value)) = raw.split_once('=') {
            SkipExpression::Equals(var.trim().to_string(), value.trim().to_string())
        } else if let Some(var) = raw.strip_prefix('!') {
            SkipExpression::Falsy(var.trim().to_string())
        } else {
            SkipExpression::Truthy(raw.to_string())
        };

        let var = match &expression {
            SkipExpression::Truthy(v)
            | SkipExpression::Falsy(v)
            | SkipExpression::Equals(v, _)
            | SkipExpression::NotEquals(v, _) => v,
        };
        let valid_name = !var.is_empty()
            && var
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !var.starts_with(|c: char| c.is_ascii_digit());
        if !valid_name {
            return Err(invalid());
        }
        Ok(expression)
    }

    /// Evaluate against the environment
    pub fn holds(&self, env: &EnvLookup) -> bool {
        match self {
            SkipExpression::Truthy(var) => env(var.as_str()).is_some_and(|v| is_truthy(&v)),
            SkipExpression::Falsy(var) => !env(var.as_str()).is_some_and(|v| is_truthy(&v)),
            SkipExpression::Equals(var, value) => env(var.as_str()).is_some_and(|v| v == *value),
            SkipExpression::NotEquals(var, value) => env(var.as_str()).map_or(true, |v| v != *value),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

fn glob_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// Evaluates a hook's conditions against an event
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Decide whether the hook should run
    ///
    /// Returns `Ok(None)` when it should and `Ok(Some(reason))` when one of
    /// the conditions filters it out.
    pub fn evaluate(
        conditions: &Conditions,
        event: &Event,
        env: &EnvLookup,
    ) -> Result<Option<String>> {
        if !conditions.files.is_empty() {
            let patterns = Self::compile(&conditions.files)?;
            let files = event.files();
            let matched = files
                .iter()
                .any(|file| patterns.iter().any(|p| p.matches_with(file, glob_options())));
            if !matched {
                debug!(file_count = files.len(), "No changed file matches the files condition");
                return Ok(Some("no matching files".to_string()));
            }
        }

        if !conditions.branches.is_empty() {
            let patterns = Self::compile(&conditions.branches)?;
            let matched = event
                .branch()
                .is_some_and(|branch| patterns.iter().any(|p| p.matches(branch)));
            if !matched {
                return Ok(Some(format!(
                    "branch {} does not match",
                    event.branch().unwrap_or("<none>")
                )));
            }
        }

        if let Some(raw) = &conditions.skip_if {
            if SkipExpression::parse(raw)?.holds(env) {
                return Ok(Some(format!("skip_if '{}' holds", raw)));
            }
        }

        Ok(None)
    }

    /// Compile glob patterns, failing on the first invalid one
    pub fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
        patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| HooksError::Config(format!("Invalid glob '{}': {}", p, e)))
            })
            .collect()
    }
}
