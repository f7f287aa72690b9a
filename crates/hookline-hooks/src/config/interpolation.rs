//! `${VAR:default}` interpolation of configuration values

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_yaml::Value;

use crate::config::EnvLookup;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}")
            .expect("placeholder regex is valid")
    })
}

/// Numbers and booleans produced by interpolation keep their YAML type so
/// `timeout_ms: ${LINT_TIMEOUT:5000}` still deserializes as an integer.
fn typed_scalar(text: String) -> Value {
    match serde_yaml::from_str::<Value>(&text) {
        Ok(typed @ (Value::Number(_) | Value::Bool(_))) => typed,
        _ => Value::String(text),
    }
}

/// Replaces `${VAR}` and `${VAR:default}` placeholders with environment values
///
/// `VAR` falls back to `default` when unset or empty; without a default an
/// unset variable becomes the empty string.
pub struct Interpolator<'a> {
    env: &'a EnvLookup,
}

impl<'a> Interpolator<'a> {
    pub fn new(env: &'a EnvLookup) -> Self {
        Self { env }
    }

    /// Interpolate a single string
    pub fn interpolate(&self, input: &str) -> String {
        placeholder_regex()
            .replace_all(input, |caps: &Captures| {
                let value = (self.env)(&caps[1]).filter(|v| !v.is_empty());
                match (value, caps.get(2)) {
                    (Some(value), _) => value,
                    (None, Some(default)) => default.as_str().to_string(),
                    (None, None) => String::new(),
                }
            })
            .into_owned()
    }

    /// Interpolate every string scalar inside a YAML value, in place
    pub fn interpolate_value(&self, value: &mut Value) {
        match value {
            Value::String(s) if s.contains("${") => {
                let expanded = self.interpolate(s);
                *value = typed_scalar(expanded);
            }
            Value::Sequence(items) => {
                for item in items {
                    self.interpolate_value(item);
                }
            }
            Value::Mapping(map) => {
                for (_, item) in map.iter_mut() {
                    self.interpolate_value(item);
                }
            }
            Value::Tagged(tagged) => self.interpolate_value(&mut tagged.value),
            _ => {}
        }
    }
}
