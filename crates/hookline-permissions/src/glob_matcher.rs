//! Pattern matching for permission targets

use glob::{MatchOptions, Pattern};
use tracing::warn;

use crate::error::{Error, Result};

/// Suffix that turns a command pattern into a prefix match (`npm:*`)
const COMMAND_PREFIX_SUFFIX: &str = ":*";

/// Shell syntax that runs or redirects beyond the commands a line chains
const SHELL_SUBSTITUTIONS: [&str; 4] = ["`", "$(", ">", "<"];

/// Matches permission patterns against operation targets
///
/// Three flavours of matching are supported:
/// - paths: glob syntax (`*`, `?`, `[...]`, `**`) where `*` stops at `/`
/// - commands: `prefix:*` prefix matching, otherwise `*`/`?` wildcards
/// - everything else (hosts, free-form targets): `*`/`?` wildcards
#[derive(Debug, Clone)]
pub struct GlobMatcher;

impl GlobMatcher {
    /// Create a new glob matcher
    pub fn new() -> Self {
        Self
    }

    /// Match a target against a wildcard pattern
    ///
    /// Supports:
    /// - `*` to match any sequence of characters
    /// - `?` to match a single character
    /// - Exact matches for literal strings
    pub fn match_pattern(&self, pattern: &str, target: &str) -> bool {
        self.match_recursive(pattern.as_bytes(), target.as_bytes())
    }

    #[allow(clippy::only_used_in_recursion)]
    fn match_recursive(&self, pattern: &[u8], target: &[u8]) -> bool {
        match (pattern.first(), target.first()) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(&b'*'), None) => self.match_recursive(&pattern[1..], target),
            (Some(_), None) => false,
            (Some(&b'*'), Some(_)) => {
                self.match_recursive(&pattern[1..], target)
                    || self.match_recursive(pattern, &target[1..])
            }
            (Some(&b'?'), Some(_)) => self.match_recursive(&pattern[1..], &target[1..]),
            (Some(&p), Some(&t)) if p == t => self.match_recursive(&pattern[1..], &target[1..]),
            _ => false,
        }
    }

    /// Match a shell command string against a command pattern
    ///
    /// `npm:*` matches `npm` itself and any command starting with `npm `.
    /// Other patterns are matched as wildcards against the trimmed command.
    pub fn match_command(&self, pattern: &str, command: &str) -> bool {
        let command = command.trim();
        if let Some(prefix) = pattern.strip_suffix(COMMAND_PREFIX_SUFFIX) {
            let prefix = prefix.trim();
            return command == prefix
                || command
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace));
        }
        self.match_pattern(pattern, command)
    }

    /// Split a shell command line into the simple commands it chains
    ///
    /// Splits on `;`, `&`, `|` and newlines, ignoring quoting. Returns `None`
    /// when the line uses command substitution or redirection.
    pub fn split_command(command: &str) -> Option<Vec<&str>> {
        if SHELL_SUBSTITUTIONS.iter().any(|s| command.contains(s)) {
            return None;
        }
        Some(
            command
                .split([';', '&', '|', '\n'])
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect(),
        )
    }

    /// Match a project-relative path against a glob pattern
    ///
    /// `*` does not cross directory separators; use `**` for recursive
    /// matches. Invalid patterns never match.
    pub fn match_path(&self, pattern: &str, path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        match Pattern::new(pattern) {
            Ok(compiled) => compiled.matches_with(path, options),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid path pattern never matches");
                false
            }
        }
    }

    /// Validate a pattern for syntax errors
    pub fn validate_pattern(&self, pattern: &str) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::InvalidGlobPattern(
                "Pattern cannot be empty".to_string(),
            ));
        }

        let mut bracket_count = 0;
        for ch in pattern.chars() {
            match ch {
                '[' => bracket_count += 1,
                ']' => {
                    bracket_count -= 1;
                    if bracket_count < 0 {
                        return Err(Error::InvalidGlobPattern(format!(
                            "Unmatched closing bracket ']' in '{}'",
                            pattern
                        )));
                    }
                }
                _ => {}
            }
        }

        if bracket_count > 0 {
            return Err(Error::InvalidGlobPattern(format!(
                "Unmatched opening bracket '[' in '{}'",
                pattern
            )));
        }

        Ok(())
    }

    /// Validate a path glob, including the stricter `glob` crate syntax
    pub fn validate_path_pattern(&self, pattern: &str) -> Result<()> {
        self.validate_pattern(pattern)?;
        Pattern::new(pattern)
            .map(|_| ())
            .map_err(|e| Error::InvalidGlobPattern(format!("'{}': {}", pattern, e)))
    }
}

impl Default for GlobMatcher {
    fn default() -> Self {
        Self::new()
    }
}
