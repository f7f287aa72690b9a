//! Permission data models

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    glob_matcher::GlobMatcher,
};

/// Permission level used as a policy default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Operation is allowed without prompting
    Allow,
    /// The host is asked before the operation runs
    #[default]
    Ask,
    /// Operation is denied
    Deny,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Allow => write!(f, "allow"),
            PermissionLevel::Ask => write!(f, "ask"),
            PermissionLevel::Deny => write!(f, "deny"),
        }
    }
}

/// Kind of operation a hook context performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read a file
    Read,
    /// Write or create a file
    Write,
    /// Delete a file
    Delete,
    /// List a directory or test for existence
    List,
    /// Run a shell command
    Command,
    /// Reach a network host
    Network,
    /// Any operation (rules only)
    Any,
}

impl Operation {
    /// Whether targets of this operation are filesystem paths
    pub fn is_file_operation(&self) -> bool {
        matches!(
            self,
            Operation::Read | Operation::Write | Operation::Delete | Operation::List
        )
    }

    /// Whether a rule written for `self` covers an `operation` request
    pub fn covers(&self, operation: Operation) -> bool {
        *self == Operation::Any || *self == operation
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "Read",
            Operation::Write => "Write",
            Operation::Delete => "Delete",
            Operation::List => "List",
            Operation::Command => "Command",
            Operation::Network => "Network",
            Operation::Any => "*",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Operation::Read),
            "write" | "edit" => Ok(Operation::Write),
            "delete" => Ok(Operation::Delete),
            "list" => Ok(Operation::List),
            "command" | "bash" | "shell" => Ok(Operation::Command),
            "network" | "fetch" => Ok(Operation::Network),
            "*" => Ok(Operation::Any),
            other => Err(Error::InvalidRule(format!("Unknown operation '{}'", other))),
        }
    }
}

/// A single allow or deny rule, written as `Operation(pattern)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionRule {
    /// Operation the rule applies to
    pub operation: Operation,
    /// Pattern matched against the operation target
    pub pattern: String,
}

fn rule_regex() -> &'static Regex {
    static RULE: OnceLock<Regex> = OnceLock::new();
    RULE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z]+|\*)\s*\((.*)\)\s*$").expect("rule regex is valid")
    })
}

impl PermissionRule {
    /// Create a new rule
    pub fn new(operation: Operation, pattern: impl Into<String>) -> Self {
        Self {
            operation,
            pattern: pattern.into(),
        }
    }

    /// Parse a rule from its `Operation(pattern)` form
    pub fn parse(raw: &str) -> Result<Self> {
        let caps = rule_regex().captures(raw).ok_or_else(|| {
            Error::InvalidRule(format!(
                "'{}' is not of the form Operation(pattern)",
                raw
            ))
        })?;
        let operation: Operation = caps[1].parse()?;
        let pattern = caps[2].trim().to_string();

        let matcher = GlobMatcher::new();
        if operation.is_file_operation() {
            matcher.validate_path_pattern(&pattern)?;
        } else {
            matcher.validate_pattern(&pattern)?;
        }

        Ok(Self { operation, pattern })
    }

    /// Check whether this rule matches an operation on a target
    pub fn matches(&self, operation: Operation, target: &str) -> bool {
        if !self.operation.covers(operation) {
            return false;
        }
        let matcher = GlobMatcher::new();
        match operation {
            Operation::Command => matcher.match_command(&self.pattern, target),
            op if op.is_file_operation() => matcher.match_path(&self.pattern, target),
            _ => matcher.match_pattern(&self.pattern, target),
        }
    }
}

impl fmt::Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.pattern)
    }
}

impl FromStr for PermissionRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionRule {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PermissionRule> for String {
    fn from(rule: PermissionRule) -> Self {
        rule.to_string()
    }
}

/// A set of allow and deny rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rules that let operations proceed without prompting
    #[serde(default)]
    pub allow: Vec<PermissionRule>,
    /// Rules that block operations unconditionally
    #[serde(default)]
    pub deny: Vec<PermissionRule>,
}

impl RuleSet {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an allow rule
    pub fn allow(mut self, rule: PermissionRule) -> Self {
        self.allow.push(rule);
        self
    }

    /// Add a deny rule
    pub fn deny(mut self, rule: PermissionRule) -> Self {
        self.deny.push(rule);
        self
    }

    /// Whether the set has no rules
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_level_display() {
        assert_eq!(PermissionLevel::Allow.to_string(), "allow");
        assert_eq!(PermissionLevel::Ask.to_string(), "ask");
        assert_eq!(PermissionLevel::Deny.to_string(), "deny");
        assert_eq!(PermissionLevel::default(), PermissionLevel::Ask);
    }

    #[test]
    fn test_parse_rule() {
        let rule = PermissionRule::parse("Command(npm:*)").unwrap();
        assert_eq!(rule.operation, Operation::Command);
        assert_eq!(rule.pattern, "npm:*");

        let rule = PermissionRule::parse(" Read( src/** ) ").unwrap();
        assert_eq!(rule.operation, Operation::Read);
        assert_eq!(rule.pattern, "src/**");

        let rule = PermissionRule::parse("*(anything)").unwrap();
        assert_eq!(rule.operation, Operation::Any);
    }

    #[test]
    fn test_parse_rule_aliases() {
        assert_eq!(
            PermissionRule::parse("Bash(ls:*)").unwrap().operation,
            Operation::Command
        );
        assert_eq!(
            PermissionRule::parse("Edit(src/**)").unwrap().operation,
            Operation::Write
        );
    }

    #[test]
    fn test_parse_rule_invalid() {
        assert!(PermissionRule::parse("npm:*").is_err());
        assert!(PermissionRule::parse("Teleport(x)").is_err());
        assert!(PermissionRule::parse("Read()").is_err());
        assert!(PermissionRule::parse("Read(src/[)").is_err());
    }

    #[test]
    fn test_rule_matches_operation_kind() {
        let rule = PermissionRule::parse("Read(src/**)").unwrap();
        assert!(rule.matches(Operation::Read, "src/main.rs"));
        assert!(!rule.matches(Operation::Write, "src/main.rs"));

        let any = PermissionRule::parse("*(src/*)").unwrap();
        assert!(any.matches(Operation::Write, "src/main.rs"));
    }

    #[test]
    fn test_rule_serde_roundtrip() {
        let rule = PermissionRule::parse("Network(*.github.com)").unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, "\"Network(*.github.com)\"");
        let back: PermissionRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_rule_deserialize_rejects_bad_rule() {
        let result: std::result::Result<PermissionRule, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }
}
