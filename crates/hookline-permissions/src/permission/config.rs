//! Permission policy configuration

use serde::{Deserialize, Serialize};

use crate::permission::models::{PermissionLevel, PermissionRule, RuleSet};

/// Global permission policy loaded from the settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPolicy {
    /// Level applied when no rule matches
    #[serde(default)]
    pub default: PermissionLevel,

    /// Global allow and deny rules
    #[serde(flatten)]
    pub rules: RuleSet,
}

impl PermissionPolicy {
    /// Create a policy that asks for everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy with a specific default level
    pub fn with_default(default: PermissionLevel) -> Self {
        Self {
            default,
            rules: RuleSet::default(),
        }
    }

    /// Add a global allow rule
    pub fn allow(mut self, rule: PermissionRule) -> Self {
        self.rules.allow.push(rule);
        self
    }

    /// Add a global deny rule
    pub fn deny(mut self, rule: PermissionRule) -> Self {
        self.rules.deny.push(rule);
        self
    }

    /// Layer another policy over this one
    ///
    /// Rules accumulate; the overlay's default wins.
    pub fn merge(&mut self, overlay: PermissionPolicy) {
        self.default = overlay.default;
        self.rules.allow.extend(overlay.rules.allow);
        self.rules.deny.extend(overlay.rules.deny);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::models::Operation;

    #[test]
    fn test_policy_default_is_ask() {
        let policy = PermissionPolicy::default();
        assert_eq!(policy.default, PermissionLevel::Ask);
        assert!(policy.rules.is_empty());
    }

    #[test]
    fn test_policy_from_yaml() {
        let yaml = r#"
default: deny
allow:
  - "Read(src/**)"
  - "Command(cargo:*)"
deny:
  - "Write(.git/**)"
"#;
        let policy: PermissionPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.default, PermissionLevel::Deny);
        assert_eq!(policy.rules.allow.len(), 2);
        assert_eq!(policy.rules.deny[0].operation, Operation::Write);
    }

    #[test]
    fn test_policy_rejects_malformed_rule() {
        let yaml = "allow:\n  - \"just-a-string\"\n";
        let result: std::result::Result<PermissionPolicy, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_policy_merge() {
        let mut base = PermissionPolicy::new()
            .allow(PermissionRule::new(Operation::Read, "**"));
        let overlay = PermissionPolicy::with_default(PermissionLevel::Deny)
            .deny(PermissionRule::new(Operation::Read, "secrets/**"));

        base.merge(overlay);

        assert_eq!(base.default, PermissionLevel::Deny);
        assert_eq!(base.rules.allow.len(), 1);
        assert_eq!(base.rules.deny.len(), 1);
    }
}
