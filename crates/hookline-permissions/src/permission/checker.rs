//! Permission checking logic

use crate::{
    glob_matcher::GlobMatcher,
    permission::{
        config::PermissionPolicy,
        models::{Operation, PermissionLevel, PermissionRule, RuleSet},
    },
};

/// Decision result from permission checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Operation is allowed
    Allow,
    /// The host must approve before the operation runs
    Ask,
    /// Operation is denied
    Deny,
}

impl std::fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionDecision::Allow => write!(f, "allow"),
            PermissionDecision::Ask => write!(f, "ask"),
            PermissionDecision::Deny => write!(f, "deny"),
        }
    }
}

/// Evaluates operations against a policy and a hook's own rules
pub struct PermissionChecker;

impl PermissionChecker {
    /// Check an operation on a target
    ///
    /// Deny rules from either layer are evaluated first, then allow rules,
    /// then the policy default.
    ///
    /// A command line chaining several commands is denied when any of them
    /// matches a deny rule and allowed only when all of them match allow
    /// rules. Lines using substitution or redirection are never allowed by a
    /// rule and fall through to the default.
    pub fn check(
        policy: &PermissionPolicy,
        hook_rules: &RuleSet,
        operation: Operation,
        target: &str,
    ) -> PermissionDecision {
        let deny: Vec<&PermissionRule> = policy.rules.deny.iter().chain(&hook_rules.deny).collect();
        let allow: Vec<&PermissionRule> =
            policy.rules.allow.iter().chain(&hook_rules.allow).collect();
        if operation == Operation::Command {
            let parts = GlobMatcher::split_command(target);
            let part_denied = parts.as_ref().is_some_and(|parts| {
                parts
                    .iter()
                    .any(|part| Self::any_match(&deny, operation, part))
            });
            if part_denied || Self::any_match(&deny, operation, target) {
                return PermissionDecision::Deny;
            }
            let allowed = parts.is_some_and(|parts| {
                !parts.is_empty()
                    && parts
                        .iter()
                        .all(|part| Self::any_match(&allow, operation, part))
            });
            if allowed {
                return PermissionDecision::Allow;
            }
            return Self::level_to_decision(policy.default);
        }

        if Self::any_match(&deny, operation, target) {
            return PermissionDecision::Deny;
        }
        if Self::any_match(&allow, operation, target) {
            return PermissionDecision::Allow;
        }
        Self::level_to_decision(policy.default)
    }

    fn any_match(rules: &[&PermissionRule], operation: Operation, target: &str) -> bool {
        rules.iter().any(|rule| rule.matches(operation, target))
    }

    fn level_to_decision(level: PermissionLevel) -> PermissionDecision {
        match level {
            PermissionLevel::Allow => PermissionDecision::Allow,
            PermissionLevel::Ask => PermissionDecision::Ask,
            PermissionLevel::Deny => PermissionDecision::Deny,
        }
    }
}
