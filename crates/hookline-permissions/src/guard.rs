//! Runtime enforcement of the permission policy

use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    permission::{Operation, PermissionChecker, PermissionDecision, PermissionPolicy, RuleSet},
    prompt::{ApprovalPort, ApprovalRequest, UserDecision},
};

/// Default time allowed for an approval, including time spent queued
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Enforces the permission policy for every context operation
///
/// The guard is cheap to clone; clones share the policy, the approver and
/// the approval queue. Only one approval request is outstanding at a time.
#[derive(Clone)]
pub struct PermissionGuard {
    policy: Arc<PermissionPolicy>,
    approver: Option<Arc<dyn ApprovalPort>>,
    approvals: Arc<Mutex<()>>,
    timeout: Duration,
}

impl PermissionGuard {
    /// Create a guard without an approver; `ask` decisions deny
    pub fn new(policy: PermissionPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            approver: None,
            approvals: Arc::new(Mutex::new(())),
            timeout: DEFAULT_GUARD_TIMEOUT,
        }
    }

    /// Guard that allows everything
    pub fn permissive() -> Self {
        Self::new(PermissionPolicy::with_default(
            crate::permission::PermissionLevel::Allow,
        ))
    }

    /// Attach the host's approval port
    pub fn with_approver(mut self, approver: Arc<dyn ApprovalPort>) -> Self {
        self.approver = Some(approver);
        self
    }

    /// Set how long an approval may take, queue time included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A guard enforcing another policy that shares this guard's approver
    /// and approval queue
    pub fn with_policy(&self, policy: PermissionPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            ..self.clone()
        }
    }

    /// The policy this guard enforces
    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    /// Evaluate an operation without asking anyone
    pub fn check(&self, hook_rules: &RuleSet, operation: Operation, target: &str) -> PermissionDecision {
        PermissionChecker::check(&self.policy, hook_rules, operation, target)
    }

    /// Authorize an operation, asking the host when the policy says `ask`
    ///
    /// Returns `Error::PermissionDenied` unless the operation may proceed.
    pub async fn authorize(&self, request: &ApprovalRequest, hook_rules: &RuleSet) -> Result<()> {
        let decision = self.check(hook_rules, request.operation, &request.target);
        debug!(
            hook = %request.hook,
            operation = %request.operation,
            target = %request.target,
            decision = %decision,
            "Permission check"
        );

        match decision {
            PermissionDecision::Allow => Ok(()),
            PermissionDecision::Deny => Err(self.deny(request, "denied by policy")),
            PermissionDecision::Ask => match self.ask(request).await {
                UserDecision::Approved => {
                    info!(hook = %request.hook, operation = %request.operation, target = %request.target, "Operation approved");
                    Ok(())
                }
                other => Err(self.deny(request, &format!("approval {}", other))),
            },
        }
    }

    async fn ask(&self, request: &ApprovalRequest) -> UserDecision {
        let Some(approver) = self.approver.as_ref() else {
            debug!(hook = %request.hook, "No approver available, denying");
            return UserDecision::Denied;
        };

        let pending = async {
            let _turn = self.approvals.lock().await;
            approver.request_approval(request).await
        };

        match tokio::time::timeout(self.timeout, pending).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!(hook = %request.hook, error = %e, "Approval request failed");
                UserDecision::Cancelled
            }
            Err(_) => {
                warn!(
                    hook = %request.hook,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Approval timed out"
                );
                UserDecision::TimedOut
            }
        }
    }

    fn deny(&self, request: &ApprovalRequest, reason: &str) -> Error {
        warn!(
            hook = %request.hook,
            operation = %request.operation,
            target = %request.target,
            reason = %reason,
            "Operation denied"
        );
        Error::denied(request.operation.to_string(), request.target.clone(), reason)
    }
}

impl std::fmt::Debug for PermissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGuard")
            .field("policy", &self.policy)
            .field("has_approver", &self.approver.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
