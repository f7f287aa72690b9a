//! Integration tests for the permission guard with approval ports

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use hookline_permissions::{
    ApprovalPort, ApprovalRequest, Error, Operation, PermissionGuard, PermissionPolicy,
    PermissionRule, Result, RuleSet, UserDecision,
};

/// Approver that records how many requests are in flight at once
struct CountingApprover {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingApprover {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ApprovalPort for CountingApprover {
    async fn request_approval(&self, _request: &ApprovalRequest) -> Result<UserDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(UserDecision::Approved)
    }
}

#[tokio::test]
async fn test_approvals_are_serialized() {
    let approver = Arc::new(CountingApprover::new());
    let guard = PermissionGuard::new(PermissionPolicy::new())
        .with_approver(approver.clone())
        .with_timeout(Duration::from_secs(5));

    let mut handles = Vec::new();
    for i in 0..4 {
        let guard = guard.clone();
        handles.push(tokio::spawn(async move {
            let request = ApprovalRequest::new(format!("hook-{}", i), Operation::Command, "make");
            guard.authorize(&request, &RuleSet::new()).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(approver.calls.load(Ordering::SeqCst), 4);
    assert_eq!(approver.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_queue_time_counts_against_timeout() {
    let approver = Arc::new(CountingApprover::new());
    let guard = PermissionGuard::new(PermissionPolicy::new())
        .with_approver(approver)
        .with_timeout(Duration::from_millis(30));

    let first = {
        let guard = guard.clone();
        tokio::spawn(async move {
            guard
                .authorize(
                    &ApprovalRequest::new("first", Operation::Command, "make"),
                    &RuleSet::new(),
                )
                .await
        })
    };
    let second = {
        let guard = guard.clone();
        tokio::spawn(async move {
            guard
                .authorize(
                    &ApprovalRequest::new("second", Operation::Command, "make"),
                    &RuleSet::new(),
                )
                .await
        })
    };
    let third = {
        let guard = guard.clone();
        tokio::spawn(async move {
            guard
                .authorize(
                    &ApprovalRequest::new("third", Operation::Command, "make"),
                    &RuleSet::new(),
                )
                .await
        })
    };

    let results = [
        first.await.unwrap(),
        second.await.unwrap(),
        third.await.unwrap(),
    ];
    // Each approval takes 20ms, so the last one queued cannot finish within 30ms.
    assert!(results.iter().any(|r| r.is_ok()));
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::PermissionDenied { reason, .. }) if reason == "approval timed out")));
}

#[tokio::test]
async fn test_hook_rules_layer_over_policy() {
    let policy = PermissionPolicy::new()
        .allow(PermissionRule::parse("Read(**)").unwrap())
        .deny(PermissionRule::parse("Read(.env)").unwrap());
    let guard = PermissionGuard::new(policy);
    let hook_rules = RuleSet::new().deny(PermissionRule::parse("Read(secrets/**)").unwrap());

    let ok = guard
        .authorize(
            &ApprovalRequest::new("audit", Operation::Read, "src/main.rs"),
            &hook_rules,
        )
        .await;
    assert!(ok.is_ok());

    for target in [".env", "secrets/token"] {
        let denied = guard
            .authorize(
                &ApprovalRequest::new("audit", Operation::Read, target),
                &hook_rules,
            )
            .await;
        assert!(matches!(denied, Err(Error::PermissionDenied { .. })), "{target}");
    }
}

#[tokio::test]
async fn test_approver_error_denies() {
    struct Failing;

    #[async_trait]
    impl ApprovalPort for Failing {
        async fn request_approval(&self, _request: &ApprovalRequest) -> Result<UserDecision> {
            Err(Error::PromptError("terminal closed".to_string()))
        }
    }

    let guard = PermissionGuard::new(PermissionPolicy::new()).with_approver(Arc::new(Failing));
    let result = guard
        .authorize(
            &ApprovalRequest::new("x", Operation::Network, "example.com"),
            &RuleSet::new(),
        )
        .await;
    assert!(matches!(result, Err(Error::PermissionDenied { .. })));
}
