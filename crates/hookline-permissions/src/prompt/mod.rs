//! Approval requests and the ports that answer them

pub mod decision;

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
pub use decision::UserDecision;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::{error::Result, permission::Operation};

/// A request for the host to approve one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Hook that wants to perform the operation
    pub hook: String,
    /// Operation kind
    pub operation: Operation,
    /// Path, command line or host
    pub target: String,
}

impl ApprovalRequest {
    /// Create a new approval request
    pub fn new(hook: impl Into<String>, operation: Operation, target: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            operation,
            target: target.into(),
        }
    }
}

impl std::fmt::Display for ApprovalRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} wants {}({})", self.hook, self.operation, self.target)
    }
}

/// Port through which the host answers approval requests
///
/// Implementations may take as long as they like; the guard applies its own
/// timeout around every call.
#[async_trait]
pub trait ApprovalPort: Send + Sync {
    /// Ask the host to approve an operation
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<UserDecision>;
}

/// Approval port that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct StaticApprover {
    decision: UserDecision,
}

impl StaticApprover {
    /// Approver that approves every request
    pub fn approve_all() -> Self {
        Self {
            decision: UserDecision::Approved,
        }
    }

    /// Approver that denies every request
    pub fn deny_all() -> Self {
        Self {
            decision: UserDecision::Denied,
        }
    }
}

#[async_trait]
impl ApprovalPort for StaticApprover {
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<UserDecision> {
        debug!(request = %request, decision = %self.decision, "Static approval");
        Ok(self.decision)
    }
}

/// Approval port that asks on the controlling terminal
///
/// Answers are read by one detached thread that forwards stdin lines, so a
/// prompt abandoned by the guard's timeout leaves no read behind. Lines typed
/// before a prompt is shown are discarded.
#[derive(Debug)]
pub struct TerminalPrompt {
    /// Timeout shown to the user, in seconds
    pub timeout_seconds: u64,
    answers: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl TerminalPrompt {
    /// Create a new terminal prompt reading stdin
    pub fn new() -> Self {
        Self {
            timeout_seconds: 30,
            answers: Mutex::new(None),
        }
    }

    /// Create a prompt that reads answers from a channel instead of stdin
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            timeout_seconds: 30,
            answers: Mutex::new(Some(lines)),
        }
    }

    /// Set the timeout shown to the user
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    fn render(&self, request: &ApprovalRequest) -> String {
        let rule = "-".repeat(60);
        format!(
            "\n{rule}\nPermission required\n{rule}\nHook:      {}\nOperation: {}\nTarget:    {}\n{rule}\nAllow this operation? (yes/y/approve, no/n/deny, cancel/c)\nTimeout: {} seconds\n",
            request.hook, request.operation, request.target, self.timeout_seconds
        )
    }

    fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
        let (sender, receiver) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
        receiver
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalPort for TerminalPrompt {
    async fn request_approval(&self, request: &ApprovalRequest) -> Result<UserDecision> {
        let mut answers = self.answers.lock().await;
        let answers = answers.get_or_insert_with(Self::stdin_lines);
        while answers.try_recv().is_ok() {}

        let mut stderr = io::stderr();
        write!(stderr, "{}", self.render(request))?;
        loop {
            write!(stderr, "\nYour decision: ")?;
            stderr.flush()?;

            let Some(input) = answers.recv().await else {
                return Ok(UserDecision::Cancelled);
            };
            match UserDecision::parse_answer(&input) {
                Some(decision) => return Ok(decision),
                None => writeln!(
                    stderr,
                    "Invalid input. Please enter: yes/y/approve, no/n/deny, or cancel/c"
                )?,
            }
        }
    }
}
