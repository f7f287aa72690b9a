//! Permissions for Hookline hook contexts
//!
//! Every file, command, and network operation a hook performs through its
//! execution context is checked against an allow/deny/ask policy before it
//! runs. Evaluation order is strict:
//!
//! 1. **Deny** rules block unconditionally.
//! 2. **Allow** rules let the operation proceed without prompting.
//! 3. Anything else falls back to the policy default, which is **ask**.
//!
//! `ask` decisions are handed to an [`ApprovalPort`] supplied by the host.
//! The [`PermissionGuard`] waits for the answer up to a guard timeout and
//! treats a missing answer as a denial.
//!
//! # Rules
//!
//! Rules are written as `Operation(pattern)`:
//!
//! ```yaml
//! permissions:
//!   default: ask
//!   allow:
//!     - "Read(src/**)"
//!     - "Command(npm:*)"
//!   deny:
//!     - "Write(.git/**)"
//!     - "Network(*.internal)"
//! ```
//!
//! File operations use glob matching on project-relative paths. Command rules
//! use prefix matching when the pattern ends in `:*` (`npm:*` matches `npm`
//! and `npm test`) and wildcard matching otherwise.

pub mod error;
pub mod glob_matcher;
pub mod guard;
pub mod permission;
pub mod prompt;

pub use error::{Error, Result};
pub use glob_matcher::GlobMatcher;
pub use guard::PermissionGuard;
pub use permission::{
    Operation, PermissionChecker, PermissionDecision, PermissionLevel, PermissionPolicy,
    PermissionRule, RuleSet,
};
pub use prompt::{ApprovalPort, ApprovalRequest, StaticApprover, TerminalPrompt, UserDecision};
