//! Permission management module

pub mod checker;
pub mod config;
pub mod models;

pub use checker::{PermissionChecker, PermissionDecision};
pub use config::PermissionPolicy;
pub use models::{Operation, PermissionLevel, PermissionRule, RuleSet};
