//! Approval decision handling

/// Host decision in response to an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDecision {
    /// Host approved the operation
    Approved,
    /// Host denied the operation
    Denied,
    /// Host dismissed the prompt
    Cancelled,
    /// No decision arrived in time
    TimedOut,
}

impl UserDecision {
    /// Parse a typed answer; `None` when the input is not recognised
    pub fn parse_answer(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "yes" | "y" | "approve" => Some(UserDecision::Approved),
            "no" | "n" | "deny" => Some(UserDecision::Denied),
            "cancel" | "c" => Some(UserDecision::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserDecision::Approved => write!(f, "approved"),
            UserDecision::Denied => write!(f, "denied"),
            UserDecision::Cancelled => write!(f, "cancelled"),
            UserDecision::TimedOut => write!(f, "timed out"),
        }
    }
}
